// Loosely modelled on `rustc_lexer`'s cursor, cut down to a single source line.

/// Peekable iterator over the chars of one line.
pub struct Cursor<'a> {
    /// Byte offset of the next char
    curr_pt: usize,
    /// Byte offset where the token being built started
    tok_start: usize,
    line: &'a str,
}

impl<'a> Cursor<'a> {
    pub fn new(line: &'a str) -> Cursor<'a> {
        Cursor {
            curr_pt: 0,
            tok_start: 0,
            line,
        }
    }

    /// Peek at the next char without consuming it
    pub fn first(&self) -> Option<char> {
        self.line[self.curr_pt..].chars().next()
    }

    /// Consume one char
    pub fn bump(&mut self) -> Option<char> {
        let c = self.first()?;
        self.curr_pt += c.len_utf8();
        Some(c)
    }

    pub fn take_while(&mut self, mut predicate: impl FnMut(char) -> bool) {
        while let Some(c) = self.first() {
            if !predicate(c) {
                break;
            }
            self.bump();
        }
    }

    /// Mark the current position as the start of the next token
    pub fn reset_pos(&mut self) {
        self.tok_start = self.curr_pt;
    }

    pub fn tok_start(&self) -> usize {
        self.tok_start
    }

    /// Text consumed since the last [`Cursor::reset_pos`]
    pub fn tok_text(&self) -> &'a str {
        &self.line[self.tok_start..self.curr_pt]
    }
}

#[cfg(test)]
mod tests {
    use super::Cursor;

    #[test]
    fn take_while_stops_at_predicate() {
        let mut cur = Cursor::new("abc def");
        cur.take_while(|c| c != ' ');
        assert_eq!(cur.tok_text(), "abc");
        cur.bump();
        cur.reset_pos();
        assert_eq!(cur.tok_start(), 4);
        cur.take_while(|_| true);
        assert_eq!(cur.tok_text(), "def");
        assert_eq!(cur.bump(), None);
    }
}
