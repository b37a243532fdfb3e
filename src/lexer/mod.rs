use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::lexer::cursor::Cursor;
use crate::symbol::{DirKind, Opcode, Span};

pub mod cursor;

/// Marks the start of a comment, which runs to the end of the line.
pub const COMMENT: char = '/';

lazy_static! {
    static ref NUMBER: Regex = Regex::new(r"^[-+]?[0-9A-Fa-f]+$").unwrap();
    static ref IDENT: Regex = Regex::new(r"^[A-Za-z][A-Za-z0-9]*$").unwrap();
}

/// Single lexeme of a source line.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range within the line
    pub span: Span,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TokenKind {
    Instr(Opcode),
    Dir(DirKind),
    /// Radix depends on context: operands are hex, directives name their own.
    Num,
    Ident,
    Comma,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Instr(_) => f.write_str("instruction"),
            TokenKind::Dir(_) => f.write_str("directive"),
            TokenKind::Num => f.write_str("number"),
            TokenKind::Ident => f.write_str("identifier"),
            TokenKind::Comma => f.write_str("comma"),
        }
    }
}

/// Lexeme that fits no token kind.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct LexError {
    pub lexeme: String,
    pub span: Span,
}

/// Test if a character separates tokens.
pub(crate) fn is_whitespace(c: char) -> bool {
    c.is_whitespace()
}

/// Classify a lexeme. First match wins: instruction, directive, number, identifier, comma.
pub fn classify(lexeme: &str) -> Option<TokenKind> {
    if let Ok(op) = lexeme.parse::<Opcode>() {
        Some(TokenKind::Instr(op))
    } else if let Ok(dir) = lexeme.parse::<DirKind>() {
        Some(TokenKind::Dir(dir))
    } else if NUMBER.is_match(lexeme) {
        Some(TokenKind::Num)
    } else if IDENT.is_match(lexeme) {
        Some(TokenKind::Ident)
    } else if lexeme == "," {
        Some(TokenKind::Comma)
    } else {
        None
    }
}

/// Strip the comment from `line`, if any.
pub fn strip_comment(line: &str) -> &str {
    match line.find(COMMENT) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

/// Split one line into tokens. Commas always form their own token.
pub fn tokenize(line: &str) -> Result<Vec<Token<'_>>, LexError> {
    let mut cur = Cursor::new(strip_comment(line));
    let mut toks = Vec::new();
    loop {
        cur.take_while(is_whitespace);
        cur.reset_pos();
        match cur.bump() {
            None => break,
            Some(',') => (),
            Some(_) => cur.take_while(|c| !is_whitespace(c) && c != ','),
        }
        let text = cur.tok_text();
        let span = Span::new(cur.tok_start(), text.len());
        match classify(text) {
            Some(kind) => toks.push(Token { kind, text, span }),
            None => {
                return Err(LexError {
                    lexeme: text.to_string(),
                    span,
                })
            }
        }
    }
    Ok(toks)
}
