use std::num::IntErrorKind;

use log::debug;

use crate::{
    air::{Air, AirStmt, StmtKind},
    error::{AsmError, SyntaxKind},
    lexer::{tokenize, LexError, Token, TokenKind},
    runtime::{Word, MEMORY_SIZE},
    symbol::{DirKind, Span, SymbolTable},
};

/// Assemble `src` into its intermediate representation. Either the whole program is valid or
/// the first error is returned.
pub fn assemble(src: &str) -> Result<Air, AsmError> {
    AsmParser::new(src).parse()
}

/// Two-pass assembler over a source file.
pub struct AsmParser<'a> {
    /// Reference to the source file
    src: &'a str,
}

impl<'a> AsmParser<'a> {
    pub fn new(src: &'a str) -> Self {
        AsmParser { src }
    }

    /// Source lines paired with their 1-based line number
    fn lines(&self) -> impl Iterator<Item = (usize, &'a str)> {
        self.src.lines().enumerate().map(|(i, line)| (i + 1, line))
    }

    /// First pass. Binds every prefix label to the address of its line and counts the
    /// code-producing lines. Instruction legality is left to [`AsmParser::parse`].
    pub fn resolve_symbols(&self) -> Result<(SymbolTable, usize), AsmError> {
        let mut symbols = SymbolTable::new();
        let mut addr = 0usize;
        for (line_no, line) in self.lines() {
            let toks = tokenize(line).map_err(|err| lex_error(line_no, line, err))?;
            if toks.is_empty() {
                continue;
            }
            if addr >= MEMORY_SIZE {
                return Err(AsmError::Capacity { len: addr + 1 });
            }
            if let [label @ Token {
                kind: TokenKind::Ident,
                ..
            }, Token {
                kind: TokenKind::Comma,
                ..
            }, ..] = toks.as_slice()
            {
                if let Err(prev) = symbols.insert(label.text, addr as u16) {
                    return Err(syntax_error(
                        line_no,
                        line,
                        SyntaxKind::DuplicateLabel {
                            label: label.text.to_string(),
                            prev,
                        },
                        label.span,
                    ));
                }
                debug!("bound `{}` to {:03X}", label.text, addr);
            }
            addr += 1;
        }
        debug!("pass 1: {} words, {} labels", addr, symbols.len());
        Ok((symbols, addr))
    }

    /// Create AIR out of the source, running both passes.
    pub fn parse(self) -> Result<Air, AsmError> {
        let (symbols, len) = self.resolve_symbols()?;
        let mut stmts = Vec::with_capacity(len);
        for (line_no, line) in self.lines() {
            if let Some(stmt) = parse_line(line_no, line, &symbols)? {
                stmts.push(stmt);
            }
        }
        debug_assert_eq!(stmts.len(), len, "passes disagree on program length");

        let mut air = Air::new(symbols);
        for stmt in stmts {
            air.add_stmt(stmt);
        }
        Ok(air)
    }
}

/// Second pass over a single line. Returns `None` for lines that occupy no address.
fn parse_line(line_no: usize, line: &str, symbols: &SymbolTable) -> Result<Option<AirStmt>, AsmError> {
    let toks = tokenize(line).map_err(|err| lex_error(line_no, line, err))?;
    let fail = |kind, span| Err(syntax_error(line_no, line, kind, span));

    let (label, rest) = match toks.as_slice() {
        [label @ Token {
            kind: TokenKind::Ident,
            ..
        }, Token {
            kind: TokenKind::Comma,
            ..
        }, rest @ ..] => (Some(label), rest),
        rest => (None, rest),
    };

    let kind = match rest {
        [] => match label {
            None => return Ok(None),
            Some(label) => return fail(SyntaxKind::DanglingLabel(label.text.to_string()), label.span),
        },
        [Token {
            kind: TokenKind::Instr(op),
            span,
            ..
        }] => {
            if !op.allows_bare() {
                return fail(SyntaxKind::MissingOperand(*op), *span);
            }
            StmtKind::Instr { op: *op, operand: 0 }
        }
        [Token {
            kind: TokenKind::Instr(op),
            ..
        }, arg @ Token {
            kind: TokenKind::Ident | TokenKind::Num,
            ..
        }] => {
            if !op.allows_operand() {
                return fail(SyntaxKind::UnexpectedOperand(*op), arg.span);
            }
            let operand = match arg.kind {
                TokenKind::Ident => match symbols.get(arg.text) {
                    Some(addr) => addr,
                    None => {
                        return fail(SyntaxKind::UnresolvedSymbol(arg.text.to_string()), arg.span)
                    }
                },
                // Instruction operands are always hex
                _ => match parse_literal(arg.text, 16) {
                    Ok(val) => val,
                    Err(kind) => return fail(kind, arg.span),
                },
            };
            StmtKind::Instr {
                op: *op,
                operand: operand & 0xFFF,
            }
        }
        [Token {
            kind: TokenKind::Dir(dir),
            ..
        }, arg @ Token {
            kind: TokenKind::Num,
            ..
        }] => match parse_literal(arg.text, dir.radix()) {
            Ok(val) => StmtKind::RawWord(val),
            Err(SyntaxKind::MalformedLiteral { text, .. }) => {
                return fail(SyntaxKind::MalformedLiteral { text, dir: *dir }, arg.span)
            }
            Err(kind) => return fail(kind, arg.span),
        },
        [first, .., last] => return fail(SyntaxKind::UnexpectedPattern, first.span.join(last.span)),
        [only] => return fail(SyntaxKind::UnexpectedPattern, only.span),
    };

    Ok(Some(AirStmt {
        line_no,
        label: label.map(|label| label.text.to_string()),
        kind,
    }))
}

/// Parse a numeric literal and check it fits a signed 16-bit word.
///
/// Malformed literals report [`DirKind::Hex`]; callers that know the directive
/// replace it.
fn parse_literal(text: &str, radix: u32) -> Result<Word, SyntaxKind> {
    let val = match i32::from_str_radix(text, radix) {
        Ok(val) => val,
        Err(err) => {
            return Err(match err.kind() {
                IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => {
                    SyntaxKind::LiteralOutOfRange(text.to_string())
                }
                _ => SyntaxKind::MalformedLiteral {
                    text: text.to_string(),
                    dir: DirKind::Hex,
                },
            })
        }
    };
    match i16::try_from(val) {
        Ok(val) => Ok(val as Word),
        Err(_) => Err(SyntaxKind::LiteralOutOfRange(text.to_string())),
    }
}

fn lex_error(line_no: usize, line: &str, err: LexError) -> AsmError {
    AsmError::Lexical {
        line_no,
        line: line.to_string(),
        lexeme: err.lexeme,
        span: err.span,
    }
}

fn syntax_error(line_no: usize, line: &str, kind: SyntaxKind, span: Span) -> AsmError {
    AsmError::Syntax {
        line_no,
        line: line.to_string(),
        kind,
        span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Opcode;

    fn image(src: &str) -> Vec<Word> {
        assemble(src).unwrap().image()
    }

    fn syntax_kind(src: &str) -> SyntaxKind {
        match assemble(src) {
            Err(AsmError::Syntax { kind, .. }) => kind,
            other => panic!("expected syntax error, got {:?}", other),
        }
    }

    #[test]
    fn add_program() {
        let src = "
        / Add two numbers
                Load X
                Add Y
                Store Z
                Halt
        X,      DEC 35
        Y,      HEX -A
        Z,      DEC 0
        ";
        assert_eq!(
            image(src),
            vec![0x1004, 0x3005, 0x2006, 0x7000, 35, 0xFFF6, 0]
        );
    }

    #[test]
    fn labels_count_code_lines_only() {
        let src = "
        First,  Clear

        / comment between
        Second, Output   / trailing comment
                Halt
        Third,  DEC 1
        ";
        let (symbols, len) = AsmParser::new(src).resolve_symbols().unwrap();
        assert_eq!(len, 4);
        assert_eq!(symbols.get("First"), Some(0));
        assert_eq!(symbols.get("Second"), Some(1));
        assert_eq!(symbols.get("Third"), Some(3));
    }

    #[test]
    fn forward_and_backward_references() {
        let src = "
        Loop,   Jump End
        End,    Jump Loop
        ";
        assert_eq!(image(src), vec![0x9001, 0x9000]);
    }

    #[test]
    fn immediate_operands_are_hex() {
        assert_eq!(image("Load 10"), vec![0x1010]);
        assert_eq!(image("Skipcond 800"), vec![0x8800]);
        assert_eq!(image("Dump 1F"), vec![0xF01F]);
        // Only the low 12 bits are kept
        assert_eq!(image("Jump 7FFF"), vec![0x9FFF]);
    }

    #[test]
    fn bare_instructions() {
        assert_eq!(
            image("Input\nOutput\nHalt\nClear\nSkipcond"),
            vec![0x5000, 0x6000, 0x7000, 0xA000, 0x8000]
        );
    }

    #[test]
    fn directive_bases() {
        assert_eq!(image("DEC 10\nHEX 10"), vec![10, 0x10]);
        assert_eq!(image("DEC -32768\nHEX 7FFF"), vec![0x8000, 0x7FFF]);
        assert_eq!(image("HEX -1"), vec![0xFFFF]);
    }

    #[test]
    fn unresolved_symbol_is_an_error() {
        assert_eq!(
            syntax_kind("Load Nowhere\nHalt"),
            SyntaxKind::UnresolvedSymbol("Nowhere".to_string())
        );
    }

    #[test]
    fn error_reports_line() {
        let err = assemble("Clear\n\n  Store Missing").unwrap_err();
        match err {
            AsmError::Syntax { line_no, line, span, .. } => {
                assert_eq!(line_no, 3);
                assert_eq!(line, "  Store Missing");
                assert_eq!(span, Span::new(8, 7));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn operand_legality() {
        assert_eq!(
            syntax_kind("Load"),
            SyntaxKind::MissingOperand(Opcode::Load)
        );
        assert_eq!(
            syntax_kind("Dump"),
            SyntaxKind::MissingOperand(Opcode::Dump)
        );
        assert_eq!(
            syntax_kind("Halt 1"),
            SyntaxKind::UnexpectedOperand(Opcode::Halt)
        );
        assert_eq!(
            syntax_kind("X, DEC 1\nOutput X"),
            SyntaxKind::UnexpectedOperand(Opcode::Output)
        );
    }

    #[test]
    fn bad_patterns() {
        assert_eq!(syntax_kind("DEC"), SyntaxKind::UnexpectedPattern);
        assert_eq!(syntax_kind("Load X Y"), SyntaxKind::UnexpectedPattern);
        assert_eq!(syntax_kind("10"), SyntaxKind::UnexpectedPattern);
        assert_eq!(syntax_kind("X, Y, Halt"), SyntaxKind::UnexpectedPattern);
        assert_eq!(syntax_kind("DEC X"), SyntaxKind::UnexpectedPattern);
    }

    #[test]
    fn literal_range() {
        assert_eq!(
            syntax_kind("DEC 32768"),
            SyntaxKind::LiteralOutOfRange("32768".to_string())
        );
        assert_eq!(
            syntax_kind("DEC -32769"),
            SyntaxKind::LiteralOutOfRange("-32769".to_string())
        );
        assert_eq!(
            syntax_kind("HEX FFFF"),
            SyntaxKind::LiteralOutOfRange("FFFF".to_string())
        );
        assert_eq!(
            syntax_kind("DEC 99999999999"),
            SyntaxKind::LiteralOutOfRange("99999999999".to_string())
        );
        assert_eq!(
            syntax_kind("Load 8000"),
            SyntaxKind::LiteralOutOfRange("8000".to_string())
        );
        assert_eq!(
            syntax_kind("DEC 1F"),
            SyntaxKind::MalformedLiteral {
                text: "1F".to_string(),
                dir: DirKind::Dec,
            }
        );
    }

    #[test]
    fn duplicate_label() {
        assert_eq!(
            syntax_kind("X, DEC 1\nX, DEC 2"),
            SyntaxKind::DuplicateLabel {
                label: "X".to_string(),
                prev: 0,
            }
        );
    }

    #[test]
    fn dangling_label() {
        assert_eq!(
            syntax_kind("Lonely,\nHalt"),
            SyntaxKind::DanglingLabel("Lonely".to_string())
        );
    }

    #[test]
    fn lexical_error_in_first_pass() {
        match assemble("Halt\nLoad my_var") {
            Err(AsmError::Lexical { line_no, lexeme, .. }) => {
                assert_eq!(line_no, 2);
                assert_eq!(lexeme, "my_var");
            }
            other => panic!("expected lexical error, got {:?}", other),
        }
    }

    #[test]
    fn capacity() {
        let fits = "Clear\n".repeat(MEMORY_SIZE);
        assert_eq!(assemble(&fits).unwrap().len(), MEMORY_SIZE);

        let too_long = "Clear\n".repeat(MEMORY_SIZE + 1);
        assert!(matches!(
            assemble(&too_long),
            Err(AsmError::Capacity { len }) if len == MEMORY_SIZE + 1
        ));
    }

    #[test]
    fn capacity_checked_before_binding() {
        // The repeated label sits past the end of memory
        let src = format!("Top, Clear\n{}Top, Clear\n", "Clear\n".repeat(MEMORY_SIZE));
        assert!(matches!(
            assemble(&src),
            Err(AsmError::Capacity { len }) if len == MEMORY_SIZE + 1
        ));

        let huge = "Clear\n".repeat(0x10001);
        assert!(matches!(
            AsmParser::new(&huge).resolve_symbols(),
            Err(AsmError::Capacity { len }) if len == MEMORY_SIZE + 1
        ));
    }

    #[test]
    fn deterministic() {
        let src = "
        Start,  Input
                Store Val
                JnS Sub
                Halt
        Val,    DEC 0
        Sub,    HEX 0
                Load Val
                JumpI Sub
        ";
        assert_eq!(image(src), image(src));
    }

    #[test]
    fn labels_are_recorded() {
        let air = assemble("Top, Clear\nJump Top").unwrap();
        assert_eq!(air.get(0).label.as_deref(), Some("Top"));
        assert_eq!(air.get(1).label, None);
        assert_eq!(air.get(1).line_no, 2);
    }
}
