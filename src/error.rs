use std::fmt::Display;

use miette::{Diagnostic, LabeledSpan, SourceCode};
use thiserror::Error;

use crate::runtime::MEMORY_SIZE;
use crate::symbol::{DirKind, Opcode, Span};

/// Reasons the assembler rejects a program. Assembly stops at the first one.
#[derive(Debug, Error)]
pub enum AsmError {
    #[error("line {line_no}: unknown token `{lexeme}` in `{}`", .line.trim())]
    Lexical {
        line_no: usize,
        line: String,
        lexeme: String,
        span: Span,
    },
    #[error("syntax error on line {line_no}: {kind}: `{}`", .line.trim())]
    Syntax {
        line_no: usize,
        line: String,
        kind: SyntaxKind,
        span: Span,
    },
    #[error("program needs at least {len} words but memory only holds {} words", MEMORY_SIZE)]
    Capacity { len: usize },
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyntaxKind {
    #[error("expected `[Label,] Instruction [operand]` or `[Label,] DEC|HEX literal`")]
    UnexpectedPattern,
    #[error("{0} does not take an operand")]
    UnexpectedOperand(Opcode),
    #[error("{0} requires an operand")]
    MissingOperand(Opcode),
    #[error("undefined label `{0}`")]
    UnresolvedSymbol(String),
    #[error("literal `{0}` does not fit in a 16-bit signed word")]
    LiteralOutOfRange(String),
    #[error("`{text}` is not a valid {dir} literal")]
    MalformedLiteral { text: String, dir: DirKind },
    #[error("label `{label}` already defined at address {prev:03X}")]
    DuplicateLabel { label: String, prev: u16 },
    #[error("label `{0}` does not prefix a statement")]
    DanglingLabel(String),
}

impl AsmError {
    /// 1-based source line of the error, if it came from a line.
    pub fn line_no(&self) -> Option<usize> {
        match self {
            AsmError::Lexical { line_no, .. } | AsmError::Syntax { line_no, .. } => Some(*line_no),
            AsmError::Capacity { .. } => None,
        }
    }

    pub fn syntax_kind(&self) -> Option<&SyntaxKind> {
        match self {
            AsmError::Syntax { kind, .. } => Some(kind),
            _ => None,
        }
    }
}

impl Diagnostic for AsmError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let code = match self {
            AsmError::Lexical { .. } => "lex::unknown",
            AsmError::Capacity { .. } => "asm::capacity",
            AsmError::Syntax { kind, .. } => match kind {
                SyntaxKind::UnexpectedPattern => "parse::unexpected_token",
                SyntaxKind::UnexpectedOperand(_) | SyntaxKind::MissingOperand(_) => {
                    "parse::operand"
                }
                SyntaxKind::UnresolvedSymbol(_) => "parse::unresolved_symbol",
                SyntaxKind::LiteralOutOfRange(_) | SyntaxKind::MalformedLiteral { .. } => {
                    "parse::bad_lit"
                }
                SyntaxKind::DuplicateLabel { .. } => "parse::duplicate_label",
                SyntaxKind::DanglingLabel(_) => "parse::dangling_label",
            },
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        let help = match self {
            AsmError::Lexical { .. } => {
                "labels are letters followed by letters or digits; numbers are plain hex or decimal digits"
            }
            AsmError::Capacity { .. } => "split the program or shrink its data section",
            AsmError::Syntax { kind, .. } => match kind {
                SyntaxKind::UnexpectedPattern => {
                    "each line holds at most one label, one instruction or directive, and one operand"
                }
                SyntaxKind::UnexpectedOperand(_) => "remove the operand",
                SyntaxKind::MissingOperand(_) => "give the instruction a label or a hex address",
                SyntaxKind::UnresolvedSymbol(_) => "define the label with `Name, ...` somewhere in the file",
                SyntaxKind::LiteralOutOfRange(_) => "ranges from -32,768 to 32,767 are allowed",
                SyntaxKind::MalformedLiteral { .. } => "DEC takes decimal digits, HEX takes hex digits",
                SyntaxKind::DuplicateLabel { .. } => "prefix labels are only allowed once per file",
                SyntaxKind::DanglingLabel(_) => "put an instruction or directive after the comma",
            },
        };
        Some(Box::new(help))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        match self {
            AsmError::Lexical { line, .. } | AsmError::Syntax { line, .. } => Some(line),
            AsmError::Capacity { .. } => None,
        }
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let label = match self {
            AsmError::Lexical { span, .. } => LabeledSpan::at(*span, "unknown token"),
            AsmError::Syntax { span, kind, .. } => {
                let text = match kind {
                    SyntaxKind::UnresolvedSymbol(_) => "undefined label",
                    SyntaxKind::LiteralOutOfRange(_) => "out-of-range literal",
                    SyntaxKind::MalformedLiteral { .. } => "incorrect literal",
                    SyntaxKind::DuplicateLabel { .. } => "duplicate label",
                    SyntaxKind::DanglingLabel(_) => "label without statement",
                    _ => "unexpected token",
                };
                LabeledSpan::at(*span, text)
            }
            AsmError::Capacity { .. } => return None,
        };
        Some(Box::new(std::iter::once(label)))
    }
}
