// Parsing
mod lexer;
pub use lexer::{tokenize, LexError, Token, TokenKind};
mod parser;
pub use parser::{assemble, AsmParser};
mod air;
pub use air::{Air, AirStmt, StmtKind};
mod symbol;
pub use symbol::{DirKind, Opcode, Span, SymbolTable};

// Running
mod runtime;
pub use runtime::{Fault, Machine, Registers, Step, Word, MEMORY_SIZE};
mod term;
pub use term::{Buffered, Console, Stdio};

mod error;
pub use error::{AsmError, SyntaxKind};

pub mod env;
