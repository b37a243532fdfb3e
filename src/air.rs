use crate::{
    runtime::Word,
    symbol::{Opcode, SymbolTable},
};

/// Assembly intermediate representation: one statement per occupied address, plus the labels
/// that point into it.
#[derive(Debug, Default)]
pub struct Air {
    /// Statement at index `n` is loaded at address `n`
    ast: Vec<AirStmt>,
    symbols: SymbolTable,
}

impl Air {
    pub fn new(symbols: SymbolTable) -> Self {
        Air {
            ast: Vec::new(),
            symbols,
        }
    }

    pub fn add_stmt(&mut self, stmt: AirStmt) {
        self.ast.push(stmt)
    }

    pub fn get(&self, idx: usize) -> &AirStmt {
        &self.ast[idx]
    }

    pub fn len(&self) -> usize {
        self.ast.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ast.is_empty()
    }

    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    /// Memory image, index = address.
    pub fn image(&self) -> Vec<Word> {
        self.ast.iter().map(AirStmt::emit).collect()
    }
}

impl<'a> IntoIterator for &'a Air {
    type Item = &'a AirStmt;
    type IntoIter = std::slice::Iter<'a, AirStmt>;

    fn into_iter(self) -> Self::IntoIter {
        self.ast.iter()
    }
}

/// Single code-producing source line.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AirStmt {
    /// 1-based line in the source
    pub line_no: usize,
    pub label: Option<String>,
    pub kind: StmtKind,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StmtKind {
    /// Operand is already resolved and masked to 12 bits
    Instr { op: Opcode, operand: u16 },
    /// `DEC`/`HEX` literal
    RawWord(Word),
}

impl AirStmt {
    /// Pack into a machine word
    pub fn emit(&self) -> Word {
        match self.kind {
            StmtKind::Instr { op, operand } => (op as u16) << 12 | (operand & 0xFFF),
            StmtKind::RawWord(word) => word,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(kind: StmtKind) -> AirStmt {
        AirStmt {
            line_no: 1,
            label: None,
            kind,
        }
    }

    #[test]
    fn emit_instr() {
        let word = stmt(StmtKind::Instr {
            op: Opcode::Load,
            operand: 0x004,
        })
        .emit();
        assert_eq!(word, 0x1004);

        let word = stmt(StmtKind::Instr {
            op: Opcode::StoreI,
            operand: 0xFFF,
        })
        .emit();
        assert_eq!(word, 0xEFFF);
    }

    #[test]
    fn emit_raw_word() {
        assert_eq!(stmt(StmtKind::RawWord(0xFFFF)).emit(), 0xFFFF);
    }

    #[test]
    fn image_in_address_order() {
        let mut air = Air::new(SymbolTable::new());
        air.add_stmt(stmt(StmtKind::Instr {
            op: Opcode::Halt,
            operand: 0,
        }));
        air.add_stmt(stmt(StmtKind::RawWord(42)));
        assert_eq!(air.image(), vec![0x7000, 42]);
        assert_eq!(air.len(), 2);
    }
}
