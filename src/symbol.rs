use std::{fmt, str::FromStr};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;
use miette::SourceSpan;

// Symbol table of symbol -> memory address
type FxMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// Label bindings produced by the first assembler pass. Keeps definition order.
#[derive(Clone, Default, Debug)]
pub struct SymbolTable {
    table: FxMap<String, u16>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable {
            table: IndexMap::with_hasher(FxBuildHasher::default()),
        }
    }

    /// Bind `label` to `addr`. Returns the existing address if the label was already bound.
    pub fn insert(&mut self, label: &str, addr: u16) -> Result<(), u16> {
        match self.table.get(label) {
            Some(&prev) => Err(prev),
            None => {
                self.table.insert(label.to_string(), addr);
                Ok(())
            }
        }
    }

    pub fn get(&self, label: &str) -> Option<u16> {
        self.table.get(label).copied()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Labels in definition order
    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.table.iter().map(|(label, addr)| (label.as_str(), *addr))
    }
}

/// Location within a single source line
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Span {
    offs: usize,
    len: usize,
}

impl Span {
    pub fn new(offs: usize, len: usize) -> Self {
        Span { offs, len }
    }

    pub fn offs(&self) -> usize {
        self.offs
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn end(&self) -> usize {
        self.offs + self.len
    }

    /// Smallest span covering both `self` and `other`
    pub fn join(&self, other: Span) -> Span {
        let offs = self.offs.min(other.offs);
        let end = self.end().max(other.end());
        Span::new(offs, end - offs)
    }
}

impl From<Span> for SourceSpan {
    fn from(value: Span) -> Self {
        SourceSpan::new(value.offs().into(), value.len())
    }
}

/// The sixteen MARIE operations. Discriminants are the 4-bit opcodes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum Opcode {
    JnS = 0x0,
    Load = 0x1,
    Store = 0x2,
    Add = 0x3,
    Subt = 0x4,
    Input = 0x5,
    Output = 0x6,
    Halt = 0x7,
    Skipcond = 0x8,
    Jump = 0x9,
    Clear = 0xA,
    AddI = 0xB,
    JumpI = 0xC,
    LoadI = 0xD,
    StoreI = 0xE,
    /// Print registers and a slice of memory.
    Dump = 0xF,
}

impl Opcode {
    pub const ALL: [Opcode; 16] = [
        Opcode::JnS,
        Opcode::Load,
        Opcode::Store,
        Opcode::Add,
        Opcode::Subt,
        Opcode::Input,
        Opcode::Output,
        Opcode::Halt,
        Opcode::Skipcond,
        Opcode::Jump,
        Opcode::Clear,
        Opcode::AddI,
        Opcode::JumpI,
        Opcode::LoadI,
        Opcode::StoreI,
        Opcode::Dump,
    ];

    /// Opcode field of an instruction word. All sixteen 4-bit values are defined.
    pub fn decode(word: u16) -> Opcode {
        Opcode::ALL[usize::from(word >> 12)]
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::JnS => "JnS",
            Opcode::Load => "Load",
            Opcode::Store => "Store",
            Opcode::Add => "Add",
            Opcode::Subt => "Subt",
            Opcode::Input => "Input",
            Opcode::Output => "Output",
            Opcode::Halt => "Halt",
            Opcode::Skipcond => "Skipcond",
            Opcode::Jump => "Jump",
            Opcode::Clear => "Clear",
            Opcode::AddI => "AddI",
            Opcode::JumpI => "JumpI",
            Opcode::LoadI => "LoadI",
            Opcode::StoreI => "StoreI",
            Opcode::Dump => "Dump",
        }
    }

    /// Instructions that are written without an operand.
    pub fn allows_bare(self) -> bool {
        matches!(
            self,
            Opcode::Input | Opcode::Output | Opcode::Halt | Opcode::Clear | Opcode::Skipcond
        )
    }

    /// Instructions that accept an address or immediate operand.
    pub fn allows_operand(self) -> bool {
        matches!(
            self,
            Opcode::JnS
                | Opcode::Load
                | Opcode::Store
                | Opcode::Add
                | Opcode::Subt
                | Opcode::Skipcond
                | Opcode::Jump
                | Opcode::AddI
                | Opcode::JumpI
                | Opcode::LoadI
                | Opcode::StoreI
                | Opcode::Dump
        )
    }
}

impl TryFrom<u16> for Opcode {
    type Error = u16;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Opcode::ALL.get(value as usize).copied().ok_or(value)
    }
}

impl FromStr for Opcode {
    type Err = ();

    // Mnemonics are case-sensitive
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Opcode::ALL
            .into_iter()
            .find(|op| op.mnemonic() == s)
            .ok_or(())
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Data directives. Each reserves one word holding a literal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DirKind {
    Dec,
    Hex,
}

impl DirKind {
    pub fn radix(self) -> u32 {
        match self {
            DirKind::Dec => 10,
            DirKind::Hex => 16,
        }
    }
}

impl FromStr for DirKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DEC" => Ok(DirKind::Dec),
            "HEX" => Ok(DirKind::Hex),
            _ => Err(()),
        }
    }
}

impl fmt::Display for DirKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirKind::Dec => f.write_str("DEC"),
            DirKind::Hex => f.write_str("HEX"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opcode_numbering() {
        for (i, op) in Opcode::ALL.iter().enumerate() {
            assert_eq!(*op as usize, i);
            assert_eq!(Opcode::try_from(i as u16), Ok(*op));
        }
        assert_eq!(Opcode::try_from(0x10), Err(0x10));
    }

    #[test]
    fn decode_instruction_words() {
        assert_eq!(Opcode::decode(0x0000), Opcode::JnS);
        assert_eq!(Opcode::decode(0x7000), Opcode::Halt);
        assert_eq!(Opcode::decode(0x8C00), Opcode::Skipcond);
        assert_eq!(Opcode::decode(0xFFFF), Opcode::Dump);
        for word in (0..=u16::MAX).step_by(0x0FFF) {
            assert_eq!(Opcode::decode(word) as u16, word >> 12);
        }
    }

    #[test]
    fn mnemonics_are_case_sensitive() {
        assert_eq!("Load".parse::<Opcode>(), Ok(Opcode::Load));
        assert_eq!("JnS".parse::<Opcode>(), Ok(Opcode::JnS));
        assert!("load".parse::<Opcode>().is_err());
        assert!("LOAD".parse::<Opcode>().is_err());
        assert!("dec".parse::<DirKind>().is_err());
    }

    #[test]
    fn duplicate_symbol() {
        let mut table = SymbolTable::new();
        assert!(table.insert("X", 3).is_ok());
        assert_eq!(table.insert("X", 7), Err(3));
        assert_eq!(table.get("X"), Some(3));
        assert_eq!(table.get("Y"), None);
    }

    #[test]
    fn symbols_keep_definition_order() {
        let mut table = SymbolTable::new();
        table.insert("Zed", 0).unwrap();
        table.insert("Alpha", 1).unwrap();
        let labels: Vec<_> = table.iter().collect();
        assert_eq!(labels, vec![("Zed", 0), ("Alpha", 1)]);
    }
}
