use std::{fmt, io};

use log::{trace, warn};
use miette::Diagnostic;
use thiserror::Error;

use crate::{error::AsmError, symbol::Opcode, term::Console, Air};

/// MARIE has 12-bit addresses.
pub const MEMORY_SIZE: usize = 0x1000;

/// Raw 16-bit machine word. Arithmetic and comparisons treat it as two's complement.
pub type Word = u16;

/// Words per row in a memory dump
const DUMP_ROW: usize = 8;

/// Register file. All registers start at zero.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Registers {
    /// Accumulator
    pub ac: Word,
    /// Program counter
    pub pc: Word,
    /// Memory address register
    pub mar: Word,
    /// Memory buffer register
    pub mbr: Word,
    /// Instruction register
    pub ir: Word,
    /// Input register
    pub input: Word,
    /// Output register
    pub output: Word,
}

impl fmt::Display for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AC {:04X}  PC {:04X}  MAR {:04X}  MBR {:04X}  IR {:04X}  IN {:04X}  OUT {:04X}",
            self.ac, self.pc, self.mar, self.mbr, self.ir, self.input, self.output
        )
    }
}

/// Conditions that stop the machine before a `Halt`.
#[derive(Debug, Error, Diagnostic)]
pub enum Fault {
    #[error("invalid condition field in Skipcond instruction {ir:04X}")]
    #[diagnostic(
        code(runtime::skipcond),
        help("the condition is operand bits 11-10: use 000, 400 or 800")
    )]
    InvalidCondition { ir: Word },
    #[error("address {addr:04X} is outside memory (last instruction {ir:04X})")]
    #[diagnostic(
        code(runtime::address),
        help("memory spans addresses 000 to FFF; check pointers used by JumpI, AddI, LoadI and StoreI")
    )]
    AddressOutOfRange { addr: Word, ir: Word },
    #[error("input ended while the program was waiting on Input")]
    #[diagnostic(code(runtime::input), help("provide one hex value per Input instruction"))]
    InputExhausted,
    #[error("console failed: {0}")]
    #[diagnostic(code(runtime::io))]
    Io(#[from] io::Error),
}

/// Result of a single fetch-decode-execute cycle.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Step {
    Continue,
    Halted,
}

/// Complete machine state during a run: registers plus unified code/data memory.
pub struct Machine {
    reg: Registers,
    mem: Box<[Word; MEMORY_SIZE]>,
    /// Completed cycles
    cycles: u64,
}

impl fmt::Debug for Machine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Machine")
            .field("reg", &self.reg)
            .field("cycles", &self.cycles)
            .finish_non_exhaustive()
    }
}

impl Machine {
    pub fn from_air(air: &Air) -> Result<Machine, AsmError> {
        Machine::from_raw(&air.image())
    }

    /// Load `raw` at address 0. The rest of memory is zeroed.
    pub fn from_raw(raw: &[Word]) -> Result<Machine, AsmError> {
        if raw.len() > MEMORY_SIZE {
            return Err(AsmError::Capacity { len: raw.len() });
        }
        let mut mem = Box::new([0; MEMORY_SIZE]);
        mem[..raw.len()].copy_from_slice(raw);

        Ok(Machine {
            reg: Registers::default(),
            mem,
            cycles: 0,
        })
    }

    pub fn reg(&self) -> &Registers {
        &self.reg
    }

    pub fn mem(&self) -> &[Word] {
        &self.mem[..]
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Run until `Halt` or a fault.
    pub fn run(&mut self, console: &mut impl Console) -> Result<(), Fault> {
        loop {
            if self.step(console)? == Step::Halted {
                return Ok(());
            }
        }
    }

    /// Run at most `max_cycles` cycles. Returns [`Step::Continue`] if the budget ran out first.
    pub fn run_limited(&mut self, console: &mut impl Console, max_cycles: u64) -> Result<Step, Fault> {
        for _ in 0..max_cycles {
            if self.step(console)? == Step::Halted {
                return Ok(Step::Halted);
            }
        }
        Ok(Step::Continue)
    }

    /// Perform one fetch-decode-execute cycle.
    pub fn step(&mut self, console: &mut impl Console) -> Result<Step, Fault> {
        self.reg.mar = self.reg.pc;
        self.reg.mbr = self.read(self.reg.mar)?;
        self.reg.ir = self.reg.mbr;
        // PC incremented before instruction is performed
        self.reg.pc = self.reg.pc.wrapping_add(1);

        let ir = self.reg.ir;
        let operand = ir & 0xFFF;
        let op = Opcode::decode(ir);
        trace!("{:03X}: {:04X}  {} {:03X}", self.reg.mar, ir, op, operand);

        let step = self.execute(op, operand, console)?;
        self.cycles += 1;
        Ok(step)
    }

    fn execute(&mut self, op: Opcode, x: Word, console: &mut impl Console) -> Result<Step, Fault> {
        match op {
            Opcode::JnS => {
                // Return address goes in the first word of the subroutine
                self.reg.mar = x;
                self.reg.mbr = self.reg.pc;
                self.write(self.reg.mar, self.reg.mbr)?;
                self.reg.pc = x.wrapping_add(1);
            }
            Opcode::Load => {
                self.fetch_operand(x)?;
                self.reg.ac = self.reg.mbr;
            }
            Opcode::Store => {
                self.reg.mar = x;
                self.reg.mbr = self.reg.ac;
                self.write(self.reg.mar, self.reg.mbr)?;
            }
            Opcode::Add => {
                self.fetch_operand(x)?;
                self.reg.ac = self.reg.ac.wrapping_add(self.reg.mbr);
            }
            Opcode::Subt => {
                self.fetch_operand(x)?;
                self.reg.ac = self.reg.ac.wrapping_sub(self.reg.mbr);
            }
            Opcode::Input => {
                self.reg.input = read_input(console)?;
                self.reg.ac = self.reg.input;
            }
            Opcode::Output => {
                self.reg.output = self.reg.ac;
                console.write_line(&format!("{:04X}", self.reg.output))?;
            }
            Opcode::Halt => return Ok(Step::Halted),
            Opcode::Skipcond => {
                let ac = self.reg.ac as i16;
                let skip = match (x >> 10) & 0b11 {
                    0b00 => ac < 0,
                    0b01 => ac == 0,
                    0b10 => ac > 0,
                    _ => return Err(Fault::InvalidCondition { ir: self.reg.ir }),
                };
                if skip {
                    self.reg.pc = self.reg.pc.wrapping_add(1);
                }
            }
            Opcode::Jump => self.reg.pc = x,
            Opcode::Clear => self.reg.ac = 0,
            Opcode::AddI => {
                self.fetch_indirect(x)?;
                self.reg.ac = self.reg.ac.wrapping_add(self.reg.mbr);
            }
            Opcode::JumpI => {
                self.fetch_operand(x)?;
                self.reg.pc = self.reg.mbr;
            }
            Opcode::LoadI => {
                self.fetch_indirect(x)?;
                self.reg.ac = self.reg.mbr;
            }
            Opcode::StoreI => {
                self.fetch_operand(x)?;
                self.reg.mar = self.reg.mbr;
                self.reg.mbr = self.reg.ac;
                self.write(self.reg.mar, self.reg.mbr)?;
            }
            Opcode::Dump => self.dump(x, console)?,
        }
        Ok(Step::Continue)
    }

    /// `MAR <- x; MBR <- M[MAR]`
    fn fetch_operand(&mut self, x: Word) -> Result<(), Fault> {
        self.reg.mar = x;
        self.reg.mbr = self.read(self.reg.mar)?;
        Ok(())
    }

    /// Follow the pointer at `x`, leaving the pointed-to word in MBR.
    fn fetch_indirect(&mut self, x: Word) -> Result<(), Fault> {
        self.fetch_operand(x)?;
        self.fetch_operand(self.reg.mbr)
    }

    fn read(&self, addr: Word) -> Result<Word, Fault> {
        self.mem
            .get(addr as usize)
            .copied()
            .ok_or(Fault::AddressOutOfRange {
                addr,
                ir: self.reg.ir,
            })
    }

    fn write(&mut self, addr: Word, val: Word) -> Result<(), Fault> {
        let ir = self.reg.ir;
        match self.mem.get_mut(addr as usize) {
            Some(cell) => {
                *cell = val;
                Ok(())
            }
            None => Err(Fault::AddressOutOfRange { addr, ir }),
        }
    }

    /// Print registers and memory `0..end`.
    fn dump(&self, end: Word, console: &mut impl Console) -> io::Result<()> {
        console.write_line(&self.reg.to_string())?;
        for (row, words) in self.mem[..end as usize].chunks(DUMP_ROW).enumerate() {
            let words: Vec<String> = words.iter().map(|word| format!("{word:04X}")).collect();
            console.write_line(&format!("{:03X}: {}", row * DUMP_ROW, words.join(" ")))?;
        }
        Ok(())
    }
}

/// Read operator input until a line parses. End of input is a fault.
fn read_input(console: &mut impl Console) -> Result<Word, Fault> {
    loop {
        let line = console.read_line()?.ok_or(Fault::InputExhausted)?;
        match parse_input(&line) {
            Some(val) => return Ok(val),
            None => {
                warn!("rejected input `{}`", line.trim());
                console.reject_input(&line);
            }
        }
    }
}

/// Signed hex in the range `-8000..=7FFF`
fn parse_input(line: &str) -> Option<Word> {
    let val = i32::from_str_radix(line.trim(), 16).ok()?;
    i16::try_from(val).ok().map(|val| val as Word)
}
