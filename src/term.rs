use std::collections::VecDeque;
use std::io::{self, BufRead, IsTerminal, Write};

use colored::Colorize;
use console::Term;
use log::warn;

/// Line-based console the machine uses for `Input`, `Output` and `Dump`.
pub trait Console {
    /// Read one line without its terminator. `None` once input is exhausted.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// Called when a line read for `Input` is not a valid value. It will be read again.
    fn reject_input(&mut self, _line: &str) {}
}

/// Console on the process' standard streams.
///
/// Prompts are only shown when stdin is an interactive terminal, so piped input produces
/// nothing but program output.
pub struct Stdio {
    interactive: bool,
    term: Term,
}

impl Stdio {
    pub fn new() -> Self {
        Stdio {
            interactive: io::stdin().is_terminal(),
            term: Term::stderr(),
        }
    }
}

impl Default for Stdio {
    fn default() -> Self {
        Self::new()
    }
}

impl Console for Stdio {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        // stdout carries program output only
        if self.interactive {
            self.term.write_str(&format!("{} ", "Input >".cyan()))?;
        }
        read_line_from(&mut io::stdin().lock())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{line}")?;
        stdout.flush()
    }

    fn reject_input(&mut self, line: &str) {
        if self.interactive {
            if let Err(err) = report_rejected(&mut self.term, line) {
                warn!("could not report rejected input: {err}");
            }
        }
    }
}

/// Read one line from `reader` without its terminator. `None` at end of input.
fn read_line_from(reader: &mut impl BufRead) -> io::Result<Option<String>> {
    let mut buf = String::new();
    if reader.read_line(&mut buf)? == 0 {
        return Ok(None);
    }
    let len = buf.trim_end_matches(['\n', '\r']).len();
    buf.truncate(len);
    Ok(Some(buf))
}

fn report_rejected(out: &mut impl Write, line: &str) -> io::Result<()> {
    writeln!(
        out,
        "{} `{}` is not a hex value from -8000 to 7FFF",
        "Invalid".red(),
        line.trim()
    )
}

/// In-memory console with queued input and captured output.
#[derive(Clone, Default, Debug)]
pub struct Buffered {
    input: VecDeque<String>,
    output: Vec<String>,
    rejected: Vec<String>,
}

impl Buffered {
    pub fn new<I, S>(input: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Buffered {
            input: input.into_iter().map(Into::into).collect(),
            output: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Lines written so far
    pub fn output(&self) -> &[String] {
        &self.output
    }

    /// Input lines the machine refused
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }
}

impl Console for Buffered {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.input.pop_front())
    }

    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.output.push(line.to_string());
        Ok(())
    }

    fn reject_input(&mut self, line: &str) {
        self.rejected.push(line.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffered_round_trip() {
        let mut console = Buffered::new(["1", "2"]);
        assert_eq!(console.read_line().unwrap().as_deref(), Some("1"));
        assert_eq!(console.read_line().unwrap().as_deref(), Some("2"));
        assert_eq!(console.read_line().unwrap(), None);

        console.write_line("00FF").unwrap();
        console.reject_input("zz");
        assert_eq!(console.output(), ["00FF"]);
        assert_eq!(console.rejected(), ["zz"]);
    }

    #[test]
    fn line_reader_end_of_input() {
        assert_eq!(read_line_from(&mut io::empty()).unwrap(), None);

        let mut reader = "\n".as_bytes();
        assert_eq!(read_line_from(&mut reader).unwrap().as_deref(), Some(""));
        assert_eq!(read_line_from(&mut reader).unwrap(), None);
    }

    #[test]
    fn line_reader_strips_terminators() {
        let mut reader = "7f\r\n-1\nlast".as_bytes();
        assert_eq!(read_line_from(&mut reader).unwrap().as_deref(), Some("7f"));
        assert_eq!(read_line_from(&mut reader).unwrap().as_deref(), Some("-1"));
        assert_eq!(read_line_from(&mut reader).unwrap().as_deref(), Some("last"));
        assert_eq!(read_line_from(&mut reader).unwrap(), None);
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn rejection_report() {
        let mut out = Vec::new();
        report_rejected(&mut out, " zz\n").unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("`zz` is not a hex value"));

        let err = report_rejected(&mut Broken, "zz").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
