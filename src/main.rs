use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread::sleep;
use std::time::Duration;

use clap::{Parser, Subcommand};
use colored::Colorize;
use hotwatch::notify::Event;
use hotwatch::{
    blocking::{Flow, Hotwatch},
    EventKind,
};
use miette::{bail, IntoDiagnostic, Result};
use simple_logger::SimpleLogger;

use marie::{assemble, Machine, Stdio, Step, Word};

/// Marie is an assembler and simulator for the MARIE accumulator machine.
#[derive(Parser)]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Quickly provide a `.mas` file to run
    path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Run text `.mas` or binary `.mex` file directly and output to terminal
    Run {
        /// `.mas` or `.mex` file to run
        name: PathBuf,
        /// Produce minimal output, suited for blackbox tests
        #[arg(short, long)]
        minimal: bool,
        /// Give up after this many instructions
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Create binary `.mex` memory image to run later
    Compile {
        /// `.mas` file to compile
        name: PathBuf,
        /// Destination to output `.mex` file
        dest: Option<PathBuf>,
    },
    /// Check a `.mas` file without running or outputting binary
    Check {
        /// File to check
        name: PathBuf,
    },
    /// Place a watch on a `.mas` file to receive constant assembler updates
    Watch {
        /// `.mas` file to watch
        name: PathBuf,
    },
}

fn main() -> miette::Result<()> {
    use MsgColor::*;
    let args = Args::parse();
    marie::env::init();
    SimpleLogger::new()
        .with_level(marie::env::log_level())
        .init()
        .into_diagnostic()?;

    miette::set_hook(Box::new(|_| {
        Box::new(miette::MietteHandlerOpts::new().build())
    }))?;

    if let Some(command) = args.command {
        match command {
            Command::Run {
                name,
                minimal,
                max_cycles,
            } => run(&name, minimal, max_cycles),
            Command::Compile { name, dest } => {
                file_message(Green, "Assembling", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let air = assemble(&contents)?;

                let out_file_name = dest.unwrap_or_else(|| name.with_extension("mex"));
                let bytes: Vec<u8> = air
                    .image()
                    .iter()
                    .flat_map(|word| word.to_be_bytes())
                    .collect();
                fs::write(&out_file_name, bytes).into_diagnostic()?;

                message(Green, "Finished", &format!("emit {} words", air.len()));
                file_message(Green, "Saved", &out_file_name);
                Ok(())
            }
            Command::Check { name } => {
                file_message(Green, "Checking", &name);
                let contents = fs::read_to_string(&name).into_diagnostic()?;
                let air = assemble(&contents)?;
                message(
                    Green,
                    "Success",
                    &format!(
                        "no errors found! ({} words, {} labels)",
                        air.len(),
                        air.symbols().len()
                    ),
                );
                Ok(())
            }
            Command::Watch { name } => {
                if !name.exists() {
                    bail!("File does not exist. Exiting...")
                }
                // Vim breaks if watching a single file
                let folder_path = match name.parent() {
                    Some(pth) if pth.is_dir() => pth.to_path_buf(),
                    _ => Path::new(".").to_path_buf(),
                };

                // Clear screen and move cursor to top left
                print!("\x1B[2J\x1B[2;1H");
                file_message(Green, "Watching", &name);
                message(Cyan, "Help", "press CTRL+C to exit");

                let mut watcher = Hotwatch::new_with_custom_delay(Duration::from_millis(500))
                    .into_diagnostic()?;

                watcher
                    .watch(folder_path, move |event: Event| match event.kind {
                        // Watch remove for vim changes
                        EventKind::Modify(_) | EventKind::Remove(_) => {
                            print!("\x1B[2J\x1B[2;1H");
                            file_message(Green, "Watching", &name);
                            message(Green, "Re-checking", "file change detected");
                            message(Cyan, "Help", "press CTRL+C to exit");

                            // Let the editor finish writing
                            sleep(Duration::from_millis(50));

                            let contents = match fs::read_to_string(&name) {
                                Ok(cts) => cts,
                                Err(e) => {
                                    eprintln!("{e}. Exiting...");
                                    return Flow::Exit;
                                }
                            };
                            match assemble(&contents) {
                                Ok(_) => message(Green, "Success", "no errors found!"),
                                Err(e) => println!("\n{:?}", miette::Report::new(e)),
                            }
                            Flow::Continue
                        }
                        _ => Flow::Continue,
                    })
                    .into_diagnostic()?;
                watcher.run();
                Ok(())
            }
        }
    } else if let Some(path) = args.path {
        run(&path, false, None)
    } else {
        println!("\n~ marie v{VERSION} ~");
        println!("{}", LOGO.truecolor(255, 183, 197).bold());
        println!("{SHORT_INFO}");
        Ok(())
    }
}

#[allow(unused)]
enum MsgColor {
    Green,
    Cyan,
    Red,
}

fn file_message(color: MsgColor, left: &str, right: &Path) {
    let right = format!("target {}", right.display());
    message(color, left, &right);
}

fn message(color: MsgColor, left: &str, right: &str) {
    let left = match color {
        MsgColor::Green => left.green(),
        MsgColor::Cyan => left.cyan(),
        MsgColor::Red => left.red(),
    };
    println!("{left:>12} {right}");
}

fn run(name: &Path, minimal: bool, max_cycles: Option<u64>) -> Result<()> {
    if !minimal {
        file_message(MsgColor::Green, "Assembling", name);
    }
    let image = load_image(name)?;
    let mut machine = Machine::from_raw(&image)?;
    let mut console = Stdio::new();

    if !minimal {
        message(MsgColor::Green, "Running", &format!("{} words", image.len()));
    }
    match max_cycles {
        Some(max) => {
            if machine.run_limited(&mut console, max)? == Step::Continue {
                bail!("Program did not halt within {max} cycles")
            }
        }
        None => machine.run(&mut console)?,
    }

    if !minimal {
        message(
            MsgColor::Cyan,
            "Halted",
            &format!("after {} cycles", machine.cycles()),
        );
        file_message(MsgColor::Green, "Completed", name);
    }
    Ok(())
}

/// Memory image of a source file or of a binary produced by `compile`
fn load_image(name: &Path) -> Result<Vec<Word>> {
    match name.extension().and_then(OsStr::to_str) {
        Some("mex") => {
            let buffer = fs::read(name).into_diagnostic()?;
            if buffer.len() % 2 != 0 {
                bail!("File is not aligned to 16 bits")
            }
            Ok(buffer
                .chunks_exact(2)
                .map(|word| u16::from_be_bytes([word[0], word[1]]))
                .collect())
        }
        Some("mas") => {
            let contents = fs::read_to_string(name).into_diagnostic()?;
            Ok(assemble(&contents)?.image())
        }
        Some(_) => bail!("File has unknown extension. Exiting..."),
        None => bail!("File has no extension. Exiting..."),
    }
}

const LOGO: &str = r#"
 __  __    _    ____  ___ _____
|  \/  |  / \  |  _ \|_ _| ____|
| |\/| | / _ \ | |_) || ||  _|
| |  | |/ ___ \|  _ < | || |___
|_|  |_/_/   \_\_| \_\___|_____|"#;

const SHORT_INFO: &str = r"
Welcome to marie, an assembler and simulator for the MARIE accumulator machine.
Please use `-h` or `--help` to access the usage instructions and documentation.
";

const VERSION: &str = env!("CARGO_PKG_VERSION");
