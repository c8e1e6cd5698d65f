use std::fs;
use std::io::{self, BufRead, IsTerminal, StdinLock};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use kaleido_core::{Driver, Event, FrontendConfig};

/// Compile Kaleido source into LLVM-style IR.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[arg(short, long, help = "Source file to compile (defaults to stdin)")]
    input: Option<String>,

    #[arg(short, long, help = "Write the module dump here instead of stdout")]
    output: Option<String>,

    #[arg(
        long,
        value_name = "NAME",
        default_value = "kaleido",
        help = "Module identifier printed in the IR header"
    )]
    module_name: String,

    #[arg(
        long,
        help = "Reject malformed numeric literals instead of using their longest valid prefix"
    )]
    strict_numbers: bool,

    #[arg(short, long, help = "Do not echo the IR of each construct to stderr")]
    quiet: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<ExitCode> {
    let config = FrontendConfig {
        strict_numbers: cli.strict_numbers,
        module_name: cli.module_name.clone(),
        ..FrontendConfig::default()
    };

    let (ir, clean) = match &cli.input {
        Some(path) => {
            let source = fs::read_to_string(path)
                .with_context(|| format!("failed to read input file {path}"))?;
            run(Driver::new(source.chars(), &config), cli.quiet)
        }
        None => {
            let stdin = io::stdin();
            let prompt = stdin.is_terminal();
            let mut chars = StdinChars::new(stdin.lock(), prompt);
            let outcome = run(Driver::new(chars.by_ref(), &config), cli.quiet);
            if let Some(err) = chars.error.take() {
                return Err(err).context("failed to read from stdin");
            }
            outcome
        }
    };

    match &cli.output {
        Some(path) => write_output(path, ir.as_bytes())?,
        None => print!("{ir}"),
    }

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Drain the driver, echoing each construct to stderr. Returns the module
/// dump and whether every construct succeeded.
fn run<I: Iterator<Item = char>>(mut driver: Driver<I>, quiet: bool) -> (String, bool) {
    let mut clean = true;
    while let Some(event) = driver.step() {
        let (heading, id) = match event {
            Event::Definition(id) => ("Read function definition:", id),
            Event::Extern(id) => ("Read extern:", id),
            Event::TopLevelExpr(id) => ("Read top-level expression:", id),
            Event::Separator => continue,
            Event::Error(err) => {
                clean = false;
                eprintln!("Error: {err}");
                continue;
            }
        };
        if quiet {
            continue;
        }
        if let Some(function) = driver.module().display_function(id) {
            eprintln!("{heading}");
            eprint!("{function}");
        }
    }
    (driver.module().to_string(), clean)
}

/// Reads stdin a line at a time so constructs are handled as soon as they
/// are typed.
struct StdinChars {
    reader: StdinLock<'static>,
    line: Vec<char>,
    position: usize,
    prompt: bool,
    error: Option<io::Error>,
}

impl StdinChars {
    fn new(reader: StdinLock<'static>, prompt: bool) -> Self {
        StdinChars {
            reader,
            line: Vec::new(),
            position: 0,
            prompt,
            error: None,
        }
    }
}

impl Iterator for StdinChars {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        if self.position == self.line.len() {
            if self.prompt {
                eprint!("ready> ");
            }
            let mut buffer = String::new();
            match self.reader.read_line(&mut buffer) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(err) => {
                    self.error = Some(err);
                    return None;
                }
            }
            self.line = buffer.chars().collect();
            self.position = 0;
        }
        let ch = self.line.get(self.position).copied();
        self.position += 1;
        ch
    }
}

fn write_output(path: &str, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = PathBuf::from(path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write output file {path}"))?;
    Ok(())
}
