//! loxvm CLI: run a script file or start the REPL.

use std::io::{self, BufRead, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::Parser as ClapParser;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing_subscriber::EnvFilter;

use loxvm::config::VmConfig;
use loxvm::error::LoxError;
use loxvm::vm::Vm;

const EXIT_USAGE: u8 = 64;
const EXIT_IO: u8 = 74;

#[derive(ClapParser)]
#[command(name = "loxvm")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Bytecode virtual machine for the Lox scripting language", long_about = None)]
struct Args {
    /// Script to run (starts the REPL if omitted)
    script: Option<PathBuf>,

    /// Log every instruction as it executes
    #[arg(long)]
    trace: bool,

    /// Log the disassembly of compiled code
    #[arg(long)]
    print_code: bool,
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            let _ = err.print();
            return match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(EXIT_USAGE),
            };
        }
    };

    let env_config = VmConfig::from_env();
    let config = env_config
        .with_trace_execution(args.trace || env_config.trace_execution)
        .with_print_code(args.print_code || env_config.print_code);

    init_logging(&config);
    colored::control::set_override(io::stderr().is_terminal());

    match &args.script {
        Some(path) => run_file(path, config),
        None => run_repl(config),
    }
}

/// Install a stderr subscriber. Debug switches raise the default level so
/// their output is visible without setting `RUST_LOG`.
fn init_logging(config: &VmConfig) {
    let default_directive = if config.trace_execution || config.print_code {
        "loxvm=trace"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn report(err: &LoxError) {
    eprintln!("{}", err.to_string().red());
}

fn run_file(path: &Path, config: VmConfig) -> ExitCode {
    match loxvm::run_file(path, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(LoxError::Io(err)) => {
            eprintln!(
                "{}",
                format!("Could not read file \"{}\": {}", path.display(), err).red()
            );
            ExitCode::from(EXIT_IO)
        }
        Err(err) => {
            report(&err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn run_repl(config: VmConfig) -> ExitCode {
    let mut vm = Vm::with_config(config);

    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(_) => return run_basic_repl(&mut vm),
    };

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(line.as_str());
                if let Err(err) = vm.interpret(&line) {
                    report(&err);
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("{}", format!("Input error: {}", err).red());
                return ExitCode::from(EXIT_IO);
            }
        }
    }
    ExitCode::SUCCESS
}

/// Line-by-line REPL for terminals the line editor cannot drive.
fn run_basic_repl(vm: &mut Vm) -> ExitCode {
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("> ");
        let _ = io::stdout().flush();

        match lines.next() {
            Some(Ok(line)) => {
                if let Err(err) = vm.interpret(&line) {
                    report(&err);
                }
            }
            Some(Err(err)) => {
                eprintln!("{}", format!("Input error: {}", err).red());
                return ExitCode::from(EXIT_IO);
            }
            None => return ExitCode::SUCCESS,
        }
    }
}
