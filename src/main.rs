use std::fs;
use std::io::{self, Stdout, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use kl::{Interpreter, run_source};

/// Runs a KL program.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path of the source file to run.
    path: PathBuf,

    /// Print the global variables and the declared functions after the run.
    #[arg(long)]
    dump: bool,
}

fn dump(interp: &Interpreter<Stdout>) -> io::Result<()> {
    let mut out = io::stdout().lock();
    writeln!(out, "--- environment ---")?;
    write!(out, "{}", interp.dump_environment())?;
    writeln!(out, "--- functions ---")?;
    write!(out, "{}", interp.dump_functions())
}

fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            // --help and --version are not failures
            let code = if e.use_stderr() { 1 } else { 0 };
            let _ = e.print();
            return ExitCode::from(code);
        }
    };

    let source = match fs::read_to_string(&args.path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("Failed to read '{}': {}", args.path.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let mut interp = Interpreter::new(io::stdout());
    if let Err(e) = run_source(&mut interp, &source) {
        let file = args.path.display().to_string();
        if e.pretty_print(&file, &source).is_err() {
            eprintln!("{}", e);
        }
        return ExitCode::FAILURE;
    }

    if args.dump && dump(&interp).is_err() {
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
