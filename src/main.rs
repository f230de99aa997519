// ABOUTME: wal command line runner and REPL entry point

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use wal::value::Value;
use wal::{repl, Wal, WalError};

// sysexits-style codes, like the reference tooling around WAL uses
const EX_DATAERR: u8 = 65;
const EX_SOFTWARE: u8 = 70;

/// Waveform Analysis Language interpreter
#[derive(Parser, Debug)]
#[command(name = "wal")]
#[command(version = wal::config::VERSION)]
#[command(about = "A Lisp for analyzing digital hardware simulation waveforms")]
struct CliArgs {
    /// Program to run: a .wal source or a compiled .wo dump.
    /// Starts the interactive shell when omitted.
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Script arguments, available to the program as the `args` list
    #[arg(value_name = "ARGS", trailing_var_arg = true)]
    args: Vec<String>,

    /// Additional directory searched by require (can be repeated)
    #[arg(long = "library-path", value_name = "DIR", action = clap::ArgAction::Append)]
    library_paths: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let mut wal = Wal::new();
    for path in &cli.library_paths {
        wal.append_library_path(path.clone());
    }

    let script_args = Value::list(cli.args.iter().cloned().map(Value::Str).collect());
    if let Err(e) = wal.evaluator.global.write("args", script_args) {
        eprintln!("{}", e);
        return ExitCode::from(EX_SOFTWARE);
    }

    let Some(script) = cli.script else {
        repl::run(&mut wal.evaluator);
        return ExitCode::SUCCESS;
    };

    match wal.run_file(&script) {
        Ok(_) => ExitCode::SUCCESS,
        Err(WalError::Parse(e)) => {
            eprintln!("{}", e);
            ExitCode::from(EX_DATAERR)
        }
        Err(WalError::Eval(e)) => {
            eprintln!("{}", e);
            let backtrace = e.render_backtrace();
            if !backtrace.is_empty() {
                eprint!("{}", backtrace);
            }
            ExitCode::from(EX_SOFTWARE)
        }
    }
}
