// ABOUTME: walc compiler producing .wo dumps of expanded, optimized programs

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use wal::eval::Evaluator;
use wal::{passes, reader, wo};

/// WAL compiler: .wal source to a binary .wo expression dump
#[derive(Parser, Debug)]
#[command(name = "walc")]
#[command(version = wal::config::VERSION)]
#[command(about = "Compiles WAL programs to .wo dumps")]
struct CliArgs {
    /// Input .wal source file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output filename; defaults to the input with a .wo extension
    #[arg(short = 'o', value_name = "FILE")]
    output: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let code = match std::fs::read_to_string(&cli.input) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}: {}", cli.input.display(), e);
            return ExitCode::FAILURE;
        }
    };

    let exprs = match reader::read_sexprs(&code, &cli.input.display().to_string()) {
        Ok(exprs) => exprs,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    // the dump holds the post-expansion, post-optimization tree
    let mut ev = Evaluator::new();
    let mut compiled = Vec::with_capacity(exprs.len());
    for expr in exprs {
        let expanded = match passes::expand(&mut ev, expr) {
            Ok(expanded) => expanded,
            Err(e) => {
                eprintln!("{}", e);
                return ExitCode::FAILURE;
            }
        };
        let optimized = passes::optimize(expanded);
        // macro definitions are evaluated at compile time so the forms
        // after them expand; they still go into the dump for `eval`
        if let wal::value::Value::List(list) = &optimized {
            if matches!(
                list.first(),
                Some(wal::value::Value::Operator(wal::value::Operator::Defmacro))
            ) {
                if let Err(e) = ev.eval(&optimized) {
                    eprintln!("{}", e);
                    return ExitCode::FAILURE;
                }
            }
        }
        compiled.push(optimized);
    }

    let output = cli
        .output
        .unwrap_or_else(|| cli.input.with_extension("wo"));
    if let Err(e) = wo::write_file(&output, &compiled) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
