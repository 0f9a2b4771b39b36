use std::fs;
use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use marmoset::evaluator::Evaluator;
use marmoset::parser;
use marmoset::repl;

#[derive(Debug, Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a script and print the result
    Run { path: PathBuf },
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        None => {
            if let Err(err) = repl::start() {
                eprintln!("{}", err);
                process::exit(1);
            }
        }
        Some(Commands::Run { path }) => run_file(path),
    }
}

fn run_file(path: PathBuf) {
    let input = fs::read_to_string(path).unwrap_or_else(|err| {
        eprintln!("{}", err);
        process::exit(1);
    });

    let program = parser::parse(&input).unwrap_or_else(|err| {
        eprintln!("failed to parse input: {}", err);
        process::exit(1);
    });

    let mut evaluator = Evaluator::new();
    match evaluator.evaluate(&program) {
        Ok(object) => println!("{}", object),
        Err(err) => {
            eprintln!("failed to run the program: {}", err);
            process::exit(1);
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
