use std::io;
use std::io::BufRead;
use std::io::Write;

use crate::evaluator::Evaluator;
use crate::parser;

/// Line-at-a-time driver. A single evaluator lives for the whole session, so
/// bindings and closures persist across inputs and its heap carries the
/// session state.
pub fn start() -> io::Result<()> {
    let stdin = io::stdin();
    let mut evaluator = Evaluator::new();

    loop {
        print!(">> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }

        let program = match parser::parse(&line) {
            Ok(program) => program,
            Err(err) => {
                println!("parse error: {}", err);
                continue;
            }
        };

        match evaluator.evaluate(&program) {
            Ok(object) => println!("{}", object),
            Err(err) => println!("runtime error: {}", err),
        }
    }
}
