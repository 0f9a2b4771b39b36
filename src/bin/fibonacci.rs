use std::{fs::File, io::Write};

use clap::{Arg, Command};
use pprof::protos::Message;

use marmoset::evaluator::Evaluator;
use marmoset::parser;

fn main() {
    let matches = Command::new("fibonacci")
        .arg(
            Arg::new("cpuprofile")
                .short('p')
                .long("cpuprofile")
                .help("Optional path to save a pprof CPU profile to"),
        )
        .get_matches();

    let guard = matches
        .get_one::<String>("cpuprofile")
        .and_then(|_| pprof::ProfilerGuard::new(97).ok());

    let program = parser::parse(
        "
    let fibonacci = fn(x) {
		if (x == 0) {
			0
		} else {
			if (x == 1) {
				return 1;
			} else {
				fibonacci(x - 1) + fibonacci(x - 2);
			}
		}
	};
    fibonacci(25);
    ",
    )
    .expect("the fixed program parses");

    let mut evaluator = Evaluator::new();

    match evaluator.evaluate(&program) {
        Ok(object) => println!("Result: {}", object),
        Err(e) => println!("Unexpected error: {}", e),
    }

    if let (Some(guard), Some(path)) = (guard, matches.get_one::<String>("cpuprofile")) {
        if let Ok(report) = guard.report().build() {
            let profile = report.pprof().unwrap();

            let mut content = Vec::new();
            profile.encode(&mut content).unwrap();

            let mut file = File::create(path).unwrap();
            file.write_all(&content).unwrap();

            println!("report: {:?}", &report);
        }
    }
}
