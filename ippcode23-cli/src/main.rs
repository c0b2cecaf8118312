#[macro_use]
extern crate clap;

mod error;

use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::PathBuf;

use clap::Arg;

use error::{CliError, Error};
use ippcode23::Engine;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if let Err(err) = run(&args) {
        eprintln!("{}", err);
        std::process::exit(err.exit_code());
    }
}

fn run(args: &[String]) -> Result<(), Error> {
    let rest = &args[1..];
    let has_help = rest.iter().any(|a| a == "--help" || a == "-h");
    if has_help {
        if rest.len() != 1 {
            return Err(Error::Cli(CliError::HelpNotAlone));
        }
        build_app().print_help().ok();
        println!();
        std::process::exit(0);
    }

    let matches = build_app()
        .get_matches_from_safe(args)
        .map_err(|err| Error::Cli(CliError::InvalidArguments(err.message)))?;

    let source = matches.value_of("source");
    let input = matches.value_of("input");
    if source.is_none() && input.is_none() {
        return Err(Error::Cli(CliError::NoSourceOrInput));
    }

    let source_reader = open_or_stdin(source)?;
    let program = ippcode23_loader::load_program(source_reader)?;

    let input_reader = open_or_stdin(input)?;
    let stdout = io::stdout();
    let stderr = io::stderr();
    let mut engine = Engine::new(program, input_reader, stdout.lock(), stderr.lock());
    let code = engine.run()?;
    io::stdout().flush().ok();
    std::process::exit(code);
}

fn build_app<'a, 'b>() -> clap::App<'a, 'b> {
    app_from_crate!()
        .arg(
            Arg::with_name("source")
                .long("source")
                .takes_value(true)
                .value_name("FILE")
                .help("Path to the IPPcode23 XML source program (default: stdin)"),
        )
        .arg(
            Arg::with_name("input")
                .long("input")
                .takes_value(true)
                .value_name("FILE")
                .help("Path to the program's input (default: stdin)"),
        )
}

/// Opens `path` if given, otherwise falls back to stdin — used for both `--source` and
/// `--input`, which may each independently default the other to stdin.
fn open_or_stdin(path: Option<&str>) -> Result<Box<dyn BufRead>, Error> {
    match path {
        Some(path) => {
            let path = PathBuf::from(path);
            let file = File::open(&path).map_err(|source| {
                Error::Cli(CliError::CannotOpen { path: path.clone(), source })
            })?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}
