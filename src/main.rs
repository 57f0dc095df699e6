use crate::pi::{lower, parse_process, Interpreter, Lowered};
use clap::{arg, command, value_parser, ArgAction, ArgMatches, Command};
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;

mod pi;

fn main() -> ExitCode {
    let matches = command!()
        .subcommand_required(true)
        .arg(
            arg!(-v --verbose "Log reductions to stderr; repeat for more detail")
                .action(ArgAction::Count)
                .global(true),
        )
        .subcommand(
            Command::new("run")
                .about("Reduce a process until no reduction is possible")
                .arg(arg!(<file> "The process file to run").value_parser(value_parser!(PathBuf)))
                .arg(arg!(--seed <SEED> "Seed for the scheduler").value_parser(value_parser!(u64)))
                .arg(
                    arg!(--"max-steps" <N> "Stop after this many reductions")
                        .value_parser(value_parser!(usize)),
                )
                .arg(arg!(-q --quiet "Only print the final state")),
        )
        .subcommand(
            Command::new("step")
                .about("Perform a single reduction")
                .arg(arg!(<file> "The process file to step").value_parser(value_parser!(PathBuf)))
                .arg(arg!(--seed <SEED> "Seed for the scheduler").value_parser(value_parser!(u64))),
        )
        .subcommand(
            Command::new("check")
                .about("Parse a process file without reducing it")
                .arg(arg!(<file> "The process file to check").value_parser(value_parser!(PathBuf))),
        )
        .get_matches();

    let level = match matches.get_count("verbose") {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    pi::set_miette_hook();

    let result = match matches.subcommand() {
        Some(("run", args)) => run(args, false),
        Some(("step", args)) => run(args, true),
        Some(("check", args)) => check(args),
        _ => unreachable!(),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(()) => ExitCode::FAILURE,
    }
}

fn load(file: &Path) -> Result<Lowered, ()> {
    let Ok(code) = fs::read_to_string(file) else {
        eprintln!("{}: {}", "Could not read file".bright_red(), file.display());
        return Err(());
    };

    let parsed = match stacker::grow(32 * 1024 * 1024, || parse_process(&code)) {
        Ok(parsed) => parsed,
        Err(error) => {
            let report = miette::Report::new(error)
                .with_source_code(miette::NamedSource::new(file.display().to_string(), code));
            eprintln!("{:?}", report);
            return Err(());
        }
    };

    lower(&parsed).map_err(|error| {
        eprintln!("{:?}", miette::Report::new(error));
    })
}

fn check(args: &ArgMatches) -> Result<(), ()> {
    let Some(file) = args.get_one::<PathBuf>("file") else {
        return Err(());
    };
    let Lowered { process, names } = load(file)?;
    println!("{}", pi::show::Showable(process.as_ref(), &names));
    if process.is_nil() {
        println!("{}", "The process is inert.".yellow());
    }
    println!("{}", "OK".bright_green());
    Ok(())
}

fn run(args: &ArgMatches, single: bool) -> Result<(), ()> {
    let Some(file) = args.get_one::<PathBuf>("file") else {
        return Err(());
    };
    let Lowered { process, names } = load(file)?;
    let interpreter = match args.get_one::<u64>("seed") {
        Some(&seed) => Interpreter::seeded(process, names, seed),
        None => Interpreter::new(process, names),
    };
    let mut interpreter = interpreter.map_err(|error| {
        eprintln!("{:?}", miette::Report::new(error));
    })?;

    let max_steps = if single {
        Some(1)
    } else {
        args.get_one::<usize>("max-steps").copied()
    };
    let quiet = !single && args.get_flag("quiet");

    if !quiet {
        println!("{}", interpreter.render());
    }

    let outcome = stacker::grow(32 * 1024 * 1024, || -> Result<_, pi::EngineError> {
        let mut steps = 0;
        while max_steps.map_or(true, |max| steps < max) {
            if !interpreter.step()? {
                return Ok((steps, true));
            }
            steps += 1;
            if !quiet {
                println!("{}", interpreter.render());
            }
        }
        Ok((steps, false))
    });

    match outcome {
        Ok((steps, normal)) => {
            if quiet {
                println!("{}", interpreter.render());
            }
            let status = if normal {
                format!("Normal form after {} step(s)", steps).bright_green()
            } else {
                format!("Stopped after {} step(s)", steps).yellow()
            };
            eprintln!("{}", status);
            Ok(())
        }
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            Err(())
        }
    }
}
