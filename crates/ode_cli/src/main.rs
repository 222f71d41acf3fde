//! `ode_cli [-v|--verbose] [PROBLEM_FILE.toml]`
//!
//! Without a problem file the interactive menu runs on stdin/stdout.

mod batch;
mod session;

use batch::BatchFile;
use log::info;
use ode_core::SolveOptions;
use session::Session;
use simplelog::{ColorChoice, CombinedLogger, Config, LevelFilter, TermLogger, TerminalMode};
use std::io;
use std::path::PathBuf;

const USAGE: &str = "usage: ode_cli [-v|--verbose] [PROBLEM_FILE.toml]";

#[derive(Debug, Default, PartialEq)]
struct Args {
    verbose: bool,
    help: bool,
    problem_file: Option<PathBuf>,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> anyhow::Result<Args> {
    let mut parsed = Args::default();
    for arg in args {
        match arg.as_str() {
            "-v" | "--verbose" => parsed.verbose = true,
            "-h" | "--help" => parsed.help = true,
            flag if flag.starts_with('-') => anyhow::bail!("unknown option '{flag}'\n{USAGE}"),
            _ if parsed.problem_file.is_some() => {
                anyhow::bail!("only one problem file may be given\n{USAGE}")
            }
            _ => parsed.problem_file = Some(PathBuf::from(arg)),
        }
    }
    Ok(parsed)
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };
    if let Err(err) = CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )]) {
        eprintln!("logging disabled: {err}");
    }
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1))?;
    if args.help {
        println!("{USAGE}");
        return Ok(());
    }
    init_logging(args.verbose);

    match args.problem_file {
        Some(path) => {
            let batch = BatchFile::load(&path)?;
            let failures = batch.run(&mut io::stdout().lock())?;
            if failures > 0 {
                anyhow::bail!(
                    "{failures} of {} problem(s) failed",
                    batch.problem.len()
                );
            }
            info!("all {} problem(s) solved", batch.problem.len());
        }
        None => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            Session::new(stdin.lock(), stdout.lock(), SolveOptions::default()).run()?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> anyhow::Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn no_arguments_means_interactive() {
        assert_eq!(args(&[]).expect("parse"), Args::default());
    }

    #[test]
    fn verbose_flag_and_problem_file() {
        let parsed = args(&["--verbose", "problems.toml"]).expect("parse");
        assert!(parsed.verbose);
        assert_eq!(parsed.problem_file, Some(PathBuf::from("problems.toml")));
        assert!(args(&["-v"]).expect("parse").verbose);
    }

    #[test]
    fn rejects_unknown_flags_and_extra_files() {
        let err = args(&["--quiet"]).expect_err("unknown flag");
        assert!(err.to_string().contains("unknown option '--quiet'"));
        assert!(args(&["a.toml", "b.toml"]).is_err());
    }
}
