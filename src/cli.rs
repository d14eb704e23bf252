//! Command-line entrypoint (spec §6, §4.8's "CLI driver" external
//! collaborator). Hand-parses argv the way the teacher's `projects/cli.rs`
//! does (a small `Command` enum plus a manual flag scan) rather than
//! pulling in an argument-parsing crate — this surface is small enough
//! that the teacher's own idiom fits directly.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use saying::say;

use crate::diagnostics::print_compiler_messages;
use crate::preprocess::BuildStamp;
use crate::settings::{Config, Flag};

const VERSION: &str = env!("CARGO_PKG_VERSION");

enum Command {
    Help,
    Version,
    Compile { input: PathBuf, output: Option<PathBuf>, include_paths: Vec<PathBuf>, flags: Vec<Flag> },
}

/// Parses argv, runs the pipeline, and translates the result into a process
/// exit code (spec §6: "Exit codes: 0 success, 1 help/version request, 1
/// any diagnostic error").
pub fn run() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let command = match parse_args(&args) {
        Ok(c) => c,
        Err(msg) => {
            say!(Red { msg });
            print_help();
            return 1;
        }
    };

    match command {
        Command::Help => {
            print_help();
            1
        }
        Command::Version => {
            say!("ccfront ", { VERSION.to_string() });
            1
        }
        Command::Compile { input, output, include_paths, flags } => run_compile(input, output, include_paths, flags),
    }
}

fn run_compile(input: PathBuf, output: Option<PathBuf>, include_paths: Vec<PathBuf>, flags: Vec<Flag>) -> i32 {
    let mut config = match crate::load_config(input) {
        Ok(c) => c,
        Err(e) => {
            say!(Red { format!("error reading project settings: {e}") });
            return 1;
        }
    };
    config.output = output;
    config.include_paths.extend(include_paths);
    config.flags.extend(flags);

    let stamp = build_stamp_now();

    if config.has_flag(Flag::DumpTokens) {
        if let Err(e) = dump_tokens(&config, stamp.clone()) {
            say!(Red { format!("error reading '{}': {e}", config.input.display()) });
            return 1;
        }
    }

    match crate::compile(&config, stamp) {
        Ok((program, messages)) => {
            if !config.has_flag(Flag::DisableWarnings) {
                print_compiler_messages(&messages);
            }
            if config.has_flag(Flag::DumpIr) {
                print!("{}", crate::ir::dump::dump_program(&program));
            }
            0
        }
        Err(messages) => {
            print_compiler_messages(&messages);
            1
        }
    }
}

/// Prints every preprocessed token up to end-of-file, one per line, for
/// `--dump-tokens`. Runs a fresh preprocessor over the same input the real
/// compile pass uses rather than sharing one, since the pipeline commits to
/// a single borrowed `Preprocessor` per translation unit (spec §4.2's "one
/// pull stream").
fn dump_tokens(config: &Config, stamp: BuildStamp) -> std::io::Result<()> {
    let source = std::fs::read_to_string(&config.input)?;
    let mut pp = crate::preprocess::Preprocessor::new(&source, config.input.clone(), config.include_paths.clone(), stamp);
    loop {
        match pp.next_token() {
            Ok(tok) => {
                let is_eof = matches!(tok.kind, crate::lex::TokenKind::Eof);
                println!("{:?} {:?}", tok.kind, tok.pos);
                if is_eof {
                    break;
                }
            }
            Err(e) => {
                say!(Red { format!("{e}") });
                break;
            }
        }
    }
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    if args.is_empty() {
        return Ok(Command::Help);
    }

    let mut input: Option<PathBuf> = None;
    let mut output: Option<PathBuf> = None;
    let mut include_paths = Vec::new();
    let mut flags = Vec::new();
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => return Ok(Command::Help),
            "--version" | "-v" => return Ok(Command::Version),
            "-o" => {
                let path = args.get(i + 1).ok_or_else(|| "missing value for -o".to_string())?;
                output = Some(PathBuf::from(path));
                i += 2;
            }
            "-I" => {
                let path = args.get(i + 1).ok_or_else(|| "missing value for -I".to_string())?;
                include_paths.push(PathBuf::from(path));
                i += 2;
            }
            "--hide-warnings" => {
                flags.push(Flag::DisableWarnings);
                i += 1;
            }
            "--dump-tokens" => {
                flags.push(Flag::DumpTokens);
                i += 1;
            }
            "--dump-ir" => {
                flags.push(Flag::DumpIr);
                i += 1;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("unknown flag: '{arg}'"));
            }
            arg => {
                if input.is_some() {
                    return Err("multiple input files are not supported".to_string());
                }
                input = Some(PathBuf::from(arg));
                i += 1;
            }
        }
    }

    let input = input.ok_or_else(|| "no input file given".to_string())?;
    Ok(Command::Compile { input, output, include_paths, flags })
}

fn print_help() {
    say!("ccfront [--help|-h] [--version|-v] [-o <outpath>] [-I <dir>] <input>");
}

/// Reads the wall clock once at startup for `__DATE__`/`__TIME__` (spec §3,
/// §6). No date/time crate is in the teacher's (or the pack's) dependency
/// stack, so this formats a `SystemTime` with a small civil-calendar
/// conversion (Howard Hinnant's `civil_from_days`) rather than adding one.
fn build_stamp_now() -> BuildStamp {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0) as i64;

    let days = secs.div_euclid(86_400);
    let time_of_day = secs.rem_euclid(86_400);
    let (hh, mm, ss) = (time_of_day / 3600, (time_of_day % 3600) / 60, time_of_day % 60);

    let (year, month, day) = civil_from_days(days);
    let month_name = MONTH_NAMES[(month - 1) as usize];

    BuildStamp::new(format!("{month_name} {day:2} {year}"), format!("{hh:02}:{mm:02}:{ss:02}"))
}

const MONTH_NAMES: [&str; 12] =
    ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Days-since-epoch to (year, month, day), per Howard Hinnant's
/// `civil_from_days` algorithm (proleptic Gregorian, valid for the whole
/// `i64` range this crate cares about).
fn civil_from_days(z: i64) -> (i64, u32, u32) {
    let z = z + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe as i64 + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = if mp < 10 { mp + 3 } else { mp - 9 } as u32;
    (if m <= 2 { y + 1 } else { y }, m, d)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn epoch_converts_to_1970_01_01() {
        assert_eq!(civil_from_days(0), (1970, 1, 1));
    }

    #[test]
    fn parses_o_flag_and_input() {
        let args: Vec<String> = vec!["-o".into(), "out.asm".into(), "main.c".into()];
        match parse_args(&args).unwrap() {
            Command::Compile { input, output, .. } => {
                assert_eq!(input, PathBuf::from("main.c"));
                assert_eq!(output, Some(PathBuf::from("out.asm")));
            }
            _ => panic!("expected Compile command"),
        }
    }

    #[test]
    fn rejects_multiple_inputs() {
        let args: Vec<String> = vec!["a.c".into(), "b.c".into()];
        assert!(parse_args(&args).is_err());
    }

    #[test]
    fn no_args_is_help() {
        let args: Vec<String> = vec![];
        assert!(matches!(parse_args(&args).unwrap(), Command::Help));
    }
}
