//! Checks that a pairwise statistics tool gives the same answer for a
//! feature pair in either order.

use std::env;
use std::process::ExitCode;

use tracing::info;

use tabcheck_error::{OracleError, Result};
use tabcheck_harness::commute::{DEFAULT_COLUMN_COUNT, DEFAULT_TEST_COUNT};
use tabcheck_harness::config::{SHARED_OPTIONS_HELP, parse_count};
use tabcheck_harness::logging::init_logging;
use tabcheck_harness::{
    ArtifactWorkspace, CommuteConfig, CommuteDriver, CommuteOutcome, HarnessConfig, TargetCommand,
};

fn print_help() {
    println!(
        "\
commute: order-independence check for a pairwise statistics tool

USAGE:
    commute [OPTIONS] <executable> [column_count [test_count]]

    Each test writes two random features of column_count values (default {DEFAULT_COLUMN_COUNT})
    and runs `<executable> -v 0 -h -r -P 0,1` and `-P 1,0` on them. Fields 4 and
    5 of the first output line must agree. Runs test_count tests (default {DEFAULT_TEST_COUNT})
    and stops at the first disagreement, printing the offending pair.

OPTIONS:
{SHARED_OPTIONS_HELP}"
    );
}

fn parse_args(args: &[String]) -> Result<Option<(HarnessConfig, CommuteConfig)>> {
    let mut cfg = HarnessConfig::from_env()?;
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(None),
            _ if cfg.take_option(args, &mut i)? => {}
            flag if flag.starts_with("--") => {
                return Err(OracleError::argument(flag, "unknown option"));
            }
            value => positional.push(value.to_owned()),
        }
        i += 1;
    }
    if positional.is_empty() || positional.len() > 3 {
        return Err(OracleError::argument(
            "arguments",
            "usage: commute <executable> [column_count [test_count]]",
        ));
    }
    let target = TargetCommand::parse(&positional[0])?;
    let columns = positional
        .get(1)
        .map_or(Ok(DEFAULT_COLUMN_COUNT), |raw| parse_count("column_count", raw))?;
    let tests = positional
        .get(2)
        .map_or(Ok(DEFAULT_TEST_COUNT), |raw| parse_count("test_count", raw))?;
    let mut commute = CommuteConfig::new(target, columns, tests);
    commute.base_seed = cfg.seed;
    Ok(Some((cfg, commute)))
}

fn run(args: &[String]) -> Result<u8> {
    let Some((cfg, commute)) = parse_args(args)? else {
        print_help();
        return Ok(0);
    };
    let _log = init_logging(cfg.verbose, cfg.log_json.as_deref())?;

    let driver = CommuteDriver::new(commute, ArtifactWorkspace::create(&cfg.work_dir)?);
    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    if let Some(path) = &cfg.summary_out {
        summary.write_to(path)?;
        info!(path = %path.display(), "summary written");
    }

    if let CommuteOutcome::Violation(v) = result? {
        print!("{}", v.input);
        eprintln!(
            "test {} (seed {:#x}): -P 0,1 gave {:?}, -P 1,0 gave {:?}; {} tests passed",
            v.test, v.seed, v.forward, v.reverse, v.passed
        );
    }
    Ok(summary.exit_code())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(code) => ExitCode::from(code),
        Err(error) => {
            eprintln!("error: {error}");
            if let Some(hint) = error.suggestion() {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(3))
        }
    }
}
