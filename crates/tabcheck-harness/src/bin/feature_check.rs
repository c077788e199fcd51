//! Feeds spec-driven feature lines to a feature encoder on stdin and counts
//! the values that did not survive.

use std::env;
use std::process::ExitCode;

use tracing::info;

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::FeatureSpec;
use tabcheck_harness::config::{
    SHARED_OPTIONS_HELP, SPEC_OPTIONS_HELP, parse_count, take_spec_option,
};
use tabcheck_harness::feature_check::{FeatureCheckConfig, FeatureCheckDriver, FeatureCheckOutcome};
use tabcheck_harness::logging::init_logging;
use tabcheck_harness::{ArtifactWorkspace, HarnessConfig, TargetCommand};

fn print_help() {
    println!(
        "\
feature_check: round-trip single feature lines through a feature encoder

USAGE:
    feature_check [OPTIONS] \"<executable> [switches]\" [iterations]
        Write one generated line per iteration to the encoder's stdin (with
        -r when the line is unlabeled) and compare the values it prints.

SPEC OPTIONS (unset fields are chosen per iteration):
{SPEC_OPTIONS_HELP}

OPTIONS:
{SHARED_OPTIONS_HELP}

EXIT STATUS:
    0 every value survived, 1 values lost, 2 usage error, 3 encoder failure"
    );
}

struct Cli {
    harness: HarnessConfig,
    spec: FeatureSpec,
    target: TargetCommand,
    iterations: u64,
}

fn parse_args(args: &[String]) -> Result<Option<Cli>> {
    let mut harness = HarnessConfig::from_env()?;
    let mut spec = FeatureSpec::new();
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(None),
            _ if harness.take_option(args, &mut i)? => {}
            _ if take_spec_option(&mut spec, args, &mut i)? => {}
            flag if flag.starts_with("--") => {
                return Err(OracleError::argument(flag, "unknown option"));
            }
            value => positional.push(value.to_owned()),
        }
        i += 1;
    }

    let (raw_target, iterations) = match positional.as_slice() {
        [target] => (target, 1),
        [target, iterations] => (target, parse_count("iterations", iterations)?),
        _ => {
            return Err(OracleError::argument(
                "arguments",
                "expected \"<executable>\" [iterations]",
            ));
        }
    };
    let target = TargetCommand::parse(raw_target)?;
    if !target.is_executable() {
        return Err(OracleError::argument(
            "executable",
            format!("'{}' is not an executable file", target.program.display()),
        ));
    }
    Ok(Some(Cli {
        harness,
        spec,
        target,
        iterations,
    }))
}

fn run(args: &[String]) -> Result<u8> {
    let Some(cli) = parse_args(args)? else {
        print_help();
        return Ok(0);
    };
    let _log = init_logging(cli.harness.verbose, cli.harness.log_json.as_deref())?;

    let workspace = ArtifactWorkspace::create(&cli.harness.work_dir)?;
    let mut config = FeatureCheckConfig::new(cli.target, cli.iterations, cli.spec);
    config.base_seed = cli.harness.seed;
    let driver = FeatureCheckDriver::new(config, workspace);

    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    if let Some(path) = &cli.harness.summary_out {
        summary.write_to(path)?;
        info!(path = %path.display(), "summary written");
    }

    match result? {
        FeatureCheckOutcome::Completed { passed } => println!("{passed} tests passed"),
        FeatureCheckOutcome::Lost(loss) => {
            print!("{}", loss.input);
            println!("{} of {} values lost", loss.lost, loss.spec.length);
            println!("{} tests passed", loss.passed);
            println!(
                "replay: random_feature --seed {:#x} <same spec options>  (input sha256 {})",
                loss.seed, loss.artifacts.input_sha256
            );
        }
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
