//! Prints spec-driven feature lines. Unpinned spec fields are randomized.

use std::env;
use std::process::ExitCode;

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::{FeatureSpec, generate_case, rng_from_seed};
use tabcheck_harness::HarnessConfig;
use tabcheck_harness::config::{
    SHARED_OPTIONS_HELP, SPEC_OPTIONS_HELP, option_value, parse_count, take_spec_option,
};
use tabcheck_harness::logging::init_logging;

fn print_help() {
    println!(
        "\
random_feature: print random feature lines for parser input

USAGE:
    random_feature [OPTIONS]

SPEC OPTIONS (unset fields are chosen at random):
{SPEC_OPTIONS_HELP}
    --count <n>               Lines to print (default: 1)
    --show-spec               Print each resolved spec as JSON on stderr

OPTIONS:
{SHARED_OPTIONS_HELP}"
    );
}

struct Cli {
    harness: HarnessConfig,
    spec: FeatureSpec,
    count: u64,
    show_spec: bool,
}

fn parse_args(args: &[String]) -> Result<Option<Cli>> {
    let mut cli = Cli {
        harness: HarnessConfig::from_env()?,
        spec: FeatureSpec::new(),
        count: 1,
        show_spec: false,
    };
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => return Ok(None),
            _ if cli.harness.take_option(args, &mut i)? => {}
            _ if take_spec_option(&mut cli.spec, args, &mut i)? => {}
            "--count" => cli.count = parse_count(flag, option_value(args, &mut i)?)?,
            "--show-spec" => cli.show_spec = true,
            other => return Err(OracleError::argument(other, "unknown argument")),
        }
        i += 1;
    }
    Ok(Some(cli))
}

fn run(args: &[String]) -> Result<()> {
    let Some(cli) = parse_args(args)? else {
        print_help();
        return Ok(());
    };
    let _log = init_logging(cli.harness.verbose, cli.harness.log_json.as_deref())?;

    let mut rng = rng_from_seed(cli.harness.seed);
    for _ in 0..cli.count {
        let case = generate_case(&mut rng, &cli.spec)?;
        if cli.show_spec {
            let json = serde_json::to_string(&case.spec)
                .map_err(|e| OracleError::Serialize(e.to_string()))?;
            eprintln!("{json}");
        }
        print!("{}", case.line);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().skip(1).collect();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            if let Some(hint) = error.suggestion() {
                eprintln!("hint: {hint}");
            }
            ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(3))
        }
    }
}
