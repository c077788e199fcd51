//! Round-trip oracle for a type-inferring matrix parser.
//!
//! Direct mode prints one generated matrix and its expected parse. Batch
//! mode is selected when the first argument starts with an executable
//! file; the rest of that argument is passed to it verbatim.

use std::env;
use std::process::ExitCode;

use tracing::info;

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::FeatureOptions;
use tabcheck_harness::config::{SHARED_OPTIONS_HELP, parse_count};
use tabcheck_harness::logging::init_logging;
use tabcheck_harness::roundtrip::matrix_for_seed;
use tabcheck_harness::{
    ArtifactWorkspace, HarnessConfig, RoundTripConfig, RoundTripDriver, RoundTripOutcome,
    TargetCommand,
};

const RULE: &str = "-------------------";

fn print_help() {
    println!(
        "\
tabcheck: round-trip oracle for a type-inferring matrix parser

USAGE:
    tabcheck [OPTIONS] <rows> <cols>
        Print a random matrix, a blank line, then the expected parser output.

    tabcheck [OPTIONS] \"<executable> [switches]\" <rows> <cols> [iterations]
        Run the parser on fresh matrices until one fails (default: 1 iteration).
        Artifacts input.tsv, expected.tsv and observed.tsv go to the work dir.

OPTIONS:
{SHARED_OPTIONS_HELP}

EXIT STATUS:
    0 all iterations matched, 1 mismatch, 2 usage error, 3 parser failure"
    );
}

enum Mode {
    Direct {
        rows: usize,
        cols: usize,
    },
    Batch {
        target: TargetCommand,
        rows: usize,
        cols: usize,
        iterations: u64,
    },
    Help,
}

fn parse_args(args: &[String]) -> Result<(HarnessConfig, Mode)> {
    let mut cfg = HarnessConfig::from_env()?;
    let mut positional = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok((cfg, Mode::Help)),
            _ if cfg.take_option(args, &mut i)? => {}
            flag if flag.starts_with("--") => {
                return Err(OracleError::argument(flag, "unknown option"));
            }
            value => positional.push(value.to_owned()),
        }
        i += 1;
    }

    let first = positional
        .first()
        .ok_or_else(|| OracleError::argument("rows", "missing (see --help)"))?;
    let target = TargetCommand::parse(first)?;
    let mode = if target.is_executable() {
        if !(3..=4).contains(&positional.len()) {
            return Err(OracleError::argument(
                "arguments",
                "batch mode takes \"<executable>\" <rows> <cols> [iterations]",
            ));
        }
        Mode::Batch {
            target,
            rows: parse_count("rows", &positional[1])?,
            cols: parse_count("cols", &positional[2])?,
            iterations: positional
                .get(3)
                .map_or(Ok(1), |raw| parse_count("iterations", raw))?,
        }
    } else {
        if positional.len() != 2 {
            return Err(OracleError::argument(
                "arguments",
                format!("direct mode takes <rows> <cols>; '{first}' is not an executable file"),
            ));
        }
        Mode::Direct {
            rows: parse_count("rows", &positional[0])?,
            cols: parse_count("cols", &positional[1])?,
        }
    };
    Ok((cfg, mode))
}

fn run_batch(
    cfg: &HarnessConfig,
    target: TargetCommand,
    rows: usize,
    cols: usize,
    iterations: u64,
) -> Result<u8> {
    let workspace = ArtifactWorkspace::create(&cfg.work_dir)?;
    let mut rt = RoundTripConfig::new(target, rows, cols, iterations);
    rt.base_seed = cfg.seed;
    rt.canonical = cfg.canonical;
    let driver = RoundTripDriver::new(rt, workspace);

    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    if let Some(path) = &cfg.summary_out {
        summary.write_to(path)?;
        info!(path = %path.display(), "summary written");
    }

    match result? {
        RoundTripOutcome::Completed { passed } => {
            println!("{passed} tests passed");
        }
        RoundTripOutcome::Mismatch(report) => {
            println!("{RULE}");
            print!("{}", report.input);
            println!("{RULE}");
            println!("{}", report.diff);
            println!("{} tests passed", report.passed);
            println!(
                "replay: tabcheck --seed {:#x} {rows} {cols}  (input sha256 {})",
                report.seed, report.artifacts.input_sha256
            );
        }
    }
    Ok(summary.exit_code())
}

fn run(args: &[String]) -> Result<u8> {
    let (cfg, mode) = parse_args(args)?;
    if matches!(mode, Mode::Help) {
        print_help();
        return Ok(0);
    }
    let _log = init_logging(cfg.verbose, cfg.log_json.as_deref())?;

    match mode {
        Mode::Direct { rows, cols } => {
            let matrix = matrix_for_seed(cfg.seed, rows, cols, &FeatureOptions::default());
            info!(seed = cfg.seed, rows, cols, "direct mode");
            print!("{}", matrix.render_input());
            println!();
            print!("{}", matrix.render_expected(&cfg.canonical));
            Ok(0)
        }
        Mode::Batch {
            target,
            rows,
            cols,
            iterations,
        } => run_batch(&cfg, target, rows, cols, iterations),
        Mode::Help => Ok(0),
    }
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
