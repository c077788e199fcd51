//! Drivers and binaries against stub targets.
//!
//! Stubs are shell scripts run as `/bin/sh <script>`, so the executable the
//! harness sees is `/bin/sh` and the script path travels as a passthrough
//! switch.
#![cfg(unix)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tabcheck_harness::logging::init_test_logging;
use tabcheck_harness::summary::RunStatus;
use tabcheck_harness::workspace::{EXPECTED_FILE, FAILURES_DIR, INPUT_FILE, OBSERVED_FILE};
use tabcheck_gen::{FeatureSpec, Representation, StatClass};
use tabcheck_harness::{
    ArtifactWorkspace, CommuteConfig, CommuteDriver, CommuteOutcome, FeatureCheckConfig,
    FeatureCheckDriver, FeatureCheckOutcome, RoundTripConfig, RoundTripDriver, RoundTripOutcome,
    RunSummary, TargetCommand,
};

/// Echoes the oracle's own expectation: a perfect parser.
const CONFORMING: &str = r#"for last; do :; done
cat "$(dirname "$last")/expected.tsv"
"#;

const BOGUS: &str = "printf 'F:-:0:0\\tbogus\\n'\n";

const CRASHING: &str = "exit 3\n";

const COMMUTING: &str = "printf '0\\t1\\tF\\tI\\t10\\t0.5\\n'\n";

/// Arguments are `-v 0 -h -r -P <pair> <file>`; the pair is `$6`.
const ORDER_DEPENDENT: &str = r#"case "$6" in
  0,1) printf '0\t1\tF\tI\t10\t0.5\n' ;;
  *)   printf '1\t0\tI\tF\t10\t0.25\n' ;;
esac
"#;

const NAN_STATISTIC: &str = "printf 'a\\tb\\tc\\td\\t3\\tnan\\n'\n";

const TRUNCATED: &str = "printf 'a\\tb\\tc\\n'\n";

/// Feature encoder: skips the row label unless `-r` is given, maps string
/// labels to first-sight codes, and prints integers verbatim and decimals
/// with nine significant digits.
const ENCODER: &str = r##"skip=1
for a; do [ "$a" = "-r" ] && skip=0; done
awk -F '\t' -v skip="$skip" '
NR == 1 {
  n = 0; numeric = 1; integral = 1
  for (i = 1 + skip; i <= NF; i++) {
    tok[++n] = $i
    if ($i == "" || $i == "NA") continue
    if ($i !~ /^[0-9]*\.?[0-9]*$/) numeric = 0
    else if ($i ~ /\./) integral = 0
  }
  if (!numeric) integral = 1
  print "#int:" (integral ? "true" : "false")
  print "#length:" n
  codes = 0
  for (i = 1; i <= n; i++) {
    v = tok[i]
    if (v == "" || v == "NA") print "NA"
    else if (!numeric) { if (!(v in code)) code[v] = codes++; print code[v] }
    else if (integral) print v
    else printf "%.9g\n", v + 0
  }
}'
"##;

/// Answers every line with a single impossible value.
const LOSSY_ENCODER: &str = "cat >/dev/null\nprintf '#int:true\\n-1\\n'\n";

const GARBLED_ENCODER: &str = "printf '#int:true\\nbanana\\n'\n";

fn stub(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn target(script: &Path) -> TargetCommand {
    TargetCommand::parse(&format!("/bin/sh {}", script.display())).unwrap()
}

fn round_trip(dir: &Path, body: &str, iterations: u64) -> (RunSummary, tabcheck_error::Result<RoundTripOutcome>) {
    init_test_logging();
    let script = stub(dir, "parser.sh", body);
    let workspace = ArtifactWorkspace::create(dir.join("work")).unwrap();
    let mut cfg = RoundTripConfig::new(target(&script), 4, 12, iterations);
    cfg.base_seed = 0xC0FFEE;
    let driver = RoundTripDriver::new(cfg, workspace);
    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    (summary, result)
}

fn commute(dir: &Path, body: &str, tests: u64) -> (RunSummary, tabcheck_error::Result<CommuteOutcome>) {
    init_test_logging();
    let script = stub(dir, "pairwise.sh", body);
    let workspace = ArtifactWorkspace::create(dir.join("work")).unwrap();
    let driver = CommuteDriver::new(CommuteConfig::new(target(&script), 30, tests), workspace);
    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    (summary, result)
}

fn feature_check(
    dir: &Path,
    body: &str,
    spec: FeatureSpec,
    iterations: u64,
) -> (RunSummary, tabcheck_error::Result<FeatureCheckOutcome>) {
    init_test_logging();
    let script = stub(dir, "encoder.sh", body);
    let workspace = ArtifactWorkspace::create(dir.join("work")).unwrap();
    let mut cfg = FeatureCheckConfig::new(target(&script), iterations, spec);
    cfg.base_seed = 0xFEA7;
    let driver = FeatureCheckDriver::new(cfg, workspace);
    let mut summary = driver.summary();
    let result = driver.run(&mut summary);
    (summary, result)
}

// ── Round-trip driver ─────────────────────────────────────────────────────

#[test]
fn conforming_parser_passes() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = round_trip(dir.path(), CONFORMING, 6);
    assert_eq!(result.unwrap(), RoundTripOutcome::Completed { passed: 6 });
    assert_eq!(summary.status, RunStatus::Passed);

    let work = dir.path().join("work");
    for name in [INPUT_FILE, EXPECTED_FILE, OBSERVED_FILE] {
        assert!(work.join(name).is_file(), "{name} missing");
    }
    assert_eq!(
        std::fs::read(work.join(EXPECTED_FILE)).unwrap(),
        std::fs::read(work.join(OBSERVED_FILE)).unwrap()
    );
    assert!(!work.join(FAILURES_DIR).exists());
}

#[test]
fn wrong_output_is_a_mismatch_with_artifacts() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = round_trip(dir.path(), BOGUS, 6);
    let RoundTripOutcome::Mismatch(report) = result.unwrap() else {
        panic!("expected a mismatch");
    };
    assert_eq!(report.iteration, 0);
    assert_eq!(report.passed, 0);
    assert_eq!(report.diff.line, 1);
    assert_eq!(report.diff.observed.as_deref(), Some("F:-:0:0\tbogus"));
    assert_eq!(report.artifacts.outputs.len(), 2);
    for path in std::iter::once(&report.artifacts.input).chain(&report.artifacts.outputs) {
        assert!(path.starts_with(dir.path().join("work").join(FAILURES_DIR)));
        assert!(path.is_file());
    }
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn crashing_parser_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = round_trip(dir.path(), CRASHING, 3);
    let err = result.unwrap_err();
    assert!(err.is_target_failure());
    assert_eq!(err.exit_code(), 3);
    assert_eq!(summary.status, RunStatus::Fatal);
    assert_eq!(summary.passed, 0);
}

// ── Feature check driver ─────────────────────────────────────────────────

#[test]
fn encoder_keeps_labeled_lines() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = feature_check(dir.path(), ENCODER, FeatureSpec::new().labeled(true), 25);
    assert_eq!(result.unwrap(), FeatureCheckOutcome::Completed { passed: 25 });
    assert_eq!(summary.status, RunStatus::Passed);
}

#[test]
fn encoder_keeps_unlabeled_lines() {
    let dir = tempfile::tempdir().unwrap();
    let spec = FeatureSpec::new().labeled(false).na(["NA"]);
    let (_, result) = feature_check(dir.path(), ENCODER, spec, 25);
    assert_eq!(result.unwrap(), FeatureCheckOutcome::Completed { passed: 25 });
}

#[test]
fn boolean_with_five_categories_reaches_the_encoder() {
    let dir = tempfile::tempdir().unwrap();
    let spec = FeatureSpec::new()
        .class(StatClass::Bool)
        .rep(Representation::Str)
        .card(5)
        .length(40)
        .labeled(true)
        .prefixed(true);
    let (summary, result) = feature_check(dir.path(), ENCODER, spec, 10);
    assert_eq!(result.unwrap(), FeatureCheckOutcome::Completed { passed: 10 });
    assert_eq!(summary.passed, 10);
}

#[test]
fn lossy_encoder_is_caught() {
    let dir = tempfile::tempdir().unwrap();
    let spec = FeatureSpec::new()
        .class(StatClass::Cont)
        .rep(Representation::Int)
        .length(5)
        .missing(0)
        .labeled(true);
    let (summary, result) = feature_check(dir.path(), LOSSY_ENCODER, spec, 3);
    let FeatureCheckOutcome::Lost(loss) = result.unwrap() else {
        panic!("expected lost values");
    };
    assert_eq!((loss.iteration, loss.lost), (0, 5));
    assert_eq!(loss.report.values, vec![Some(-1.0)]);
    assert!(loss.artifacts.input.is_file());
    assert_eq!(summary.exit_code(), 1);
}

#[test]
fn garbled_encoder_output_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) =
        feature_check(dir.path(), GARBLED_ENCODER, FeatureSpec::new().length(3), 2);
    let err = result.unwrap_err();
    assert!(matches!(err, tabcheck_error::OracleError::MalformedOutput { .. }));
    assert_eq!(summary.exit_code(), 3);
}

// ── Commutativity driver ──────────────────────────────────────────────────

#[test]
fn commuting_tool_passes() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = commute(dir.path(), COMMUTING, 3);
    assert_eq!(result.unwrap(), CommuteOutcome::Completed { passed: 3 });
    assert_eq!(summary.passed, 3);
}

#[test]
fn nan_statistics_commute() {
    let dir = tempfile::tempdir().unwrap();
    let (_, result) = commute(dir.path(), NAN_STATISTIC, 2);
    assert_eq!(result.unwrap(), CommuteOutcome::Completed { passed: 2 });
}

#[test]
fn order_dependent_tool_is_a_violation() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = commute(dir.path(), ORDER_DEPENDENT, 3);
    let CommuteOutcome::Violation(v) = result.unwrap() else {
        panic!("expected a violation");
    };
    assert_eq!(v.test, 0);
    assert_eq!(v.input.lines().count(), 2);
    assert_eq!(summary.status, RunStatus::Mismatch);
}

#[test]
fn truncated_result_line_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let (summary, result) = commute(dir.path(), TRUNCATED, 1);
    let err = result.unwrap_err();
    assert!(matches!(err, tabcheck_error::OracleError::MalformedOutput { .. }));
    assert_eq!(summary.exit_code(), 3);
}

// ── Binaries ──────────────────────────────────────────────────────────────

fn run_bin(bin: &str, args: &[&str], work: &Path) -> Output {
    Command::new(bin)
        .args(args)
        .env("TABCHECK_WORK_DIR", work)
        .env_remove("TABCHECK_SEED")
        .env_remove("TABCHECK_FLOAT_FORMAT")
        .output()
        .unwrap()
}

const TABCHECK: &str = env!("CARGO_BIN_EXE_tabcheck");
const COMMUTE: &str = env!("CARGO_BIN_EXE_commute");
const RANDOM_FEATURE: &str = env!("CARGO_BIN_EXE_random_feature");
const FEATURE_CHECK: &str = env!("CARGO_BIN_EXE_feature_check");

#[test]
fn direct_mode_prints_input_blank_line_expected() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_bin(TABCHECK, &["--seed", "7", "3", "5"], dir.path());
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    let (input, expected) = stdout.split_once("\n\n").unwrap();
    let header = usize::from(input.lines().count() == 4);
    assert_eq!(input.lines().count(), 3 + header);
    assert_eq!(expected.lines().count(), 3);

    let again = run_bin(TABCHECK, &["--seed", "7", "3", "5"], dir.path());
    assert_eq!(String::from_utf8(again.stdout).unwrap(), stdout);
}

#[test]
fn batch_mode_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let good = stub(dir.path(), "good.sh", CONFORMING);
    let bad = stub(dir.path(), "bad.sh", BOGUS);
    let dead = stub(dir.path(), "dead.sh", CRASHING);
    let summary = dir.path().join("summary.json");

    let cmd = format!("/bin/sh {}", good.display());
    let out = run_bin(
        TABCHECK,
        &[cmd.as_str(), "3", "10", "4", "--summary-out", summary.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("4 tests passed"));
    let parsed: RunSummary = serde_json::from_slice(&std::fs::read(&summary).unwrap()).unwrap();
    assert_eq!(parsed.passed, 4);
    assert_eq!(parsed.status, RunStatus::Passed);

    let cmd = format!("/bin/sh {}", bad.display());
    let out = run_bin(TABCHECK, &[cmd.as_str(), "3", "10", "4"], dir.path());
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("0 tests passed"));

    let cmd = format!("/bin/sh {}", dead.display());
    let out = run_bin(TABCHECK, &[cmd.as_str(), "3", "10"], dir.path());
    assert_eq!(out.status.code(), Some(3));
}

#[test]
fn usage_errors_exit_two() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(run_bin(TABCHECK, &["three", "5"], dir.path()).status.code(), Some(2));
    assert_eq!(run_bin(TABCHECK, &["3"], dir.path()).status.code(), Some(2));
    assert_eq!(run_bin(TABCHECK, &["--bogus", "3", "5"], dir.path()).status.code(), Some(2));
    assert_eq!(
        run_bin(TABCHECK, &["--float-format", "%d", "3", "5"], dir.path()).status.code(),
        Some(2)
    );
    assert_eq!(run_bin(COMMUTE, &[], dir.path()).status.code(), Some(2));
    assert_eq!(
        run_bin(RANDOM_FEATURE, &["--class", "ordinal"], dir.path()).status.code(),
        Some(2)
    );
    assert_eq!(run_bin(TABCHECK, &["--help"], dir.path()).status.code(), Some(0));
}

#[test]
fn commute_binary_reports_violation() {
    let dir = tempfile::tempdir().unwrap();
    let good = stub(dir.path(), "good.sh", COMMUTING);
    let bad = stub(dir.path(), "bad.sh", ORDER_DEPENDENT);

    let cmd = format!("/bin/sh {}", good.display());
    assert_eq!(run_bin(COMMUTE, &[cmd.as_str(), "20", "3"], dir.path()).status.code(), Some(0));

    let cmd = format!("/bin/sh {}", bad.display());
    let out = run_bin(COMMUTE, &[cmd.as_str(), "20", "3"], dir.path());
    assert_eq!(out.status.code(), Some(1));
    assert_eq!(String::from_utf8_lossy(&out.stdout).lines().count(), 2);
}

#[test]
fn random_feature_honors_pinned_fields() {
    let dir = tempfile::tempdir().unwrap();
    let out = run_bin(
        RANDOM_FEATURE,
        &[
            "--class", "cont", "--rep", "int", "--length", "9", "--missing", "2", "--labeled",
            "false", "--na", "NA", "--count", "5", "--seed", "3",
        ],
        dir.path(),
    );
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(stdout.lines().count(), 5);
    for line in stdout.lines() {
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields.len(), 9);
        assert_eq!(fields.iter().filter(|f| **f == "NA").count(), 2);
        assert!(fields.iter().filter(|f| **f != "NA").all(|f| f.parse::<i64>().is_ok()));
    }
}

#[test]
fn feature_check_binary_exit_codes() {
    let dir = tempfile::tempdir().unwrap();
    let good = stub(dir.path(), "good.sh", ENCODER);
    let lossy = stub(dir.path(), "lossy.sh", LOSSY_ENCODER);

    let cmd = format!("/bin/sh {}", good.display());
    let out = run_bin(FEATURE_CHECK, &["--labeled", "true", cmd.as_str(), "4"], dir.path());
    assert_eq!(out.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&out.stdout).contains("4 tests passed"));

    let cmd = format!("/bin/sh {}", lossy.display());
    let out = run_bin(
        FEATURE_CHECK,
        &["--class", "cont", "--length", "6", "--missing", "0", cmd.as_str()],
        dir.path(),
    );
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stdout).contains("6 of 6 values lost"));

    assert_eq!(run_bin(FEATURE_CHECK, &["./no-such-encoder"], dir.path()).status.code(), Some(2));
    assert_eq!(
        run_bin(FEATURE_CHECK, &["--rep", "fp", "--class", "cat", cmd.as_str()], dir.path())
            .status
            .code(),
        Some(2)
    );
}
