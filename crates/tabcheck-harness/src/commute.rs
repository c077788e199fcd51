//! Commutativity driver for a pairwise statistics tool.
//!
//! For two features A and B the tool must report the same statistics for
//! the pair `(A, B)` as for `(B, A)`. Each test writes a two-row matrix to a
//! scratch file and runs the tool on it with both pair orders.

use std::ffi::OsString;
use std::io::Write as _;
use std::path::Path;

use tracing::{debug, info, info_span, warn};

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::{Feature, FeatureOptions, derive_iteration_seed, rng_from_seed};

use crate::invoke::{ProcessRunner, TargetCommand, TargetRunner};
use crate::summary::{FailureRecord, RunSummary};
use crate::workspace::{ArtifactWorkspace, PreservedFailure};

pub const DEFAULT_COLUMN_COUNT: usize = 100;
pub const DEFAULT_TEST_COUNT: u64 = 1;

/// Zero-based field holding the integer count in a result line.
pub const COUNT_FIELD: usize = 4;

/// Zero-based field holding the floating-point statistic in a result line.
pub const STATISTIC_FIELD: usize = 5;

/// Fixed switches: quiet, no header, no row labels.
const FIXED_SWITCHES: [&str; 5] = ["-v", "0", "-h", "-r", "-P"];

#[derive(Debug, Clone)]
pub struct CommuteConfig {
    pub target: TargetCommand,
    pub columns: usize,
    pub tests: u64,
    pub base_seed: u64,
    pub options: FeatureOptions,
}

impl CommuteConfig {
    #[must_use]
    pub fn new(target: TargetCommand, columns: usize, tests: u64) -> Self {
        Self {
            target,
            columns,
            tests,
            base_seed: tabcheck_gen::DEFAULT_SEED,
            options: FeatureOptions::default(),
        }
    }
}

/// The compared fields of one result line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairResult {
    pub count: i64,
    pub statistic: f64,
}

impl PairResult {
    /// Parse the first line of the tool's output.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::MalformedOutput` if the line is missing, has
    /// too few fields, or a compared field does not parse.
    pub fn parse(program: &Path, stdout: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(stdout);
        let line = text
            .lines()
            .next()
            .ok_or_else(|| OracleError::malformed(program, "no result line"))?;
        let fields: Vec<&str> = line.split('\t').collect();
        let field = |index: usize| {
            fields.get(index).map(|f| f.trim()).ok_or_else(|| {
                OracleError::malformed(
                    program,
                    format!("result line has {} fields, need {}: {line}", fields.len(), index + 1),
                )
            })
        };
        let raw_count = field(COUNT_FIELD)?;
        let count = raw_count.parse().map_err(|_| {
            OracleError::malformed(program, format!("field {COUNT_FIELD} is not an integer: {raw_count}"))
        })?;
        let raw_stat = field(STATISTIC_FIELD)?;
        let statistic = raw_stat.parse().map_err(|_| {
            OracleError::malformed(program, format!("field {STATISTIC_FIELD} is not a number: {raw_stat}"))
        })?;
        Ok(Self { count, statistic })
    }

    /// Exact equality, with two NaN statistics treated as equal.
    #[must_use]
    pub fn agrees_with(&self, other: &Self) -> bool {
        self.count == other.count
            && (self.statistic == other.statistic
                || (self.statistic.is_nan() && other.statistic.is_nan()))
    }
}

/// A pair whose statistics depended on order.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub test: u64,
    pub seed: u64,
    /// Tests that commuted before this one.
    pub passed: u64,
    /// The two-row scratch matrix.
    pub input: String,
    pub forward: PairResult,
    pub reverse: PairResult,
    pub artifacts: PreservedFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CommuteOutcome {
    Completed { passed: u64 },
    Violation(Box<Violation>),
}

/// Two-row input for one test seed; no header, no row labels.
#[must_use]
pub fn pair_input(seed: u64, columns: usize, options: &FeatureOptions) -> String {
    let mut rng = rng_from_seed(seed);
    let mut input = String::new();
    for _ in 0..2 {
        input.push_str(&Feature::random(&mut rng, columns, None, options).render_input());
        input.push('\n');
    }
    input
}

pub struct CommuteDriver<R = ProcessRunner> {
    config: CommuteConfig,
    workspace: ArtifactWorkspace,
    runner: R,
}

impl CommuteDriver<ProcessRunner> {
    #[must_use]
    pub fn new(config: CommuteConfig, workspace: ArtifactWorkspace) -> Self {
        Self::with_runner(config, workspace, ProcessRunner)
    }
}

impl<R: TargetRunner> CommuteDriver<R> {
    pub fn with_runner(config: CommuteConfig, workspace: ArtifactWorkspace, runner: R) -> Self {
        Self {
            config,
            workspace,
            runner,
        }
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            "commute",
            self.config.target.display(),
            self.config.base_seed,
            self.config.tests,
        )
    }

    /// Run up to `tests` pairs, stopping at the first violation.
    ///
    /// # Errors
    ///
    /// Harness-fatal errors: launch failure, unsuccessful exit, malformed
    /// result line, scratch file I/O.
    pub fn run(&self, summary: &mut RunSummary) -> Result<CommuteOutcome> {
        info!(
            target_cmd = %self.config.target.display(),
            columns = self.config.columns,
            tests = self.config.tests,
            base_seed = self.config.base_seed,
            "commutativity run starting"
        );
        let result = self.run_tests(summary);
        match &result {
            Ok(CommuteOutcome::Completed { passed }) => {
                summary.finish_passed();
                info!(passed, "commutativity run passed");
            }
            Ok(CommuteOutcome::Violation(v)) => summary.record_mismatch(FailureRecord {
                iteration: v.test,
                seed: v.seed,
                detail: format!("forward {:?} != reverse {:?}", v.forward, v.reverse),
                input_sha256: Some(v.artifacts.input_sha256.clone()),
                artifacts: vec![v.artifacts.input.clone()],
            }),
            Err(error) => {
                summary.record_fatal(error);
                warn!(passed = summary.passed, %error, "commutativity run aborted");
            }
        }
        result
    }

    fn run_tests(&self, summary: &mut RunSummary) -> Result<CommuteOutcome> {
        let cfg = &self.config;
        let mut passed = 0_u64;
        for test in 0..cfg.tests {
            let seed = derive_iteration_seed(cfg.base_seed, test);
            let _span = info_span!("test", test, seed).entered();

            let input = pair_input(seed, cfg.columns, &cfg.options);
            let mut scratch = tempfile::Builder::new()
                .prefix("commute-")
                .suffix(".tsv")
                .tempfile_in(self.workspace.root())?;
            scratch.write_all(input.as_bytes())?;
            scratch.flush()?;

            let forward_out = self.invoke(scratch.path(), "0,1")?;
            let reverse_out = self.invoke(scratch.path(), "1,0")?;
            let forward = PairResult::parse(&cfg.target.program, &forward_out)?;
            let reverse = PairResult::parse(&cfg.target.program, &reverse_out)?;

            if forward.agrees_with(&reverse) {
                passed += 1;
                summary.record_pass();
                debug!(passed, count = forward.count, statistic = forward.statistic, "pair commutes");
                continue;
            }

            warn!(
                passed,
                ?forward,
                ?reverse,
                "pair statistics depend on order"
            );
            let artifacts = self.workspace.preserve_failure(
                test,
                seed,
                input.as_bytes(),
                &[("forward", &forward_out), ("reverse", &reverse_out)],
            )?;
            return Ok(CommuteOutcome::Violation(Box::new(Violation {
                test,
                seed,
                passed,
                input,
                forward,
                reverse,
                artifacts,
            })));
        }
        Ok(CommuteOutcome::Completed { passed })
    }

    /// `<exe> [extra switches] -v 0 -h -r -P <pair> <file>`
    fn invoke(&self, input: &Path, pair: &str) -> Result<Vec<u8>> {
        let tail = FIXED_SWITCHES
            .into_iter()
            .map(OsString::from)
            .chain([OsString::from(pair), input.as_os_str().to_owned()]);
        let args = self.config.target.args_with(tail);
        self.runner.run_capture(&self.config.target.program, &args)
    }
}
