//! Round-trip driver: generate a matrix, let the parser echo it, compare.

use std::ffi::OsString;

use tracing::{debug, info, info_span, warn};

use tabcheck_error::Result;
use tabcheck_gen::{CFloatFormat, FeatureOptions, RandomMatrix, derive_iteration_seed, rng_from_seed};

use crate::compare::{LineDiff, first_difference};
use crate::invoke::{ProcessRunner, TargetCommand, TargetRunner};
use crate::summary::{FailureRecord, RunSummary};
use crate::workspace::{ArtifactWorkspace, PreservedFailure};

/// Parser switch: input has no header line.
pub const NO_HEADER_SWITCH: &str = "-h";

/// Parser switch: input lines have no row label.
pub const NO_ROW_LABELS_SWITCH: &str = "-r";

#[derive(Debug, Clone)]
pub struct RoundTripConfig {
    pub target: TargetCommand,
    pub rows: usize,
    pub cols: usize,
    pub iterations: u64,
    pub base_seed: u64,
    pub canonical: CFloatFormat,
    pub options: FeatureOptions,
}

impl RoundTripConfig {
    #[must_use]
    pub fn new(target: TargetCommand, rows: usize, cols: usize, iterations: u64) -> Self {
        Self {
            target,
            rows,
            cols,
            iterations,
            base_seed: tabcheck_gen::DEFAULT_SEED,
            canonical: CFloatFormat::canonical(),
            options: FeatureOptions::default(),
        }
    }
}

/// Everything needed to understand and replay a failed iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MismatchReport {
    pub iteration: u64,
    /// Seed the matrix was generated from; `tabcheck --seed <seed> <rows>
    /// <cols>` reprints the same case.
    pub seed: u64,
    /// Iterations that matched before this one.
    pub passed: u64,
    pub input: String,
    pub diff: LineDiff,
    pub artifacts: PreservedFailure,
}

impl MismatchReport {
    fn failure_record(&self) -> FailureRecord {
        FailureRecord {
            iteration: self.iteration,
            seed: self.seed,
            detail: self.diff.to_string(),
            input_sha256: Some(self.artifacts.input_sha256.clone()),
            artifacts: std::iter::once(self.artifacts.input.clone())
                .chain(self.artifacts.outputs.iter().cloned())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundTripOutcome {
    /// Every iteration matched.
    Completed { passed: u64 },
    /// The run stopped at the first mismatch.
    Mismatch(Box<MismatchReport>),
}

/// Generate the matrix for one iteration seed.
#[must_use]
pub fn matrix_for_seed(seed: u64, rows: usize, cols: usize, options: &FeatureOptions) -> RandomMatrix {
    RandomMatrix::build_with(&mut rng_from_seed(seed), rows, cols, options)
}

pub struct RoundTripDriver<R = ProcessRunner> {
    config: RoundTripConfig,
    workspace: ArtifactWorkspace,
    runner: R,
}

impl RoundTripDriver<ProcessRunner> {
    #[must_use]
    pub fn new(config: RoundTripConfig, workspace: ArtifactWorkspace) -> Self {
        Self::with_runner(config, workspace, ProcessRunner)
    }
}

impl<R: TargetRunner> RoundTripDriver<R> {
    pub fn with_runner(config: RoundTripConfig, workspace: ArtifactWorkspace, runner: R) -> Self {
        Self {
            config,
            workspace,
            runner,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RoundTripConfig {
        &self.config
    }

    /// Fresh summary for this driver's run.
    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            "tabcheck",
            self.config.target.display(),
            self.config.base_seed,
            self.config.iterations,
        )
        .with_canonical(self.config.canonical)
    }

    /// Run up to `iterations` cases, stopping at the first mismatch.
    ///
    /// `summary` is updated as the run progresses, so it holds the passed
    /// count even when an error ends the run early.
    ///
    /// # Errors
    ///
    /// Harness-fatal errors: the parser could not be launched or exited
    /// unsuccessfully, or an artifact could not be written or read.
    pub fn run(&self, summary: &mut RunSummary) -> Result<RoundTripOutcome> {
        let cfg = &self.config;
        info!(
            target_cmd = %cfg.target.display(),
            rows = cfg.rows,
            cols = cfg.cols,
            iterations = cfg.iterations,
            base_seed = cfg.base_seed,
            "round-trip run starting"
        );
        let result = self.run_iterations(summary);
        match &result {
            Ok(RoundTripOutcome::Completed { passed }) => {
                summary.finish_passed();
                info!(passed, "round-trip run passed");
            }
            Ok(RoundTripOutcome::Mismatch(report)) => {
                summary.record_mismatch(report.failure_record());
            }
            Err(error) => {
                summary.record_fatal(error);
                warn!(passed = summary.passed, %error, "round-trip run aborted");
            }
        }
        result
    }

    fn run_iterations(&self, summary: &mut RunSummary) -> Result<RoundTripOutcome> {
        let cfg = &self.config;
        let mut passed = 0_u64;
        for iteration in 0..cfg.iterations {
            let seed = derive_iteration_seed(cfg.base_seed, iteration);
            let _span = info_span!("iteration", iteration, seed).entered();

            let matrix = matrix_for_seed(seed, cfg.rows, cfg.cols, &cfg.options);
            let input = matrix.render_input();
            let expected = matrix.render_expected(&cfg.canonical);
            self.workspace.write_case(&input, &expected)?;

            let args = self.parser_args(&matrix);
            self.runner.run_to_file(
                &cfg.target.program,
                &args,
                &self.workspace.observed_path(),
            )?;
            let observed = self.workspace.read_observed()?;

            match first_difference(expected.as_bytes(), &observed) {
                None => {
                    passed += 1;
                    summary.record_pass();
                    debug!(passed, "iteration matched");
                }
                Some(diff) => {
                    warn!(
                        passed,
                        line = diff.line,
                        expected = diff.expected.as_deref().unwrap_or(""),
                        observed = diff.observed.as_deref().unwrap_or(""),
                        "parser output differs from oracle"
                    );
                    let artifacts = self.workspace.preserve_failure(
                        iteration,
                        seed,
                        input.as_bytes(),
                        &[("expected", expected.as_bytes()), ("observed", &observed)],
                    )?;
                    return Ok(RoundTripOutcome::Mismatch(Box::new(MismatchReport {
                        iteration,
                        seed,
                        passed,
                        input,
                        diff,
                        artifacts,
                    })));
                }
            }
        }
        Ok(RoundTripOutcome::Completed { passed })
    }

    /// `[extra switches] [-h] [-r] <input>`
    fn parser_args(&self, matrix: &RandomMatrix) -> Vec<OsString> {
        let mut tail: Vec<OsString> = Vec::with_capacity(3);
        if !matrix.has_header() {
            tail.push(NO_HEADER_SWITCH.into());
        }
        if !matrix.has_row_labels() {
            tail.push(NO_ROW_LABELS_SWITCH.into());
        }
        tail.push(self.workspace.input_path().into_os_string());
        self.config.target.args_with(tail)
    }
}
