//! Single-feature driver for a feature encoder.
//!
//! Each iteration generates one spec-driven line and writes it to the
//! encoder's stdin, adding `-r` when the line has no row label. The encoder
//! answers with `#key:value` metadata lines and one decoded value per line
//! (`NA` or an empty line for a missing value). A value is lost when its
//! missingness changed or its number did not survive: exactly when the
//! encoder reports `#int:true`, within [`FLOAT_TOLERANCE`] relative error
//! otherwise.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info, info_span, warn};

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::{
    CoreValue, FeatureCase, FeatureSpec, OUTPUT_MISSING_TOKEN, ResolvedSpec,
    derive_iteration_seed, generate_case, rng_from_seed,
};

use crate::invoke::{ProcessRunner, TargetCommand, TargetRunner};
use crate::roundtrip::NO_ROW_LABELS_SWITCH;
use crate::summary::{FailureRecord, RunSummary};
use crate::workspace::{ArtifactWorkspace, PreservedFailure};

/// Largest relative error accepted for non-integral values.
pub const FLOAT_TOLERANCE: f64 = 1e-7;

/// Metadata key whose truthy value switches to exact comparison.
pub const INTEGRAL_KEY: &str = "int";

const METADATA_PREFIX: char = '#';

#[derive(Debug, Clone)]
pub struct FeatureCheckConfig {
    pub target: TargetCommand,
    pub iterations: u64,
    pub base_seed: u64,
    /// Pinned fields; the rest are drawn per iteration.
    pub spec: FeatureSpec,
}

impl FeatureCheckConfig {
    #[must_use]
    pub fn new(target: TargetCommand, iterations: u64, spec: FeatureSpec) -> Self {
        Self {
            target,
            iterations,
            base_seed: tabcheck_gen::DEFAULT_SEED,
            spec,
        }
    }
}

/// What the encoder printed for one line.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncoderReport {
    pub metadata: BTreeMap<String, String>,
    pub values: Vec<Option<f64>>,
}

impl EncoderReport {
    /// # Errors
    ///
    /// Returns `OracleError::MalformedOutput` for a metadata line without
    /// `:` or a data line that is not a number.
    pub fn parse(program: &Path, stdout: &[u8]) -> Result<Self> {
        let text = String::from_utf8_lossy(stdout);
        let mut report = Self::default();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if let Some(pair) = line.strip_prefix(METADATA_PREFIX) {
                let (key, value) = pair.split_once(':').ok_or_else(|| {
                    OracleError::malformed(program, format!("metadata line without ':': {line}"))
                })?;
                report
                    .metadata
                    .insert(key.trim().to_owned(), value.trim().to_owned());
                continue;
            }
            let token = line.trim();
            let value = if token.is_empty() || token == OUTPUT_MISSING_TOKEN {
                None
            } else {
                Some(token.parse::<f64>().map_err(|_| {
                    OracleError::malformed(program, format!("data line is not a number: {line}"))
                })?)
            };
            report.values.push(value);
        }
        Ok(report)
    }

    /// Whether the encoder declared the feature integral.
    #[must_use]
    pub fn is_integral(&self) -> bool {
        self.metadata
            .get(INTEGRAL_KEY)
            .is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
    }

    /// Sent values that did not come back, plus any surplus values.
    #[must_use]
    pub fn lost_values(&self, sent: &[Option<CoreValue>]) -> usize {
        let integral = self.is_integral();
        let lost = sent
            .iter()
            .enumerate()
            .filter(|&(i, value)| {
                let expected = value.as_ref().map(CoreValue::as_f64);
                match (expected, self.values.get(i)) {
                    (None, Some(None)) => false,
                    (Some(Some(e)), Some(Some(o))) => !survived(e, *o, integral),
                    _ => true,
                }
            })
            .count();
        lost + self.values.len().saturating_sub(sent.len())
    }
}

#[allow(clippy::float_cmp)]
fn survived(expected: f64, observed: f64, integral: bool) -> bool {
    if integral {
        expected == observed
    } else {
        (expected - observed).abs() <= FLOAT_TOLERANCE * expected.abs()
    }
}

/// A line whose values did not all survive the encoder.
#[derive(Debug, Clone, PartialEq)]
pub struct LossReport {
    pub iteration: u64,
    /// `random_feature --seed <seed>` with the same pinned fields reprints
    /// the line.
    pub seed: u64,
    pub passed: u64,
    pub spec: ResolvedSpec,
    pub input: String,
    pub lost: usize,
    pub report: EncoderReport,
    pub artifacts: PreservedFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum FeatureCheckOutcome {
    Completed { passed: u64 },
    Lost(Box<LossReport>),
}

/// Generate the case for one iteration seed.
///
/// # Errors
///
/// Configuration errors from the pinned spec fields.
pub fn case_for_seed(seed: u64, spec: &FeatureSpec) -> Result<FeatureCase> {
    generate_case(&mut rng_from_seed(seed), spec)
}

pub struct FeatureCheckDriver<R = ProcessRunner> {
    config: FeatureCheckConfig,
    workspace: ArtifactWorkspace,
    runner: R,
}

impl FeatureCheckDriver<ProcessRunner> {
    #[must_use]
    pub fn new(config: FeatureCheckConfig, workspace: ArtifactWorkspace) -> Self {
        Self::with_runner(config, workspace, ProcessRunner)
    }
}

impl<R: TargetRunner> FeatureCheckDriver<R> {
    pub fn with_runner(config: FeatureCheckConfig, workspace: ArtifactWorkspace, runner: R) -> Self {
        Self {
            config,
            workspace,
            runner,
        }
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(
            "feature_check",
            self.config.target.display(),
            self.config.base_seed,
            self.config.iterations,
        )
    }

    /// Run up to `iterations` lines, stopping at the first loss.
    ///
    /// # Errors
    ///
    /// Configuration errors from the spec, and harness-fatal errors: launch
    /// failure, unsuccessful exit, malformed encoder output, artifact I/O.
    pub fn run(&self, summary: &mut RunSummary) -> Result<FeatureCheckOutcome> {
        info!(
            target_cmd = %self.config.target.display(),
            iterations = self.config.iterations,
            base_seed = self.config.base_seed,
            "feature check starting"
        );
        let result = self.run_iterations(summary);
        match &result {
            Ok(FeatureCheckOutcome::Completed { passed }) => {
                summary.finish_passed();
                info!(passed, "feature check passed");
            }
            Ok(FeatureCheckOutcome::Lost(loss)) => summary.record_mismatch(FailureRecord {
                iteration: loss.iteration,
                seed: loss.seed,
                detail: format!("{} of {} values lost", loss.lost, loss.spec.length),
                input_sha256: Some(loss.artifacts.input_sha256.clone()),
                artifacts: std::iter::once(loss.artifacts.input.clone())
                    .chain(loss.artifacts.outputs.iter().cloned())
                    .collect(),
            }),
            Err(error) => {
                summary.record_fatal(error);
                warn!(passed = summary.passed, %error, "feature check aborted");
            }
        }
        result
    }

    fn run_iterations(&self, summary: &mut RunSummary) -> Result<FeatureCheckOutcome> {
        let cfg = &self.config;
        let mut passed = 0_u64;
        for iteration in 0..cfg.iterations {
            let seed = derive_iteration_seed(cfg.base_seed, iteration);
            let _span = info_span!("iteration", iteration, seed).entered();

            let case = case_for_seed(seed, &cfg.spec)?;
            let tail = (!case.spec.labeled).then_some(NO_ROW_LABELS_SWITCH);
            let args = cfg.target.args_with(tail);
            let stdout =
                self.runner
                    .run_with_stdin(&cfg.target.program, &args, case.line.as_bytes())?;
            let report = EncoderReport::parse(&cfg.target.program, &stdout)?;
            let lost = report.lost_values(&case.data);

            if lost == 0 {
                passed += 1;
                summary.record_pass();
                debug!(passed, length = case.spec.length, "line survived");
                continue;
            }

            warn!(passed, lost, spec = ?case.spec, "values lost by encoder");
            let artifacts = self.workspace.preserve_failure(
                iteration,
                seed,
                case.line.as_bytes(),
                &[("observed", &stdout)],
            )?;
            return Ok(FeatureCheckOutcome::Lost(Box::new(LossReport {
                iteration,
                seed,
                passed,
                spec: case.spec,
                input: case.line,
                lost,
                report,
                artifacts,
            })));
        }
        Ok(FeatureCheckOutcome::Completed { passed })
    }
}
