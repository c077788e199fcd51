//! Drivers that run an external program against generated inputs and
//! compare what it prints with the oracle's expectation: a matrix parser,
//! a single-feature encoder, or a pairwise statistics tool.
//!
//! The library does the work; the binaries in `src/bin` only parse
//! arguments, call a driver, and map the outcome to an exit code.

pub mod commute;
pub mod compare;
pub mod config;
pub mod feature_check;
pub mod invoke;
pub mod logging;
pub mod roundtrip;
pub mod summary;
pub mod workspace;

pub use commute::{CommuteConfig, CommuteDriver, CommuteOutcome, PairResult, Violation};
pub use compare::{LineDiff, first_difference};
pub use config::HarnessConfig;
pub use feature_check::{
    EncoderReport, FeatureCheckConfig, FeatureCheckDriver, FeatureCheckOutcome, LossReport,
};
pub use invoke::{ProcessRunner, TargetCommand, TargetRunner};
pub use roundtrip::{MismatchReport, RoundTripConfig, RoundTripDriver, RoundTripOutcome};
pub use summary::{FailureRecord, RunStatus, RunSummary};
pub use workspace::{ArtifactWorkspace, PreservedFailure};
