//! Machine-readable record of one harness run.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use tabcheck_error::{OracleError, Result};
use tabcheck_gen::CFloatFormat;

pub const SUMMARY_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Still running, or stopped before reaching a verdict.
    Incomplete,
    Passed,
    /// The program under test disagreed with the oracle.
    Mismatch,
    /// The run could not continue.
    Fatal,
}

/// The iteration that stopped the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub iteration: u64,
    pub seed: u64,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub schema_version: u32,
    /// Binary that produced the summary.
    pub tool: String,
    /// Command line of the program under test.
    pub target: String,
    pub base_seed: u64,
    /// Iterations or tests requested.
    pub requested: u64,
    /// Float format the expected output was rendered with.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canonical: Option<CFloatFormat>,
    pub passed: u64,
    pub status: RunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunSummary {
    #[must_use]
    pub fn new(tool: &str, target: impl Into<String>, base_seed: u64, requested: u64) -> Self {
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION,
            tool: tool.to_owned(),
            target: target.into(),
            base_seed,
            requested,
            canonical: None,
            passed: 0,
            status: RunStatus::Incomplete,
            failure: None,
            error: None,
        }
    }

    #[must_use]
    pub fn with_canonical(mut self, canonical: CFloatFormat) -> Self {
        self.canonical = Some(canonical);
        self
    }

    pub fn record_pass(&mut self) {
        self.passed += 1;
    }

    pub fn finish_passed(&mut self) {
        self.status = RunStatus::Passed;
    }

    pub fn record_mismatch(&mut self, failure: FailureRecord) {
        self.status = RunStatus::Mismatch;
        self.failure = Some(failure);
    }

    pub fn record_fatal(&mut self, error: &OracleError) {
        self.status = RunStatus::Fatal;
        self.error = Some(error.to_string());
    }

    /// Process exit code: 0 pass, 1 mismatch, 3 fatal or incomplete.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Passed => 0,
            RunStatus::Mismatch => 1,
            RunStatus::Fatal | RunStatus::Incomplete => 3,
        }
    }

    /// # Errors
    ///
    /// Returns `OracleError::Serialize` if JSON encoding fails.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| OracleError::Serialize(e.to_string()))
    }

    /// Write the JSON summary, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Io` or `OracleError::Serialize`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}
