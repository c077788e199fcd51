//! Artifact directory for one driver.
//!
//! The per-iteration files have fixed names and are overwritten every
//! iteration. When an iteration fails its files are copied under
//! `failures/` with the iteration index and seed in the name, so a report
//! can be replayed with `--seed`.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::info;

use tabcheck_error::Result;

pub const INPUT_FILE: &str = "input.tsv";
pub const EXPECTED_FILE: &str = "expected.tsv";
pub const OBSERVED_FILE: &str = "observed.tsv";
pub const FAILURES_DIR: &str = "failures";

/// Copies of a failing iteration's artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreservedFailure {
    pub input: PathBuf,
    /// Companion files (`expected`/`observed`, or both command outputs).
    pub outputs: Vec<PathBuf>,
    /// Lowercase hex SHA-256 of the input bytes.
    pub input_sha256: String,
}

#[derive(Debug, Clone)]
pub struct ArtifactWorkspace {
    root: PathBuf,
}

impl ArtifactWorkspace {
    /// Use `root` as the artifact directory, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Io` if the directory cannot be created.
    pub fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn input_path(&self) -> PathBuf {
        self.root.join(INPUT_FILE)
    }

    #[must_use]
    pub fn expected_path(&self) -> PathBuf {
        self.root.join(EXPECTED_FILE)
    }

    #[must_use]
    pub fn observed_path(&self) -> PathBuf {
        self.root.join(OBSERVED_FILE)
    }

    /// Overwrite `input.tsv` and `expected.tsv`.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Io` on write failure.
    pub fn write_case(&self, input: &str, expected: &str) -> Result<()> {
        std::fs::write(self.input_path(), input)?;
        std::fs::write(self.expected_path(), expected)?;
        Ok(())
    }

    /// Contents of `observed.tsv`.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Io` if the file is missing or unreadable.
    pub fn read_observed(&self) -> Result<Vec<u8>> {
        Ok(std::fs::read(self.observed_path())?)
    }

    /// Copy a failing case to `failures/<iteration>-<seed>.<name>.tsv`.
    ///
    /// `outputs` are `(name, bytes)` pairs written next to the input.
    ///
    /// # Errors
    ///
    /// Returns `OracleError::Io` on any write failure.
    pub fn preserve_failure(
        &self,
        iteration: u64,
        seed: u64,
        input: &[u8],
        outputs: &[(&str, &[u8])],
    ) -> Result<PreservedFailure> {
        let dir = self.root.join(FAILURES_DIR);
        std::fs::create_dir_all(&dir)?;
        let stem = format!("{iteration}-{seed:016x}");

        let input_path = dir.join(format!("{stem}.input.tsv"));
        std::fs::write(&input_path, input)?;
        let mut paths = Vec::with_capacity(outputs.len());
        for (name, bytes) in outputs {
            let path = dir.join(format!("{stem}.{name}.tsv"));
            std::fs::write(&path, bytes)?;
            paths.push(path);
        }

        let input_sha256 = sha256_hex(input);
        info!(
            iteration,
            seed,
            path = %input_path.display(),
            sha256 = %input_sha256,
            "failure artifacts preserved"
        );
        Ok(PreservedFailure {
            input: input_path,
            outputs: paths,
            input_sha256,
        })
    }
}

/// Lowercase hex SHA-256 digest.
#[must_use]
pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    hex
}
