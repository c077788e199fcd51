use std::path::PathBuf;

use thiserror::Error;

/// Primary error type for tabcheck generation and harness runs.
///
/// Oracle mismatches are not errors: the drivers report them as outcomes.
/// Everything here is either a bad configuration, a broken generation
/// post-condition, or a harness-fatal condition that ends the run.
#[derive(Error, Debug)]
pub enum OracleError {
    // === Configuration Errors ===
    /// Statistical class tag not in `{bool, cat, cont}`.
    #[error("invalid statistical class: '{tag}'")]
    InvalidStatClass { tag: String },

    /// Value representation not valid for the requested class.
    #[error("invalid representation '{tag}' for class {class}")]
    InvalidRepresentation { tag: String, class: String },

    /// A feature spec field combination that cannot be generated.
    #[error("invalid feature spec: {detail}")]
    InvalidSpec { detail: String },

    /// Canonical float format outside the supported printf subset.
    #[error("unsupported float format '{format}': {detail}")]
    InvalidFloatFormat { format: String, detail: String },

    /// Command-line or environment value that could not be interpreted.
    #[error("invalid argument {name}: {detail}")]
    InvalidArgument { name: String, detail: String },

    // === Generation Errors ===
    /// Generated vector length disagrees with the resolved spec.
    #[error("generated {actual} values, spec requested {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    // === Harness-Fatal Errors ===
    /// External program could not be started.
    #[error("failed to launch '{program}': {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External program exited unsuccessfully.
    #[error("'{program}' exited with {status}")]
    ExitStatus { program: PathBuf, status: String },

    /// External program output could not be interpreted.
    #[error("malformed output from '{program}': {detail}")]
    MalformedOutput { program: PathBuf, detail: String },

    /// Artifact file I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Run summary serialization failure.
    #[error("summary serialization failed: {0}")]
    Serialize(String),
}

/// Coarse classification used for reporting and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid spec, format or argument. Never silently coerced.
    Configuration,
    /// Generator broke its own post-condition.
    Generation,
    /// The run cannot continue; the target or the filesystem failed.
    HarnessFatal,
}

impl OracleError {
    /// Classify this error.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidStatClass { .. }
            | Self::InvalidRepresentation { .. }
            | Self::InvalidSpec { .. }
            | Self::InvalidFloatFormat { .. }
            | Self::InvalidArgument { .. } => ErrorKind::Configuration,
            Self::LengthMismatch { .. } => ErrorKind::Generation,
            Self::Launch { .. }
            | Self::ExitStatus { .. }
            | Self::MalformedOutput { .. }
            | Self::Io(_)
            | Self::Serialize(_) => ErrorKind::HarnessFatal,
        }
    }

    /// Whether the error came from the program under test rather than from
    /// tabcheck itself.
    pub const fn is_target_failure(&self) -> bool {
        matches!(
            self,
            Self::Launch { .. } | Self::ExitStatus { .. } | Self::MalformedOutput { .. }
        )
    }

    /// Process exit code for the harness binaries.
    ///
    /// `1` is reserved for oracle mismatches, which are not errors.
    pub const fn exit_code(&self) -> i32 {
        match self.kind() {
            ErrorKind::Configuration => 2,
            ErrorKind::Generation | ErrorKind::HarnessFatal => 3,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidStatClass { .. } => Some("Use one of: bool, cat, cont"),
            Self::InvalidRepresentation { .. } => {
                Some("Use str or int for bool/cat, int or fp for cont")
            }
            Self::InvalidFloatFormat { .. } => Some("Use a format such as %.1e or %+.3f"),
            Self::Launch { .. } => Some("Check that the executable path exists and is executable"),
            _ => None,
        }
    }

    /// Create an invalid-spec error.
    pub fn spec(detail: impl Into<String>) -> Self {
        Self::InvalidSpec {
            detail: detail.into(),
        }
    }

    /// Create an invalid-argument error.
    pub fn argument(name: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            detail: detail.into(),
        }
    }

    /// Create a malformed-output error.
    pub fn malformed(program: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::MalformedOutput {
            program: program.into(),
            detail: detail.into(),
        }
    }
}

/// Result type alias using `OracleError`.
pub type Result<T> = std::result::Result<T, OracleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_stat_class() {
        let err = OracleError::InvalidStatClass {
            tag: "ord".to_owned(),
        };
        assert_eq!(err.to_string(), "invalid statistical class: 'ord'");
    }

    #[test]
    fn error_display_length_mismatch() {
        let err = OracleError::LengthMismatch {
            expected: 10,
            actual: 9,
        };
        assert_eq!(err.to_string(), "generated 9 values, spec requested 10");
    }

    #[test]
    fn kind_mapping() {
        assert_eq!(OracleError::spec("x").kind(), ErrorKind::Configuration);
        assert_eq!(
            OracleError::argument("--seed", "not a number").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(
            OracleError::LengthMismatch {
                expected: 1,
                actual: 0
            }
            .kind(),
            ErrorKind::Generation
        );
        assert_eq!(
            OracleError::ExitStatus {
                program: PathBuf::from("./mtproc"),
                status: "exit status: 1".to_owned(),
            }
            .kind(),
            ErrorKind::HarnessFatal
        );
        let io = std::io::Error::other("disk gone");
        assert_eq!(OracleError::from(io).kind(), ErrorKind::HarnessFatal);
    }

    #[test]
    fn exit_codes() {
        assert_eq!(OracleError::spec("x").exit_code(), 2);
        assert_eq!(
            OracleError::malformed("./pairwise", "no fields").exit_code(),
            3
        );
    }

    #[test]
    fn target_failures() {
        assert!(OracleError::malformed("./pairwise", "short line").is_target_failure());
        assert!(!OracleError::spec("x").is_target_failure());
        assert!(!OracleError::Io(std::io::Error::other("x")).is_target_failure());
    }

    #[test]
    fn suggestions() {
        assert!(
            OracleError::InvalidStatClass {
                tag: "x".to_owned()
            }
            .suggestion()
            .is_some()
        );
        assert!(OracleError::Serialize("x".to_owned()).suggestion().is_none());
    }
}
