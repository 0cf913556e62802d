//! Unified error types for the launcher.

use std::path::PathBuf;

use crate::validate::ValidationError;

/// Main error type for launcher operations.
#[derive(Debug, thiserror::Error)]
pub enum LauncherError {
    /// The request body failed validation.
    #[error("bad input: {0}")]
    BadInput(#[from] ValidationError),

    /// The character directory does not exist.
    #[error("character '{name}' not found at {path}")]
    CharacterNotFound { name: String, path: PathBuf },

    /// The character directory has missing or ambiguous model files.
    #[error("model files for {dir}: {reason}")]
    ModelFiles { dir: PathBuf, reason: String },

    /// The reference audio could not be materialized.
    #[error("unable to prepare reference audio")]
    ReferenceAudio {
        #[source]
        source: Box<LauncherError>,
    },

    /// Cache read or write failure.
    #[error("cache error: {0}")]
    Cache(String),

    /// The inference process could not be spawned.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The inference process ran past its deadline.
    #[error("inference timeout after {ms}ms")]
    Timeout { ms: u64 },

    /// The inference process left no readable output file.
    #[error("output file {path} is missing or unreadable: {reason}")]
    OutputMissing { path: PathBuf, reason: String },

    /// The hardware probe failed or printed something that is not JSON.
    #[error("gpu info query failed: {0}")]
    GpuInfo(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error (should not happen in normal operation).
    #[error("internal error: {0}")]
    Internal(String),
}

/// Convenience type alias for Results with LauncherError.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// The two error kinds exposed to HTTP clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Schema or validation failure (400).
    BadInput,
    /// Everything else (500).
    Internal,
}

impl ErrorKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BadInput => "bad_input",
            Self::Internal => "internal",
        }
    }
}

impl LauncherError {
    /// Classify this error for the client.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BadInput(_) => ErrorKind::BadInput,
            _ => ErrorKind::Internal,
        }
    }

    /// Create a model files error.
    pub fn model_files(dir: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelFiles {
            dir: dir.into(),
            reason: reason.into(),
        }
    }

    /// Wrap a failure that happened while preparing reference audio.
    pub fn reference_audio(source: LauncherError) -> Self {
        Self::ReferenceAudio {
            source: Box::new(source),
        }
    }

    /// Create a cache error with message.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create an output missing error.
    pub fn output_missing(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::OutputMissing {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a gpu info error with message.
    pub fn gpu_info(msg: impl Into<String>) -> Self {
        Self::GpuInfo(msg.into())
    }

    /// Create a config error with message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error with message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::Constraint;

    #[test]
    fn test_error_display() {
        let err = LauncherError::Timeout { ms: 5000 };
        assert_eq!(err.to_string(), "inference timeout after 5000ms");

        let err = LauncherError::reference_audio(LauncherError::cache("no entry"));
        assert_eq!(err.to_string(), "unable to prepare reference audio");
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "cache error: no entry");
    }

    #[test]
    fn test_error_kind() {
        let err = LauncherError::from(ValidationError::new(
            "Options.Style Blend",
            Constraint::Missing,
        ));
        assert_eq!(err.kind(), ErrorKind::BadInput);

        assert_eq!(LauncherError::cache("x").kind(), ErrorKind::Internal);
        assert_eq!(
            LauncherError::model_files("/tmp", "no weights").kind(),
            ErrorKind::Internal
        );
        assert_eq!(ErrorKind::Internal.as_str(), "internal");
    }
}
