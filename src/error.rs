//! Error types for the lip-sync pipeline.
//!
//! Almost every degradation (bad WAV header, unreachable aligner, empty
//! transcript) is absorbed inside the pipeline and only shows up in the
//! timeline's `source` field. The variants here cover the few conditions
//! that are surfaced to the caller.

/// Top-level error type for viseme timeline generation.
#[derive(Debug, thiserror::Error)]
pub enum LipSyncError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Structurally invalid request that cannot be defaulted.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, LipSyncError>;
