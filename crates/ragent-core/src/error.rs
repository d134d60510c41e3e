//! ABOUTME: Error types shared across the session orchestrator crates
//! ABOUTME: Mirrors the per-crate thiserror enum + Result alias convention

use thiserror::Error;

/// Result type used throughout the orchestrator crates
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error kinds for the orchestrator's control plane.
///
/// Variants map to the error taxonomy in the spec's error-handling design:
/// input errors never reach here (rejected before the pipeline runs),
/// upstream/logical/session-fatal errors do.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A collaborator call exhausted its retry budget
    #[error("upstream call to {collaborator} failed after retries: {message}")]
    Upstream {
        collaborator: String,
        message: String,
    },

    /// A collaborator returned output that could not be parsed into the
    /// expected structured shape
    #[error("failed to parse {collaborator} output: {message}")]
    ParseFailure {
        collaborator: String,
        message: String,
    },

    /// The session-wide deadline elapsed
    #[error("session deadline exceeded after {elapsed_ms}ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// The caller cancelled the session
    #[error("session cancelled")]
    Cancelled,

    /// A citation in the final answer pointed at an invalid reference
    #[error("citation [{index}] is out of range (1..={max})")]
    InvalidCitation { index: usize, max: usize },

    /// Configuration was invalid
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Serialization failure
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Any other unrecoverable condition
    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// True for the retryable upstream-transient class from the spec's
    /// error taxonomy: connection reset, timeout, 429, 503, explicit abort.
    pub fn is_retryable(message: &str) -> bool {
        let m = message.to_ascii_lowercase();
        m.contains("timeout")
            || m.contains("timed out")
            || m.contains("connection reset")
            || m.contains("429")
            || m.contains("503")
            || m.contains("abort")
    }
}
