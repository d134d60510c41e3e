//! ABOUTME: Error types for the token budgeting and compaction pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ContextError>;

#[derive(Error, Debug)]
pub enum ContextError {
    #[error("budgeting failed: {0}")]
    Budgeting(String),

    #[error("compaction failed: {0}")]
    Compaction(String),

    #[error("summary selection failed: {0}")]
    Selection(String),

    #[error("other error: {0}")]
    Other(#[from] anyhow::Error),
}
