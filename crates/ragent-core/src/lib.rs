//! ABOUTME: Shared types, collaborator traits, and error kinds for the RAG session orchestrator
//! ABOUTME: Foundation layer depended on by every other ragent crate

pub mod cache;
pub mod error;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{CoreError, Result};
pub use types::*;
