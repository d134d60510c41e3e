//! ABOUTME: Retrieval Dispatcher — tiered fallback, lazy hydration, web merging
//! ABOUTME: Implements spec.md §4.6's contract for turning a Plan into evidence

pub mod dispatcher;

pub use dispatcher::{DispatchParams, Dispatcher, DispatchResult};
