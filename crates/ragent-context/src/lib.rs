//! ABOUTME: Token budgeting, conversation compaction, and summary selection
//! ABOUTME: The Token Budgeter, Context Compactor, and Summary Selector (spec.md §4.1-4.3)

pub mod budgeter;
pub mod compactor;
pub mod error;
pub mod heuristics;
pub mod selector;

pub use budgeter::{budget, truncate_to_budget, HeuristicEstimator, Section, TokenEstimator};
pub use compactor::{compact, CompactedContext, CompactionCaps, HistorySummarizer, SalienceExtractor};
pub use error::{ContextError, Result};
pub use heuristics::{ConcatSummarizer, KeywordSalienceExtractor};
pub use selector::{select, SelectionMode, SelectionResult, SelectionStats};
