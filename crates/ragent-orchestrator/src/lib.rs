//! ABOUTME: runSession — the top-level state machine sequencing every stage (spec.md §4.9)
//! ABOUTME: Route -> Compact -> Plan -> Escalate -> Dispatch -> Synthesize -> Critique -> Done

pub mod collaborators;
pub mod orchestrator;
mod retrying;

pub use collaborators::Collaborators;
pub use orchestrator::Orchestrator;
