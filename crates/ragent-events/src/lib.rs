//! ABOUTME: Typed, ordered event stream emitted by one session to its caller
//! ABOUTME: Synchronous-from-the-orchestrator's-view channel, per spec.md §9

pub mod emitter;
pub mod sse;

pub use emitter::{EventEmitter, EventReceiver, EventSendError};
pub use sse::frame_event;
