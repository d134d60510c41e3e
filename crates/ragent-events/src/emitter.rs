//! ABOUTME: Per-session event emitter with bounded backpressure
//! ABOUTME: status events are dropped before any other kind under pressure (spec.md §5)

use ragent_core::types::OrchestratorEvent;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type EventReceiver = mpsc::Receiver<OrchestratorEvent>;

#[derive(Debug, Error)]
pub enum EventSendError {
    #[error("event channel closed")]
    Closed,
}

/// Emits events to a bounded channel in the exact order stages complete
/// (spec.md §5). Emission is synchronous from the orchestrator's point of
/// view: a call either enqueues immediately or, for a droppable event
/// under a full channel, drops and returns — it never blocks the caller
/// waiting on delivery for `status` events, preserving ordering for every
/// other event kind by applying backpressure (an awaited send) instead.
#[derive(Clone)]
pub struct EventEmitter {
    sender: mpsc::Sender<OrchestratorEvent>,
}

impl EventEmitter {
    /// Creates an emitter/receiver pair with the given channel capacity.
    pub fn channel(capacity: usize) -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    pub async fn emit(&self, event: OrchestratorEvent) -> Result<(), EventSendError> {
        match self.sender.try_send(event) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EventSendError::Closed),
            Err(mpsc::error::TrySendError::Full(event)) => {
                if event.is_droppable() {
                    warn!(event = event.name(), "dropping droppable event: channel full");
                    Ok(())
                } else {
                    debug!(event = event.name(), "applying backpressure: channel full");
                    self.sender
                        .send(event)
                        .await
                        .map_err(|_| EventSendError::Closed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragent_core::types::{DoneStatus, OrchestratorEvent};

    #[tokio::test]
    async fn emits_in_order() {
        let (emitter, mut rx) = EventEmitter::channel(8);
        emitter
            .emit(OrchestratorEvent::Status { stage: "route".into() })
            .await
            .unwrap();
        emitter
            .emit(OrchestratorEvent::Status { stage: "plan".into() })
            .await
            .unwrap();
        emitter
            .emit(OrchestratorEvent::Done {
                status: DoneStatus::Complete,
            })
            .await
            .unwrap();

        assert_eq!(rx.recv().await.unwrap().name(), "status");
        assert_eq!(rx.recv().await.unwrap().name(), "status");
        assert_eq!(rx.recv().await.unwrap().name(), "done");
    }

    #[tokio::test]
    async fn drops_status_before_essential_events_under_pressure() {
        let (emitter, mut rx) = EventEmitter::channel(1);
        // Fill the single slot with a non-droppable event.
        emitter
            .emit(OrchestratorEvent::Plan {
                confidence: 0.5,
                steps: vec![],
            })
            .await
            .unwrap();

        // A status event sent now cannot fit and must be dropped, not block.
        let result = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            emitter.emit(OrchestratorEvent::Status { stage: "dispatch".into() }),
        )
        .await;
        assert!(result.is_ok(), "status emit must not block under pressure");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.name(), "plan");
    }

    #[tokio::test]
    async fn errors_once_receiver_dropped() {
        let (emitter, rx) = EventEmitter::channel(4);
        drop(rx);
        let result = emitter
            .emit(OrchestratorEvent::Status { stage: "route".into() })
            .await;
        assert!(matches!(result, Err(EventSendError::Closed)));
    }
}
