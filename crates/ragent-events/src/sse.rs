//! ABOUTME: SSE-like framing for the typed event stream (spec.md §6.1)

use ragent_core::types::OrchestratorEvent;

/// Renders one event as `event: <name>\n data: <json>\n\n`.
pub fn frame_event(event: &OrchestratorEvent) -> String {
    let payload = serde_json::to_value(event)
        .ok()
        .and_then(|v| v.get("payload").cloned())
        .unwrap_or(serde_json::Value::Null);
    format!(
        "event: {}\ndata: {}\n\n",
        event.name(),
        serde_json::to_string(&payload).unwrap_or_else(|_| "null".to_string())
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use ragent_core::types::DoneStatus;

    #[test]
    fn frames_event_with_name_and_data_lines() {
        let frame = frame_event(&OrchestratorEvent::Done {
            status: DoneStatus::Complete,
        });
        assert!(frame.starts_with("event: done\n"));
        assert!(frame.contains("data: "));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn frame_payload_is_the_inner_value_not_the_tagged_envelope() {
        let frame = frame_event(&OrchestratorEvent::Status {
            stage: "plan".into(),
        });
        assert!(frame.contains("\"stage\":\"plan\""));
        assert!(!frame.contains("\"name\""));
    }
}
