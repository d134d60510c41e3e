//! ABOUTME: Reference SessionStore — keeps finalized SessionTrace rows in memory
//! ABOUTME: A stand-in for a durable store (Postgres/SQLite) behind the same trait

use async_trait::async_trait;
use parking_lot::RwLock;
use ragent_core::error::Result;
use ragent_core::traits::SessionStore;
use ragent_core::types::SessionTrace;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    traces: RwLock<HashMap<String, SessionTrace>>,
}

impl InMemorySessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self, session_id: &str) -> Option<SessionTrace> {
        self.traces.read().get(session_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.traces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save_trace(&self, trace: &SessionTrace) -> Result<()> {
        debug!(session_id = %trace.session_id, "persisting session trace");
        self.traces
            .write()
            .insert(trace.session_id.clone(), trace.clone());
        Ok(())
    }
}
