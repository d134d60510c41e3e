//! ABOUTME: Process-wide bounded shared state: embedding cache and retry telemetry
//! ABOUTME: Guarded concurrent structures per spec.md §5's shared-resource policy

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

/// Bounded, concurrently-accessible embedding cache with FIFO eviction.
///
/// Process-wide and shared across sessions (spec.md §5); mutation is
/// guarded by `DashMap`'s internal sharded locking plus a small eviction
/// queue under its own mutex, mirroring the bounded-buffer style of
/// `llmspell-events::overflow`.
pub struct EmbeddingCache {
    entries: DashMap<String, Vec<f32>>,
    order: Mutex<VecDeque<String>>,
    capacity: usize,
}

impl EmbeddingCache {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        })
    }

    pub fn get(&self, key: &str) -> Option<Vec<f32>> {
        self.entries.get(key).map(|v| v.clone())
    }

    pub fn insert(&self, key: String, value: Vec<f32>) {
        if self.entries.contains_key(&key) {
            self.entries.insert(key, value);
            return;
        }
        let mut order = self.order.lock();
        if order.len() >= self.capacity {
            if let Some(evicted) = order.pop_front() {
                self.entries.remove(&evicted);
            }
        }
        order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One row of the process-wide retry log.
#[derive(Debug, Clone)]
pub struct RetryLogEntry {
    pub collaborator: String,
    pub attempt: u32,
    pub message: String,
}

/// Append-only, bounded retry telemetry buffer shared across sessions.
pub struct RetryTelemetryLog {
    entries: Mutex<VecDeque<RetryLogEntry>>,
    capacity: usize,
}

impl RetryTelemetryLog {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: Mutex::new(VecDeque::new()),
            capacity: capacity.max(1),
        })
    }

    pub fn record(&self, entry: RetryLogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn snapshot(&self) -> Vec<RetryLogEntry> {
        self.entries.lock().iter().cloned().collect()
    }
}
