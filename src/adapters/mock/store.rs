//! In-memory metrics store.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::models::RawSample;
use crate::normalize;
use crate::traits::MetricsAccessor;

#[derive(Debug, Default)]
struct StoreState {
    latest: Option<RawSample>,
    unavailable: Option<String>,
    reads: usize,
}

/// Metrics store held in memory.
///
/// Starts empty. Clones share state, so a test can keep one handle and hand
/// another to the broadcaster.
///
/// # Example
///
/// ```ignore
/// use metricast::adapters::mock::MemoryStore;
///
/// let store = MemoryStore::new();
/// store.set_latest(serde_json::json!({"totalMemory": 1024, "usedMemory": 512}));
/// store.set_unavailable("db restarting");
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the latest row. Non-object values clear the store.
    pub fn set_latest(&self, row: serde_json::Value) {
        self.state.lock().unwrap().latest = normalize::as_raw(row);
    }

    pub fn clear(&self) {
        self.state.lock().unwrap().latest = None;
    }

    /// Make every read fail until [`MemoryStore::set_available`] is called.
    pub fn set_unavailable(&self, message: impl Into<String>) {
        self.state.lock().unwrap().unavailable = Some(message.into());
    }

    pub fn set_available(&self) {
        self.state.lock().unwrap().unavailable = None;
    }

    /// Number of `latest()` calls served so far.
    pub fn reads(&self) -> usize {
        self.state.lock().unwrap().reads
    }
}

#[async_trait]
impl MetricsAccessor for MemoryStore {
    async fn latest(&self) -> Result<Option<RawSample>, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.reads += 1;
        if let Some(message) = &state.unavailable {
            return Err(StoreError::unavailable(message.clone()));
        }
        Ok(state.latest.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_store_returns_none() {
        let store = MemoryStore::new();
        assert!(store.latest().await.unwrap().is_none());
        assert_eq!(store.reads(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_is_distinct_from_empty() {
        let store = MemoryStore::new();
        store.set_latest(json!({"totalMemory": 10, "usedMemory": 1}));
        store.set_unavailable("down");
        assert!(matches!(
            store.latest().await,
            Err(StoreError::Unavailable { .. })
        ));
        store.set_available();
        assert!(store.latest().await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let store = MemoryStore::new();
        let handle = store.clone();
        handle.set_latest(json!({"totalMemory": 10, "usedMemory": 1}));
        assert!(store.latest().await.unwrap().is_some());
        handle.clear();
        assert!(store.latest().await.unwrap().is_none());
    }
}
