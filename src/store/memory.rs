//! In-memory entity store.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{EntityStore, StoreError};

#[derive(Debug, Default)]
struct Inner {
    rows: HashMap<(String, String), (u64, Value)>,
    next_seq: u64,
}

/// Process-local store. Each record remembers the sequence number of its first write.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn load(&self, kind: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .rows
            .get(&(kind.to_string(), id.to_string()))
            .map(|(_, body)| body.clone()))
    }

    async fn save(&self, kind: &str, id: &str, body: Value) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (kind.to_string(), id.to_string());
        if let Some(entry) = inner.rows.get_mut(&key) {
            entry.1 = body;
            return Ok(());
        }
        inner.next_seq += 1;
        let seq = inner.next_seq;
        inner.rows.insert(key, (seq, body));
        Ok(())
    }

    async fn find_by(
        &self,
        kind: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, StoreError> {
        let inner = self.inner.lock().await;
        let mut matches: Vec<(u64, Value)> = inner
            .rows
            .iter()
            .filter(|((k, _), (_, body))| k == kind && body.get(field) == Some(value))
            .map(|(_, (seq, body))| (*seq, body.clone()))
            .collect();
        matches.sort_by_key(|(seq, _)| *seq);
        Ok(matches.into_iter().map(|(_, body)| body).collect())
    }

    async fn count(&self, kind: &str) -> Result<usize, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.rows.keys().filter(|(k, _)| k == kind).count())
    }
}
