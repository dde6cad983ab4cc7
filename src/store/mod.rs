//! Entity persistence.
//!
//! This module provides:
//! - The `EntityStore` trait: keyed JSON bodies with equality scans
//! - In-memory and SQLite implementations
//! - A typed `Repository` over any store

pub mod memory;
pub mod migrations;
pub mod sqlite;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

use crate::domain::Entity;

pub use memory::MemoryStore;
pub use migrations::init_db;
pub use sqlite::SqliteStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Keyed storage of entity bodies.
///
/// Reads observe every earlier write. `find_by` returns matches in the order
/// their ids were first written; later updates do not move a record.
#[async_trait]
pub trait EntityStore: Send + Sync + fmt::Debug {
    async fn load(&self, kind: &str, id: &str) -> Result<Option<Value>, StoreError>;

    /// Insert or replace the body stored under `(kind, id)`.
    async fn save(&self, kind: &str, id: &str, body: Value) -> Result<(), StoreError>;

    /// All bodies of `kind` whose top-level `field` equals `value`.
    async fn find_by(
        &self,
        kind: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, StoreError>;

    async fn count(&self, kind: &str) -> Result<usize, StoreError>;
}

/// Typed access to an [`EntityStore`].
#[derive(Debug, Clone)]
pub struct Repository {
    store: Arc<dyn EntityStore>,
}

impl Repository {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Repository { store }
    }

    /// Repository over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Repository::new(Arc::new(MemoryStore::new()))
    }

    pub async fn get<E: Entity>(&self, id: &str) -> Result<Option<E>, StoreError> {
        match self.store.load(E::KIND, id).await? {
            Some(body) => Ok(Some(serde_json::from_value(body)?)),
            None => Ok(None),
        }
    }

    pub async fn set<E: Entity>(&self, entity: &E) -> Result<(), StoreError> {
        let body = serde_json::to_value(entity)?;
        self.store.save(E::KIND, &entity.id(), body).await
    }

    /// Records of type `E` whose `field` equals `value`, in first-insertion order.
    ///
    /// Rows that no longer deserialize are skipped with a warning.
    pub async fn find_by<E: Entity, V: Serialize>(
        &self,
        field: &str,
        value: V,
    ) -> Result<Vec<E>, StoreError> {
        let needle = serde_json::to_value(value)?;
        let rows = self.store.find_by(E::KIND, field, &needle).await?;
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<E>(row) {
                Ok(entity) => out.push(entity),
                Err(e) => warn!(kind = E::KIND, error = %e, "Skipping unparsable row"),
            }
        }
        Ok(out)
    }

    pub async fn count<E: Entity>(&self) -> Result<usize, StoreError> {
        self.store.count(E::KIND).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Delegator, Timestamp};

    #[tokio::test]
    async fn test_repository_roundtrip_and_overwrite() {
        let repo = Repository::in_memory();
        let mut delegator = Delegator::new(Address::new("0xAA"), Timestamp::new(1));
        repo.set(&delegator).await.unwrap();

        delegator.withdraw_nonce = 4;
        repo.set(&delegator).await.unwrap();

        let loaded: Delegator = repo.get("0xaa").await.unwrap().unwrap();
        assert_eq!(loaded.withdraw_nonce, 4);
        assert_eq!(repo.count::<Delegator>().await.unwrap(), 1);
        assert!(repo.get::<Delegator>("0xbb").await.unwrap().is_none());
    }
}
