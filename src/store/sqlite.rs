//! SQLite-backed entity store.
//!
//! Bodies are stored as JSON text in a single `entities` table. Equality scans
//! go through `json_extract` and are ordered by the row's first-write sequence.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqliteArguments, SqlitePool};
use sqlx::query::Query;
use sqlx::{Row, Sqlite};
use tracing::warn;

use super::{init_db, EntityStore, StoreError};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        SqliteStore { pool }
    }

    /// Open (or create) the database at `path` and run migrations.
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let pool = init_db(path).await?;
        Ok(SqliteStore::new(pool))
    }
}

/// Bind a JSON scalar the way `json_extract` reports it back to SQL.
fn bind_json<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::String(s) => query.bind(s.clone()),
        Value::Bool(b) => query.bind(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::Null => query.bind(Option::<String>::None),
        other => query.bind(other.to_string()),
    }
}

#[async_trait]
impl EntityStore for SqliteStore {
    async fn load(&self, kind: &str, id: &str) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM entities WHERE kind = ? AND id = ?")
            .bind(kind)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    async fn save(&self, kind: &str, id: &str, body: Value) -> Result<(), StoreError> {
        let body = serde_json::to_string(&body)?;
        sqlx::query(
            r#"
            INSERT INTO entities (kind, id, body, seq)
            VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM entities))
            ON CONFLICT(kind, id) DO UPDATE SET body = excluded.body
            "#,
        )
        .bind(kind)
        .bind(id)
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by(
        &self,
        kind: &str,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Value>, StoreError> {
        let path = format!("$.{}", field);
        let sql = if value.is_null() {
            "SELECT body FROM entities WHERE kind = ? AND json_extract(body, ?) IS ? ORDER BY seq"
        } else {
            "SELECT body FROM entities WHERE kind = ? AND json_extract(body, ?) = ? ORDER BY seq"
        };
        let query = sqlx::query(sql).bind(kind).bind(path);
        let rows = bind_json(query, value).fetch_all(&self.pool).await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.get("body");
            match serde_json::from_str(&body) {
                Ok(value) => out.push(value),
                Err(e) => warn!(kind, error = %e, "Skipping corrupt entity body"),
            }
        }
        Ok(out)
    }

    async fn count(&self, kind: &str) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM entities WHERE kind = ?")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}
