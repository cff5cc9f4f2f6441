//! SQLite-backed [`DocumentStore`].
//!
//! Each document is one row of the `documents` table holding its JSON body.
//! Batches run inside a single SQLite transaction, one writer at a time, so
//! guards and read-modify-write ops see the state they commit against.
//! Watchers of every touched collection are notified once the transaction
//! has committed.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::{SqliteConnection, SqlitePool};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, watch};
use uuid::Uuid;

use super::{Document, DocumentStore, Fields, Patch, Query, Result, StoreError, WriteOp};

/// Default batch cap, matching common hosted document stores.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 500;

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    versions: Arc<Mutex<HashMap<String, watch::Sender<u64>>>>,
    writer: Arc<AsyncMutex<()>>,
    max_batch_size: usize,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_batch_limit(pool, DEFAULT_MAX_BATCH_SIZE)
    }

    pub fn with_batch_limit(pool: SqlitePool, max_batch_size: usize) -> Self {
        Self {
            pool,
            versions: Arc::new(Mutex::new(HashMap::new())),
            writer: Arc::new(AsyncMutex::new(())),
            max_batch_size: max_batch_size.max(1),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn notify(&self, collection: &str) {
        let versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = versions.get(collection) {
            tx.send_modify(|v| *v += 1);
        }
    }

    /// Run writes in one transaction, then wake watchers.
    async fn apply(&self, ops: Vec<WriteOp>) -> Result<()> {
        if ops.is_empty() {
            return Ok(());
        }

        let touched: BTreeSet<String> = ops
            .iter()
            .filter(|op| op.is_write())
            .map(|op| op.collection().to_string())
            .collect();

        let writer = self.writer.lock().await;
        let mut tx = self.pool.begin().await?;
        for op in ops {
            apply_op(&mut *tx, op).await?;
        }
        tx.commit().await?;
        drop(writer);

        for collection in &touched {
            self.notify(collection);
        }
        Ok(())
    }
}

async fn apply_op(conn: &mut SqliteConnection, op: WriteOp) -> Result<()> {
    match op {
        WriteOp::Set {
            collection,
            id,
            fields,
        } => write_fields(conn, &collection, &id, &fields).await,
        WriteOp::Update {
            collection,
            id,
            patch,
        } => {
            let mut fields = load_existing(conn, &collection, &id).await?;
            patch.apply_to(&mut fields);
            write_fields(conn, &collection, &id, &fields).await
        }
        WriteOp::Increment {
            collection,
            id,
            field,
            delta,
            max,
        } => {
            let mut fields = load_existing(conn, &collection, &id).await?;
            let current = match fields.get(&field) {
                None | Some(Value::Null) => 0,
                Some(value) => value.as_i64().ok_or_else(|| StoreError::NotNumeric {
                    collection: collection.clone(),
                    id: id.clone(),
                    field: field.clone(),
                })?,
            };
            let mut next = current.saturating_add(delta);
            if let Some(max) = max {
                next = next.min(max);
            }
            fields.insert(field, Value::from(next));
            write_fields(conn, &collection, &id, &fields).await
        }
        WriteOp::ArrayUnion {
            collection,
            id,
            field,
            values,
        } => {
            let mut fields = load_existing(conn, &collection, &id).await?;
            let mut items = match fields.remove(&field) {
                None | Some(Value::Null) => Vec::new(),
                Some(Value::Array(items)) => items,
                Some(_) => {
                    return Err(StoreError::NotAnArray {
                        collection,
                        id,
                        field,
                    });
                }
            };
            for value in values {
                if !items.contains(&value) {
                    items.push(value);
                }
            }
            fields.insert(field, Value::Array(items));
            write_fields(conn, &collection, &id, &fields).await
        }
        WriteOp::Expect {
            collection,
            id,
            field,
            equals,
        } => {
            let fields = load_existing(conn, &collection, &id).await?;
            if fields.get(&field) == Some(&equals) {
                Ok(())
            } else {
                Err(StoreError::PreconditionFailed {
                    collection,
                    id,
                    field,
                })
            }
        }
        WriteOp::Delete { collection, id } => {
            sqlx::query("DELETE FROM documents WHERE collection = ? AND id = ?")
                .bind(&collection)
                .bind(&id)
                .execute(&mut *conn)
                .await?;
            Ok(())
        }
    }
}

async fn load(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<Option<Fields>> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT data FROM documents WHERE collection = ? AND id = ?")
            .bind(collection)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

    match row {
        Some((data,)) => Ok(Some(serde_json::from_str(&data)?)),
        None => Ok(None),
    }
}

async fn load_existing(conn: &mut SqliteConnection, collection: &str, id: &str) -> Result<Fields> {
    load(conn, collection, id)
        .await?
        .ok_or_else(|| StoreError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })
}

async fn write_fields(
    conn: &mut SqliteConnection,
    collection: &str,
    id: &str,
    fields: &Fields,
) -> Result<()> {
    let data = serde_json::to_string(fields)?;
    sqlx::query(
        r#"
        INSERT INTO documents (collection, id, data, seq)
        VALUES (?, ?, ?, (SELECT COALESCE(MAX(seq), 0) + 1 FROM documents))
        ON CONFLICT (collection, id) DO UPDATE SET data = excluded.data
        "#,
    )
    .bind(collection)
    .bind(id)
    .bind(data)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[async_trait]
impl DocumentStore for SqliteStore {
    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn watch(&self, collection: &str) -> watch::Receiver<u64> {
        let mut versions = self.versions.lock().unwrap_or_else(PoisonError::into_inner);
        versions
            .entry(collection.to_string())
            .or_insert_with(|| watch::channel(0).0)
            .subscribe()
    }

    async fn add(&self, collection: &str, fields: Fields) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.apply(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.clone(),
            fields,
        }])
        .await?;
        tracing::debug!(collection, id = %id, "Document added");
        Ok(id)
    }

    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()> {
        self.apply(vec![WriteOp::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            fields,
        }])
        .await
    }

    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()> {
        self.apply(vec![WriteOp::update(collection, id, patch)]).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<()> {
        self.apply(vec![WriteOp::delete(collection, id)]).await
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        let mut conn = self.pool.acquire().await?;
        let fields = load(&mut *conn, collection, id).await?;
        Ok(fields.map(|fields| Document {
            id: id.to_string(),
            fields,
        }))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT id, data FROM documents WHERE collection = ? ORDER BY seq")
                .bind(&query.collection)
                .fetch_all(&self.pool)
                .await?;

        let mut docs = Vec::with_capacity(rows.len());
        for (id, data) in rows {
            match serde_json::from_str::<Fields>(&data) {
                Ok(fields) => docs.push(Document { id, fields }),
                Err(e) => {
                    tracing::warn!(collection = %query.collection, id = %id, "Corrupt document body: {}", e)
                }
            }
        }

        Ok(query.apply(docs))
    }

    async fn commit(&self, batch: Vec<WriteOp>) -> Result<()> {
        if batch.len() > self.max_batch_size {
            return Err(StoreError::BatchTooLarge {
                size: batch.len(),
                limit: self.max_batch_size,
            });
        }
        let size = batch.len();
        self.apply(batch).await?;
        tracing::debug!(size, "Batch committed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    async fn store_with_limit(limit: usize) -> SqliteStore {
        let pool = db::init_pool("sqlite::memory:").await.unwrap();
        db::run_migrations(&pool).await.unwrap();
        SqliteStore::with_batch_limit(pool, limit)
    }

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    async fn add_member(store: &SqliteStore, member: &str) -> Result<()> {
        store
            .commit(vec![WriteOp::ArrayUnion {
                collection: "teams".into(),
                id: "t1".into(),
                field: "members".into(),
                values: vec![json!(member)],
            }])
            .await
    }

    #[tokio::test]
    async fn add_then_get() {
        let store = store_with_limit(10).await;
        let id = store
            .add("channels", fields(json!({ "name": "#general" })))
            .await
            .unwrap();

        let doc = store.get("channels", &id).await.unwrap().unwrap();
        assert_eq!(doc.fields.get("name"), Some(&json!("#general")));
        assert!(store.get("channels", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_keeps_fields_outside_the_patch() {
        let store = store_with_limit(10).await;
        store
            .set("tasks", "t1", fields(json!({ "title": "Old", "description": "Keep me" })))
            .await
            .unwrap();

        let patch = Patch::new().set("title", "New").set("description", Value::Null);
        store.update("tasks", "t1", patch).await.unwrap();

        let doc = store.get("tasks", "t1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("title"), Some(&json!("New")));
        assert_eq!(doc.fields.get("description"), Some(&json!("Keep me")));
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = store_with_limit(10).await;
        let err = store
            .update("tasks", "nope", Patch::new().set("title", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn failed_batch_writes_nothing() {
        let store = store_with_limit(10).await;
        store
            .set("users", "u1", fields(json!({ "points": 10 })))
            .await
            .unwrap();

        let result = store
            .commit(vec![
                WriteOp::increment("users", "u1", "points", 5),
                WriteOp::update("users", "ghost", Patch::new().set("points", 1)),
            ])
            .await;
        assert!(result.is_err());

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("points"), Some(&json!(10)));
    }

    #[tokio::test]
    async fn oversized_batch_is_rejected() {
        let store = store_with_limit(2).await;
        let ops = (0..3).map(|i| WriteOp::delete("posts", format!("p{i}"))).collect();
        let err = store.commit(ops).await.unwrap_err();
        assert!(matches!(err, StoreError::BatchTooLarge { size: 3, limit: 2 }));
    }

    #[tokio::test]
    async fn increment_treats_missing_as_zero() {
        let store = store_with_limit(10).await;
        store.set("users", "u1", fields(json!({}))).await.unwrap();
        store
            .commit(vec![WriteOp::increment("users", "u1", "points", 7)])
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("points"), Some(&json!(7)));
    }

    #[tokio::test]
    async fn increment_respects_the_ceiling() {
        let store = store_with_limit(10).await;
        store
            .set("users", "u1", fields(json!({ "points": 4_294_967_290u64 })))
            .await
            .unwrap();
        store
            .commit(vec![WriteOp::Increment {
                collection: "users".into(),
                id: "u1".into(),
                field: "points".into(),
                delta: 100,
                max: Some(i64::from(u32::MAX)),
            }])
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("points"), Some(&json!(u32::MAX)));
    }

    #[tokio::test]
    async fn array_union_adds_only_missing_values() {
        let store = store_with_limit(10).await;
        store
            .set("teams", "t1", fields(json!({ "members": ["o1"] })))
            .await
            .unwrap();

        let union = |values: Vec<Value>| WriteOp::ArrayUnion {
            collection: "teams".into(),
            id: "t1".into(),
            field: "members".into(),
            values,
        };
        store.commit(vec![union(vec![json!("m1"), json!("o1")])]).await.unwrap();
        store.commit(vec![union(vec![json!("m1")])]).await.unwrap();

        let doc = store.get("teams", "t1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("members"), Some(&json!(["o1", "m1"])));
    }

    #[tokio::test]
    async fn concurrent_unions_both_land() {
        let store = store_with_limit(10).await;
        store
            .set("teams", "t1", fields(json!({ "members": ["o1"] })))
            .await
            .unwrap();

        let (a, b) = tokio::join!(add_member(&store, "m1"), add_member(&store, "m2"));
        a.unwrap();
        b.unwrap();

        let doc = store.get("teams", "t1").await.unwrap().unwrap();
        let members = doc.fields.get("members").and_then(Value::as_array).unwrap();
        assert_eq!(members.len(), 3);
        assert!(members.contains(&json!("m1")));
        assert!(members.contains(&json!("m2")));
    }

    #[tokio::test]
    async fn failed_expectation_aborts_the_batch() {
        let store = store_with_limit(10).await;
        store
            .set("tasks", "t1", fields(json!({ "status": "completed" })))
            .await
            .unwrap();
        store
            .set("users", "u1", fields(json!({ "points": 10 })))
            .await
            .unwrap();

        let err = store
            .commit(vec![
                WriteOp::expect("tasks", "t1", "status", "pending"),
                WriteOp::increment("users", "u1", "points", 50),
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::PreconditionFailed { .. }));

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields.get("points"), Some(&json!(10)));
    }

    #[tokio::test]
    async fn writes_bump_the_collection_watch() {
        let store = store_with_limit(10).await;
        let mut rx = store.watch("posts");
        let before = *rx.borrow_and_update();

        store.add("posts", fields(json!({ "text": "hi" }))).await.unwrap();

        rx.changed().await.unwrap();
        assert!(*rx.borrow() > before);
    }
}
