//! Document store boundary.
//!
//! Collections of schemaless JSON documents with live full-snapshot
//! subscriptions. Services talk to the [`DocumentStore`] trait; the SQLite
//! backend in [`sqlite`] is the implementation the server runs on.

mod entity;
pub mod sqlite;
mod subscription;

pub use entity::{Entity, decode_snapshot, fetch, fetch_one};
pub use sqlite::SqliteStore;
pub use subscription::Subscription;

use async_trait::async_trait;
use chrono::DateTime;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use thiserror::Error;
use tokio::sync::watch;

/// Field map of a stored document (the id is kept out of band).
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub fields: Fields,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Document not found: {collection}/{id}")]
    NotFound { collection: String, id: String },

    #[error("Batch of {size} writes exceeds the store limit of {limit}")]
    BatchTooLarge { size: usize, limit: usize },

    #[error("Expected a JSON object, got {0}")]
    NotAnObject(String),

    #[error("Precondition on {field} of {collection}/{id} no longer holds")]
    PreconditionFailed {
        collection: String,
        id: String,
        field: String,
    },

    #[error("Field {field} of {collection}/{id} is not an array")]
    NotAnArray {
        collection: String,
        id: String,
        field: String,
    },

    #[error("Field {field} of {collection}/{id} is not numeric")]
    NotNumeric {
        collection: String,
        id: String,
        field: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Partial update. Unset (null) values never make it into a patch, so
/// merging one can only overwrite fields the caller actually supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch(Fields);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a patch from any serializable partial struct, dropping every
    /// field that serialized to null.
    pub fn from_partial<T: Serialize>(partial: &T) -> Result<Self> {
        match serde_json::to_value(partial)? {
            Value::Object(map) => Ok(Self(
                map.into_iter().filter(|(_, v)| !v.is_null()).collect(),
            )),
            other => Err(StoreError::NotAnObject(other.to_string())),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.0.insert(field.into(), value);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    pub fn apply_to(&self, target: &mut Fields) {
        for (key, value) in &self.0 {
            target.insert(key.clone(), value.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    In(String, Vec<Value>),
}

impl Filter {
    fn matches(&self, fields: &Fields) -> bool {
        match self {
            Filter::Eq(field, value) => fields.get(field) == Some(value),
            Filter::In(field, values) => fields
                .get(field)
                .map(|v| values.contains(v))
                .unwrap_or(false),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

/// One-shot or live query over a collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order: Option<OrderBy>,
}

impl Query {
    pub fn collection(name: impl Into<String>) -> Self {
        Self {
            collection: name.into(),
            filters: Vec::new(),
            order: None,
        }
    }

    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(field.into(), value.into()));
        self
    }

    pub fn where_in<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.filters.push(Filter::In(field.into(), values));
        self
    }

    pub fn order_by(mut self, field: impl Into<String>) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            descending: false,
        });
        self
    }

    pub fn order_by_desc(mut self, field: impl Into<String>) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            descending: true,
        });
        self
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(&doc.fields))
    }

    /// Filter and order documents given in insertion order. Ties keep
    /// insertion order.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        docs.retain(|d| self.matches(d));
        if let Some(order) = &self.order {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.fields.get(&order.field), b.fields.get(&order.field));
                if order.descending { ord.reverse() } else { ord }
            });
        }
        docs
    }
}

// Timestamps are RFC 3339 strings whose fractional part varies in length,
// so they are compared as instants rather than text.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => {
            match (DateTime::parse_from_rfc3339(x), DateTime::parse_from_rfc3339(y)) {
                (Ok(x), Ok(y)) => x.cmp(&y),
                _ => x.cmp(y),
            }
        }
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

/// A single write inside an atomic batch
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Create or replace a whole document.
    Set {
        collection: String,
        id: String,
        fields: Fields,
    },
    /// Merge a patch into an existing document.
    Update {
        collection: String,
        id: String,
        patch: Patch,
    },
    /// Add `delta` to a numeric field (missing counts as zero), clamping the
    /// result to `max` when one is given.
    Increment {
        collection: String,
        id: String,
        field: String,
        delta: i64,
        max: Option<i64>,
    },
    /// Append each value missing from an array field (missing counts as
    /// empty). Existing entries keep their order.
    ArrayUnion {
        collection: String,
        id: String,
        field: String,
        values: Vec<Value>,
    },
    /// Abort the whole batch unless `field` currently equals `equals`.
    /// Writes nothing itself.
    Expect {
        collection: String,
        id: String,
        field: String,
        equals: Value,
    },
    Delete {
        collection: String,
        id: String,
    },
}

impl WriteOp {
    pub fn delete(collection: impl Into<String>, id: impl Into<String>) -> Self {
        WriteOp::Delete {
            collection: collection.into(),
            id: id.into(),
        }
    }

    pub fn update(collection: impl Into<String>, id: impl Into<String>, patch: Patch) -> Self {
        WriteOp::Update {
            collection: collection.into(),
            id: id.into(),
            patch,
        }
    }

    pub fn increment(
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        delta: i64,
    ) -> Self {
        WriteOp::Increment {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            delta,
            max: None,
        }
    }

    pub fn expect(
        collection: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        equals: impl Into<Value>,
    ) -> Self {
        WriteOp::Expect {
            collection: collection.into(),
            id: id.into(),
            field: field.into(),
            equals: equals.into(),
        }
    }

    pub fn collection(&self) -> &str {
        match self {
            WriteOp::Set { collection, .. }
            | WriteOp::Update { collection, .. }
            | WriteOp::Increment { collection, .. }
            | WriteOp::ArrayUnion { collection, .. }
            | WriteOp::Expect { collection, .. }
            | WriteOp::Delete { collection, .. } => collection,
        }
    }

    /// Whether the op changes data. Guards alone do not wake watchers.
    pub fn is_write(&self) -> bool {
        !matches!(self, WriteOp::Expect { .. })
    }
}

/// Real-time document store.
///
/// Every collection exposes a change counter through [`DocumentStore::watch`];
/// [`Subscription`] turns it into a stream of full snapshots.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Largest number of writes accepted by a single [`DocumentStore::commit`].
    fn max_batch_size(&self) -> usize;

    /// Change notifications for a collection. The value is bumped after
    /// every successful write touching it.
    fn watch(&self, collection: &str) -> watch::Receiver<u64>;

    /// Insert a document under a store-assigned id.
    async fn add(&self, collection: &str, fields: Fields) -> Result<String>;

    /// Create or replace a document under a caller-chosen id.
    async fn set(&self, collection: &str, id: &str, fields: Fields) -> Result<()>;

    /// Merge a patch into an existing document.
    async fn update(&self, collection: &str, id: &str, patch: Patch) -> Result<()>;

    /// Remove a document. Deleting a missing document is not an error.
    async fn delete(&self, collection: &str, id: &str) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Apply all writes atomically, or none of them.
    async fn commit(&self, batch: Vec<WriteOp>) -> Result<()>;
}
