use conecta_protocol::{
    Channel, ChannelMessage, DirectMessage, GlobalReminder, Post, Task, Team, User,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::{Document, DocumentStore, Fields, Query, Result, StoreError};

/// A domain type stored as one document per value in a named collection.
///
/// The document id lives outside the field map; it is injected as `id` on
/// the way in and stripped on the way out.
pub trait Entity: Serialize + DeserializeOwned + Send + 'static {
    const COLLECTION: &'static str;

    fn document_id(&self) -> String;

    fn from_document(doc: Document) -> Result<Self> {
        let mut fields = doc.fields;
        fields.insert("id".to_string(), Value::String(doc.id));
        Ok(serde_json::from_value(Value::Object(fields))?)
    }

    fn to_fields(&self) -> Result<Fields> {
        match serde_json::to_value(self)? {
            Value::Object(mut map) => {
                map.remove("id");
                map.retain(|_, v| !v.is_null());
                Ok(map)
            }
            other => Err(StoreError::NotAnObject(other.to_string())),
        }
    }
}

/// Map a snapshot to entities, skipping documents that do not decode
/// (stale shapes, unknown roles or statuses).
pub fn decode_snapshot<T: Entity>(docs: Vec<Document>) -> Vec<T> {
    docs.into_iter()
        .filter_map(|doc| {
            let id = doc.id.clone();
            match T::from_document(doc) {
                Ok(entity) => Some(entity),
                Err(e) => {
                    tracing::warn!(
                        collection = T::COLLECTION,
                        id = %id,
                        "Skipping undecodable document: {}",
                        e
                    );
                    None
                }
            }
        })
        .collect()
}

pub async fn fetch<T: Entity>(store: &dyn DocumentStore, query: &Query) -> Result<Vec<T>> {
    let docs = store.query(query).await?;
    Ok(decode_snapshot(docs))
}

pub async fn fetch_one<T: Entity>(store: &dyn DocumentStore, id: &str) -> Result<Option<T>> {
    match store.get(T::COLLECTION, id).await? {
        Some(doc) => Ok(Some(T::from_document(doc)?)),
        None => Ok(None),
    }
}

impl Entity for User {
    const COLLECTION: &'static str = "users";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Task {
    const COLLECTION: &'static str = "tasks";

    fn document_id(&self) -> String {
        self.id.to_string()
    }
}

impl Entity for Channel {
    const COLLECTION: &'static str = "channels";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Team {
    const COLLECTION: &'static str = "teams";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for ChannelMessage {
    const COLLECTION: &'static str = "channel_messages";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for DirectMessage {
    const COLLECTION: &'static str = "direct_messages";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for GlobalReminder {
    const COLLECTION: &'static str = "reminders";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

impl Entity for Post {
    const COLLECTION: &'static str = "posts";

    fn document_id(&self) -> String {
        self.id.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conecta_protocol::{Role, TaskStatus};
    use serde_json::json;
    use uuid::Uuid;

    fn document(id: &str, fields: Value) -> Document {
        Document {
            id: id.to_string(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn task_round_trips_through_document() {
        let task = Task {
            id: Uuid::new_v4(),
            title: "Ship v1".into(),
            description: String::new(),
            channel: "#general".into(),
            responsible: vec!["@Alice".into()],
            points: 50,
            deadline: Some("31/12/2024".into()),
            status: TaskStatus::Pending,
        };

        let fields = task.to_fields().unwrap();
        assert!(!fields.contains_key("id"));

        let back = Task::from_document(Document {
            id: task.document_id(),
            fields,
        })
        .unwrap();
        assert_eq!(back, task);
    }

    #[test]
    fn unset_optionals_are_not_stored() {
        let user = User::member("u1", "Ana", None);
        let fields = user.to_fields().unwrap();
        assert!(!fields.contains_key("email"));
        assert!(!fields.contains_key("bio"));
        assert_eq!(fields.get("role"), Some(&json!("member")));
    }

    #[test]
    fn snapshot_skips_foreign_values() {
        let docs = vec![
            document("u1", json!({ "name": "Ana", "role": "owner", "points": 0 })),
            document("u2", json!({ "name": "Ghost", "role": "Patrão" })),
            document("u3", json!({ "name": "Carlos", "role": "member", "points": 80 })),
        ];

        let users: Vec<User> = decode_snapshot(docs);
        let names: Vec<_> = users.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, ["Ana", "Carlos"]);
        assert_eq!(users[0].role, Role::Owner);
    }

    #[test]
    fn task_with_non_uuid_id_is_skipped() {
        let docs = vec![document(
            "1700000000000",
            json!({ "title": "Legacy", "channel": "#general", "status": "pending" }),
        )];
        let tasks: Vec<Task> = decode_snapshot(docs);
        assert!(tasks.is_empty());
    }
}
