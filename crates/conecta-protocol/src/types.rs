use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Calendar dates (task deadlines, reminders) are exchanged as `DD/MM/YYYY`.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

/// Maximum length of a social feed post, in characters.
pub const MAX_POST_LENGTH: usize = 280;

/// Account role. Closed set: documents carrying anything else fail to decode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    #[default]
    Member,
}

impl Role {
    pub fn toggled(self) -> Role {
        match self {
            Role::Owner => Role::Member,
            Role::Member => Role::Owner,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Owner => "owner",
            Role::Member => "member",
        }
    }
}

/// A workspace account, mirrored from the identity provider into the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    pub role: Role,
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followers: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub following: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram_url: Option<String>,
}

impl User {
    /// A fresh Member profile with no points.
    pub fn member(id: impl Into<String>, name: impl Into<String>, email: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email,
            role: Role::Member,
            points: 0,
            bio: None,
            avatar_url: None,
            cover_url: None,
            job_title: None,
            location: None,
            followers: None,
            following: None,
            linkedin_url: None,
            instagram_url: None,
        }
    }

    pub fn is_owner(&self) -> bool {
        self.role == Role::Owner
    }

    /// The `@name` token used in task responsible lists.
    pub fn mention(&self) -> String {
        format!("@{}", self.name)
    }
}

/// Profile edit. Unset fields are left untouched in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cover_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instagram_url: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Completed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Completed => "completed",
        }
    }
}

/// Assignable unit of work. `id` is generated client-side and doubles as
/// the store document id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: Uuid,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub channel: String,
    #[serde(default)]
    pub responsible: Vec<String>,
    #[serde(default)]
    pub points: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
    pub status: TaskStatus,
}

impl Task {
    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    pub fn is_assigned_to(&self, user: &User) -> bool {
        let mention = user.mention();
        self.responsible.iter().any(|r| *r == mention)
    }
}

/// Task fields as supplied by a caller: the create form, an edit, or the
/// assistant's payload. Status is deliberately absent; it only changes
/// through completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responsible: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<String>,
}

impl TaskFields {
    /// Materialize a new pending task, filling defaults for missing fields.
    pub fn into_task(self, id: Uuid) -> Task {
        Task {
            id,
            title: self.title.unwrap_or_else(|| "New task".to_string()),
            description: self.description.unwrap_or_default(),
            channel: self.channel.unwrap_or_else(|| "#general".to_string()),
            responsible: self.responsible.unwrap_or_default(),
            points: self.points.unwrap_or(0),
            deadline: self.deadline,
            status: TaskStatus::Pending,
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &TaskFields::default()
    }
}

/// Named conversation scope. No team means a global channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
}

impl Channel {
    pub fn is_global(&self) -> bool {
        self.team_id.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateChannel {
    pub name: String,
    #[serde(default)]
    pub team_id: Option<String>,
}

/// Membership group owning a set of channels
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub owner_id: String,
    #[serde(default)]
    pub members: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
}

impl Team {
    pub fn has_member(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.members.iter().any(|m| m == user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTeam {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub theme_color: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentKind {
    Image,
    Video,
    File,
    Audio,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: AttachmentKind,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Message posted in a channel
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChannelMessage {
    #[serde(default)]
    pub id: String,
    pub channel_id: String,
    pub user_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Direct message between two users. A conversation is every message whose
/// sender/receiver pair matches, in either direction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    #[serde(default)]
    pub id: String,
    pub sender_id: String,
    pub receiver_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl DirectMessage {
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateMessage {
    pub text: String,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Meeting,
    Holiday,
    Event,
}

/// Calendar entry independent of tasks
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReminder {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    pub created_by: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReminder {
    pub title: String,
    pub date: String,
    #[serde(rename = "type")]
    pub kind: ReminderKind,
    #[serde(default)]
    pub time: Option<String>,
}

/// Social feed entry
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    #[serde(default)]
    pub id: String,
    pub author_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePost {
    pub text: String,
}

/// Panes of the social hub
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SocialView {
    #[default]
    Feed,
    Messages,
    Profile,
}

/// Per-member task statistics for the admin dashboard
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MemberStats {
    pub user_id: String,
    pub name: String,
    pub points: u32,
    pub assigned: usize,
    pub pending: usize,
    pub completed: usize,
    /// Percentage of assigned tasks completed, rounded down.
    pub completion_rate: u32,
}

/// Everything due on one calendar day
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DayAgenda {
    pub tasks: Vec<Task>,
    pub reminders: Vec<GlobalReminder>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be a DD/MM/YYYY date, got {value:?}")]
    InvalidDate { field: &'static str, value: String },

    #[error("{0} must not be empty")]
    Empty(&'static str),

    #[error("post is {len} characters long, the limit is {max}")]
    PostTooLong { len: usize, max: usize },
}

/// Parse a `DD/MM/YYYY` date.
pub fn parse_day(field: &'static str, value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })
}

/// Ensure a channel name carries its leading `#`.
pub fn normalize_channel_name(name: &str) -> String {
    let trimmed = name.trim().trim_start_matches('#');
    format!("#{trimmed}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_role_is_rejected() {
        let result = serde_json::from_value::<User>(json!({
            "id": "u9", "name": "Zed", "role": "superuser", "points": 3
        }));
        assert!(result.is_err());
    }

    #[test]
    fn user_defaults_missing_points() {
        let user: User = serde_json::from_value(json!({
            "id": "u1", "name": "Ana", "role": "owner"
        }))
        .unwrap();
        assert_eq!(user.points, 0);
        assert!(user.is_owner());
        assert_eq!(user.mention(), "@Ana");
    }

    #[test]
    fn task_fields_fill_defaults() {
        let id = Uuid::new_v4();
        let task = TaskFields {
            title: Some("Ship v1".into()),
            points: Some(50),
            ..Default::default()
        }
        .into_task(id);

        assert_eq!(task.id, id);
        assert_eq!(task.channel, "#general");
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.responsible.is_empty());
    }

    #[test]
    fn unset_task_fields_are_not_serialized() {
        let fields = TaskFields {
            title: Some("Only title".into()),
            ..Default::default()
        };
        let value = serde_json::to_value(&fields).unwrap();
        assert_eq!(value, json!({ "title": "Only title" }));
    }

    #[test]
    fn direct_message_pair_is_symmetric() {
        let dm = DirectMessage {
            id: "m1".into(),
            sender_id: "u2".into(),
            receiver_id: "u3".into(),
            text: "hi".into(),
            timestamp: Utc::now(),
            attachments: vec![],
        };
        assert!(dm.is_between("u2", "u3"));
        assert!(dm.is_between("u3", "u2"));
        assert!(!dm.is_between("u2", "u4"));
    }

    #[test]
    fn parses_day_month_year() {
        let day = parse_day("deadline", "31/12/2024").unwrap();
        assert_eq!(day, NaiveDate::from_ymd_opt(2024, 12, 31).unwrap());
        assert!(parse_day("deadline", "2024-12-31").is_err());
    }

    #[test]
    fn channel_names_get_a_hash() {
        assert_eq!(normalize_channel_name("general"), "#general");
        assert_eq!(normalize_channel_name("#general"), "#general");
        assert_eq!(normalize_channel_name("  ##ops "), "#ops");
    }

    #[test]
    fn attachment_kind_uses_type_key() {
        let a: Attachment = serde_json::from_value(json!({
            "type": "audio", "url": "blob:1"
        }))
        .unwrap();
        assert_eq!(a.kind, AttachmentKind::Audio);
        assert_eq!(a.name, None);
    }
}
