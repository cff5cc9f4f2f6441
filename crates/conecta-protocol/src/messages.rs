use serde::{Deserialize, Deserializer, Serialize, de};
use serde_json::Value;

use crate::types::TaskFields;

/// Who wrote a line in the assistant chat
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatSender {
    User,
    Assistant,
}

/// One line of the assistant transcript
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub sender: ChatSender,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            sender: ChatSender::Assistant,
            text: text.into(),
        }
    }
}

/// Actions the assistant may request. Only the first four mutate state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssistantAction {
    CreateTask,
    EditTask,
    DeleteTask,
    CompleteTask,
    ShowRanking,
    ShowMyTasks,
    ShowMyPerformance,
    GenerateReport,
    NoAction,
}

impl AssistantAction {
    pub const ALL: [AssistantAction; 9] = [
        AssistantAction::CreateTask,
        AssistantAction::EditTask,
        AssistantAction::DeleteTask,
        AssistantAction::CompleteTask,
        AssistantAction::ShowRanking,
        AssistantAction::ShowMyTasks,
        AssistantAction::ShowMyPerformance,
        AssistantAction::GenerateReport,
        AssistantAction::NoAction,
    ];

    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            AssistantAction::CreateTask
                | AssistantAction::EditTask
                | AssistantAction::DeleteTask
                | AssistantAction::CompleteTask
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AssistantAction::CreateTask => "CREATE_TASK",
            AssistantAction::EditTask => "EDIT_TASK",
            AssistantAction::DeleteTask => "DELETE_TASK",
            AssistantAction::CompleteTask => "COMPLETE_TASK",
            AssistantAction::ShowRanking => "SHOW_RANKING",
            AssistantAction::ShowMyTasks => "SHOW_MY_TASKS",
            AssistantAction::ShowMyPerformance => "SHOW_MY_PERFORMANCE",
            AssistantAction::GenerateReport => "GENERATE_REPORT",
            AssistantAction::NoAction => "NO_ACTION",
        }
    }
}

/// Data accompanying an assistant action
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CommandPayload {
    #[serde(
        default,
        deserialize_with = "task_reference",
        skip_serializing_if = "Option::is_none"
    )]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub member: Option<String>,
}

/// Structured output of the completion endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AssistantCommand {
    pub action: AssistantAction,
    #[serde(default, deserialize_with = "payload_or_default")]
    pub payload: CommandPayload,
    pub assistant_response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
}

/// Result of one assistant exchange, as shown in the chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantTurn {
    pub reply: ChatTurn,
    pub action: AssistantAction,
    /// Whether a mutating action was carried out.
    pub applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// Models occasionally emit numeric ids even though task ids are strings.
fn task_reference<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "invalid task reference: {other}"
        ))),
    }
}

fn payload_or_default<'de, D>(deserializer: D) -> Result<CommandPayload, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<CommandPayload>::deserialize(deserializer)?.unwrap_or_default())
}
