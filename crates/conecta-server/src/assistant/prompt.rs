use conecta_protocol::{AssistantAction, ChatSender, ChatTurn, Task, User};
use serde_json::{Value, json};

/// Number of most recent transcript lines sent with each command.
pub const HISTORY_WINDOW: usize = 10;

pub const TEMPERATURE: f32 = 0.2;

pub const SYSTEM_INSTRUCTION: &str = r#"You are the official assistant of Conecta, a collaborative workspace for teams.
You manage a task and gamification system and talk to users in a friendly way.

Context and permissions:
- You know who is talking to you (the current user).
- Only an owner can create, edit and delete tasks. If a member asks for this, politely decline.
- Owners do not complete tasks and earn no points.
- Members can mark tasks as completed. Completing a task adds its points to the responsible members.

Behaviour:
1. Use the conversation history to resolve references such as "change its deadline".
2. Be professional, efficient and encouraging.
3. Answer in a chat style with clear formatting.

Commands (examples):
- Create task: "Create task in [channel]: [title], [description], responsible: [member], points: [value], deadline: [DD/MM/YYYY]"
- Edit task: "Edit task [ID] to: (...)"
- Delete task: "Delete task [ID]"
- Complete task: "Complete task [ID]"
- Queries: "Show ranking", "My tasks", "What is Luana working on?"

Required output: a JSON object with
1. 'action': the system action.
2. 'payload': the data for the action. Task ids are the UUID strings from the task list; responsible members are written as "@Name".
3. 'assistantResponse': your reply to the user."#;

/// Output schema for the completion endpoint.
pub fn response_schema() -> Value {
    let actions: Vec<&str> = AssistantAction::ALL.iter().map(|a| a.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "action": {
                "type": "STRING",
                "enum": actions,
                "description": "The action to perform."
            },
            "payload": {
                "type": "OBJECT",
                "description": "Data required by the action.",
                "properties": {
                    "taskId": { "type": "STRING", "description": "Task id." },
                    "member": { "type": "STRING", "description": "Name of the related member." },
                    "task": {
                        "type": "OBJECT",
                        "description": "Task details.",
                        "properties": {
                            "title": { "type": "STRING" },
                            "description": { "type": "STRING" },
                            "channel": { "type": "STRING" },
                            "responsible": { "type": "ARRAY", "items": { "type": "STRING" } },
                            "points": { "type": "NUMBER" },
                            "deadline": { "type": "STRING" }
                        }
                    }
                }
            },
            "assistantResponse": {
                "type": "STRING",
                "description": "The text reply for the user."
            }
        },
        "required": ["action", "assistantResponse"]
    })
}

/// Render the recent transcript, oldest first, as `Speaker: text` lines.
pub fn render_history(history: &[ChatTurn], current: &User) -> String {
    let start = history.len().saturating_sub(HISTORY_WINDOW);
    history[start..]
        .iter()
        .map(|turn| match turn.sender {
            ChatSender::User => format!("User ({}): {}", current.name, turn.text),
            ChatSender::Assistant => format!("Assistant: {}", turn.text),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_prompt(
    message: &str,
    history: &[ChatTurn],
    users: &[User],
    tasks: &[Task],
    current: &User,
) -> serde_json::Result<String> {
    Ok(format!(
        "CURRENT SYSTEM STATE:\nMembers: {users}\nTasks: {tasks}\n\nCURRENT USER: {current}\n\nCONVERSATION HISTORY:\n{history}\n\nCURRENT USER MESSAGE: \"{message}\"\n\nBased on the state, the history and the current message, decide the action and write the reply.",
        users = serde_json::to_string(users)?,
        tasks = serde_json::to_string(tasks)?,
        current = serde_json::to_string(current)?,
        history = render_history(history, current),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_keeps_the_last_ten_turns() {
        let me = User::member("u2", "Carlos", None);
        let history: Vec<ChatTurn> = (0..14)
            .map(|i| {
                if i % 2 == 0 {
                    ChatTurn::user(format!("msg {i}"))
                } else {
                    ChatTurn::assistant(format!("msg {i}"))
                }
            })
            .collect();

        let rendered = render_history(&history, &me);
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines.len(), HISTORY_WINDOW);
        assert_eq!(lines[0], "User (Carlos): msg 4");
        assert_eq!(lines[9], "Assistant: msg 13");
    }

    #[test]
    fn schema_lists_every_action() {
        let schema = response_schema();
        let actions = schema["properties"]["action"]["enum"].as_array().unwrap();
        assert_eq!(actions.len(), AssistantAction::ALL.len());
        assert!(actions.iter().any(|a| a == "COMPLETE_TASK"));
    }

    #[test]
    fn prompt_carries_state_and_message() {
        let me = User::member("u2", "Carlos", None);
        let prompt = build_prompt("My tasks", &[], &[me.clone()], &[], &me).unwrap();
        assert!(prompt.contains("\"name\":\"Carlos\""));
        assert!(prompt.ends_with("decide the action and write the reply."));
        assert!(prompt.contains("CURRENT USER MESSAGE: \"My tasks\""));
    }
}
