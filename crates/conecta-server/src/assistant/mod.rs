//! Natural-language task assistant.
//!
//! The completion endpoint decides what the user asked for; the resulting
//! command is then carried out through [`TaskService`], which applies the
//! usual role checks. The assistant itself authorizes nothing.

mod client;
mod parse;
mod prompt;

pub use client::{
    CompletionClient, CompletionError, CompletionRequest, GeminiClient, ScriptedCompletion,
};
pub use parse::parse_command;
pub use prompt::{HISTORY_WINDOW, SYSTEM_INSTRUCTION, build_prompt, response_schema};

use crate::error::{AppError, Result};
use crate::services::{task::TaskService, user::UserService};
use conecta_protocol::{
    AssistantAction, AssistantCommand, AssistantRequest, AssistantTurn, ChatTurn, User,
};
use std::sync::Arc;

pub const DEMO_MODE_REPLY: &str = "⚠️ Demo mode: no API key is configured. I cannot process real commands, but the rest of the workspace works!";

pub const FAILURE_REPLY: &str =
    "Sorry, I could not reach the assistant right now. Check your connection or the API key and try again.";

#[derive(Clone)]
pub struct AssistantService {
    client: Option<Arc<dyn CompletionClient>>,
    users: UserService,
    tasks: TaskService,
}

impl AssistantService {
    pub fn new(
        client: Option<Arc<dyn CompletionClient>>,
        users: UserService,
        tasks: TaskService,
    ) -> Self {
        Self {
            client,
            users,
            tasks,
        }
    }

    pub fn is_demo_mode(&self) -> bool {
        self.client.is_none()
    }

    /// Ask the completion endpoint what to do. Without a configured client
    /// this returns the fixed demo-mode answer.
    pub async fn interpret(
        &self,
        current: &User,
        request: &AssistantRequest,
    ) -> Result<std::result::Result<AssistantCommand, CompletionError>> {
        let Some(client) = &self.client else {
            return Ok(Ok(AssistantCommand {
                action: AssistantAction::NoAction,
                payload: Default::default(),
                assistant_response: DEMO_MODE_REPLY.to_string(),
            }));
        };

        let users = self.users.list().await?;
        let tasks = self.tasks.list().await?;
        let prompt = build_prompt(&request.message, &request.history, &users, &tasks, current)
            .map_err(anyhow::Error::from)?;

        let completion = CompletionRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            prompt,
            schema: response_schema(),
            temperature: prompt::TEMPERATURE,
        };

        Ok(match client.complete(&completion).await {
            Ok(raw) => parse_command(&raw),
            Err(e) => Err(e),
        })
    }

    /// One chat exchange: interpret, then dispatch. Completion failures and
    /// refused mutations come back as assistant messages.
    pub async fn handle(&self, current: &User, request: AssistantRequest) -> Result<AssistantTurn> {
        let command = match self.interpret(current, &request).await? {
            Ok(command) => command,
            Err(e) => {
                tracing::warn!(user_id = %current.id, "Assistant completion failed: {}", e);
                return Ok(AssistantTurn {
                    reply: ChatTurn::assistant(FAILURE_REPLY),
                    action: AssistantAction::NoAction,
                    applied: false,
                    error: Some(e.to_string()),
                });
            }
        };

        tracing::debug!(
            user_id = %current.id,
            action = command.action.as_str(),
            mutation = command.action.is_mutation(),
            "Assistant command"
        );
        match self.dispatch(current, &command).await {
            Ok(applied) => Ok(AssistantTurn {
                reply: ChatTurn::assistant(command.assistant_response),
                action: command.action,
                applied,
                error: None,
            }),
            Err(e) => {
                tracing::warn!(
                    user_id = %current.id,
                    action = command.action.as_str(),
                    "Assistant command rejected: {}",
                    e
                );
                Ok(AssistantTurn {
                    reply: ChatTurn::assistant(format!("I could not do that: {e}")),
                    action: command.action,
                    applied: false,
                    error: Some(e.to_string()),
                })
            }
        }
    }

    /// Carry out a command. Returns whether state was changed.
    pub async fn dispatch(&self, current: &User, command: &AssistantCommand) -> Result<bool> {
        let payload = &command.payload;
        let task_id = || {
            payload
                .task_id
                .as_deref()
                .ok_or_else(|| AppError::BadRequest("The command names no task".to_string()))
        };

        match command.action {
            AssistantAction::CreateTask => {
                let fields = payload.task.clone().unwrap_or_default();
                self.tasks.create(current, fields).await?;
                Ok(true)
            }
            AssistantAction::EditTask => {
                let fields = payload.task.clone().unwrap_or_default();
                self.tasks.update(current, task_id()?, fields).await?;
                Ok(true)
            }
            AssistantAction::DeleteTask => {
                self.tasks.delete(current, task_id()?).await?;
                Ok(true)
            }
            AssistantAction::CompleteTask => {
                let task = self.tasks.get(task_id()?).await?;
                let was_pending = task.is_pending();
                self.tasks.complete(current, &task.id.to_string()).await?;
                Ok(was_pending)
            }
            AssistantAction::ShowRanking
            | AssistantAction::ShowMyTasks
            | AssistantAction::ShowMyPerformance
            | AssistantAction::GenerateReport
            | AssistantAction::NoAction => Ok(false),
        }
    }
}
