use crate::error::{AppError, Result};
use crate::services::require;
use crate::store::{
    DocumentStore, Entity, Patch, Query, StoreError, Subscription, WriteOp, fetch,
};
use crate::visibility;
use conecta_protocol::{
    Task, TaskFields, TaskStatus, User, ValidationError, normalize_channel_name, parse_day,
};
use std::sync::Arc;
use uuid::Uuid;

/// Task lifecycle. Every mutation checks the acting user's role first and
/// touches the store only once the check has passed.
#[derive(Clone)]
pub struct TaskService {
    store: Arc<dyn DocumentStore>,
}

impl TaskService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn subscribe(&self) -> Subscription<Task> {
        Subscription::start(self.store.clone(), Query::collection(Task::COLLECTION))
    }

    pub async fn list(&self) -> Result<Vec<Task>> {
        Ok(fetch(self.store.as_ref(), &Query::collection(Task::COLLECTION)).await?)
    }

    /// Task list as the given user sees it: everything for an Owner, the
    /// user's own pending tasks otherwise.
    pub async fn visible_to(&self, current: &User) -> Result<Vec<Task>> {
        let tasks = self.list().await?;
        if current.is_owner() {
            Ok(tasks)
        } else {
            Ok(visibility::pending_tasks_for(current, &tasks))
        }
    }

    pub async fn pending_for(&self, current: &User) -> Result<Vec<Task>> {
        let tasks = self.list().await?;
        Ok(visibility::pending_tasks_for(current, &tasks))
    }

    pub async fn get(&self, id: &str) -> Result<Task> {
        let id = parse_task_id(id)?;
        require(self.store.as_ref(), &id.to_string()).await
    }

    pub async fn create(&self, actor: &User, fields: TaskFields) -> Result<Task> {
        ensure_manager(actor)?;
        let fields = validate(fields)?;

        let task = fields.into_task(Uuid::new_v4());
        self.store
            .set(Task::COLLECTION, &task.document_id(), task.to_fields()?)
            .await?;

        tracing::info!(task_id = %task.id, title = %task.title, "Task created");
        Ok(task)
    }

    /// Merge the supplied fields into a pending task. Unset fields keep
    /// their stored values.
    pub async fn update(&self, actor: &User, id: &str, fields: TaskFields) -> Result<Task> {
        ensure_manager(actor)?;
        let fields = validate(fields)?;
        if fields.is_empty() {
            return Err(AppError::BadRequest("No task fields to update".to_string()));
        }

        let task = self.get(id).await?;
        if !task.is_pending() {
            return Err(AppError::Conflict(format!(
                "Task {} is already completed",
                task.id
            )));
        }

        let patch = Patch::from_partial(&fields)?;
        self.store
            .update(Task::COLLECTION, &task.document_id(), patch)
            .await?;

        tracing::info!(task_id = %task.id, "Task updated");
        self.get(&task.document_id()).await
    }

    pub async fn delete(&self, actor: &User, id: &str) -> Result<()> {
        ensure_manager(actor)?;
        let task = self.get(id).await?;
        self.store
            .delete(Task::COLLECTION, &task.document_id())
            .await?;
        tracing::info!(task_id = %task.id, "Task deleted");
        Ok(())
    }

    /// Complete a pending task and award its points to every responsible
    /// Member, in one atomic batch. Completing an already completed task
    /// changes nothing.
    pub async fn complete(&self, actor: &User, id: &str) -> Result<Task> {
        if !visibility::can_complete_tasks(actor) {
            return Err(AppError::forbidden("Only members can complete tasks"));
        }

        let task = self.get(id).await?;
        if !task.is_pending() {
            tracing::debug!(task_id = %task.id, "Task already completed");
            return Ok(task);
        }

        let users: Vec<User> = fetch(self.store.as_ref(), &Query::collection(User::COLLECTION)).await?;
        let awarded = visibility::resolve_responsible(&task.responsible, &users);

        // The status guard runs inside the batch, so of two overlapping
        // completions only one commits and awards points.
        let mut batch = vec![
            WriteOp::expect(
                Task::COLLECTION,
                task.document_id(),
                "status",
                TaskStatus::Pending.as_str(),
            ),
            WriteOp::update(
                Task::COLLECTION,
                task.document_id(),
                Patch::new().set("status", TaskStatus::Completed.as_str()),
            ),
        ];
        if task.points > 0 {
            batch.extend(awarded.iter().map(|user| WriteOp::Increment {
                collection: User::COLLECTION.to_string(),
                id: user.id.clone(),
                field: "points".to_string(),
                delta: i64::from(task.points),
                max: Some(i64::from(u32::MAX)),
            }));
        }
        match self.store.commit(batch).await {
            Ok(()) => {}
            Err(StoreError::PreconditionFailed { .. }) => {
                tracing::debug!(task_id = %task.id, "Task completed concurrently");
                return self.get(&task.document_id()).await;
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            task_id = %task.id,
            points = task.points,
            awarded = awarded.len(),
            "Task completed"
        );
        Ok(Task {
            status: TaskStatus::Completed,
            ..task
        })
    }
}

fn ensure_manager(actor: &User) -> Result<()> {
    if visibility::can_manage_tasks(actor) {
        Ok(())
    } else {
        Err(AppError::forbidden("Only an owner can manage tasks"))
    }
}

// Unresolvable ids are reported as missing tasks.
fn parse_task_id(id: &str) -> Result<Uuid> {
    Uuid::parse_str(id.trim()).map_err(|_| AppError::not_found(format!("Task {id} not found")))
}

fn validate(mut fields: TaskFields) -> Result<TaskFields> {
    if fields.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(ValidationError::Empty("title").into());
    }
    if let Some(deadline) = &fields.deadline {
        parse_day("deadline", deadline)?;
    }
    if let Some(channel) = fields.channel.take() {
        fields.channel = Some(normalize_channel_name(&channel));
    }
    if let Some(responsible) = fields.responsible.take() {
        fields.responsible = Some(
            responsible
                .into_iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        );
    }
    Ok(fields)
}
