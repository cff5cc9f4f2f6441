use crate::error::{AppError, Result};
use crate::services::require;
use crate::store::{DocumentStore, Entity, Query, Subscription, fetch};
use chrono::NaiveDate;
use conecta_protocol::{
    CreateReminder, DayAgenda, GlobalReminder, Task, User, ValidationError, parse_day,
};
use std::sync::Arc;

/// Calendar reminders and the per-day agenda.
#[derive(Clone)]
pub struct ReminderService {
    store: Arc<dyn DocumentStore>,
}

impl ReminderService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn subscribe(&self) -> Subscription<GlobalReminder> {
        Subscription::start(self.store.clone(), Query::collection(GlobalReminder::COLLECTION))
    }

    pub async fn list(&self) -> Result<Vec<GlobalReminder>> {
        Ok(fetch(self.store.as_ref(), &Query::collection(GlobalReminder::COLLECTION)).await?)
    }

    pub async fn add(&self, actor: &User, input: CreateReminder) -> Result<GlobalReminder> {
        ensure_owner(actor)?;
        let title = input.title.trim();
        if title.is_empty() {
            return Err(ValidationError::Empty("title").into());
        }
        parse_day("date", &input.date)?;

        let mut reminder = GlobalReminder {
            id: String::new(),
            title: title.to_string(),
            date: input.date.trim().to_string(),
            kind: input.kind,
            time: input.time.filter(|t| !t.trim().is_empty()),
            created_by: actor.id.clone(),
        };
        reminder.id = self
            .store
            .add(GlobalReminder::COLLECTION, reminder.to_fields()?)
            .await?;

        tracing::info!(reminder_id = %reminder.id, date = %reminder.date, "Reminder added");
        Ok(reminder)
    }

    pub async fn delete(&self, actor: &User, id: &str) -> Result<()> {
        ensure_owner(actor)?;
        let reminder: GlobalReminder = require(self.store.as_ref(), id).await?;
        self.store
            .delete(GlobalReminder::COLLECTION, &reminder.id)
            .await?;
        tracing::info!(reminder_id = %reminder.id, "Reminder deleted");
        Ok(())
    }

    /// Tasks and reminders falling on one day. Entries whose stored date does
    /// not parse are left out.
    pub async fn agenda(&self, day: NaiveDate) -> Result<DayAgenda> {
        let tasks: Vec<Task> = fetch(self.store.as_ref(), &Query::collection(Task::COLLECTION)).await?;
        let reminders = self.list().await?;

        let falls_on = |date: &str| parse_day("date", date).is_ok_and(|d| d == day);
        Ok(DayAgenda {
            tasks: tasks
                .into_iter()
                .filter(|t| t.deadline.as_deref().is_some_and(|d| falls_on(d)))
                .collect(),
            reminders: reminders.into_iter().filter(|r| falls_on(&r.date)).collect(),
        })
    }
}

fn ensure_owner(actor: &User) -> Result<()> {
    if actor.is_owner() {
        Ok(())
    } else {
        Err(AppError::forbidden("Only an owner can manage reminders"))
    }
}
