use crate::auth::Identity;
use crate::error::{AppError, Result};
use crate::services::require;
use crate::store::{DocumentStore, Entity, Patch, Query, Subscription, fetch, fetch_one};
use crate::visibility;
use conecta_protocol::{MemberStats, Role, Task, Team, UpdateProfile, User};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn DocumentStore>,
    owner_email: Option<String>,
}

impl UserService {
    pub fn new(store: Arc<dyn DocumentStore>, owner_email: Option<String>) -> Self {
        Self {
            store,
            owner_email: owner_email.map(|e| e.trim().to_lowercase()),
        }
    }

    pub fn subscribe(&self) -> Subscription<User> {
        Subscription::start(self.store.clone(), Query::collection(User::COLLECTION))
    }

    /// Mirror a freshly created account into the users collection. New
    /// profiles are Members unless the email is the configured owner's.
    pub async fn register(&self, identity: &Identity) -> Result<User> {
        let mut user = User::member(
            identity.uid.clone(),
            identity.display_name.clone(),
            Some(identity.email.clone()),
        );
        if self
            .owner_email
            .as_deref()
            .is_some_and(|owner| owner == identity.email.to_lowercase())
        {
            user.role = Role::Owner;
        }
        self.store
            .set(User::COLLECTION, &user.id, user.to_fields()?)
            .await?;
        tracing::info!(user_id = %user.id, "Profile created");
        Ok(user)
    }

    /// Profile for an authenticated identity, defaulting to a new Member
    /// profile when the store has none yet.
    pub async fn ensure_profile(&self, identity: &Identity) -> Result<User> {
        match fetch_one::<User>(self.store.as_ref(), &identity.uid).await? {
            Some(user) => Ok(user),
            None => self.register(identity).await,
        }
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        require(self.store.as_ref(), id).await
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        Ok(fetch(self.store.as_ref(), &Query::collection(User::COLLECTION)).await?)
    }

    pub async fn visible_to(&self, current: &User) -> Result<Vec<User>> {
        let users = self.list().await?;
        let teams: Vec<Team> = fetch(self.store.as_ref(), &Query::collection(Team::COLLECTION)).await?;
        Ok(visibility::visible_users(current, &users, &teams))
    }

    /// Apply a partial profile edit. Role and points are not reachable here.
    pub async fn update_profile(&self, current: &User, input: UpdateProfile) -> Result<User> {
        if input.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(AppError::BadRequest("Name must not be empty".to_string()));
        }

        let patch = Patch::from_partial(&input)?;
        if !patch.is_empty() {
            self.store
                .update(User::COLLECTION, &current.id, patch)
                .await?;
        }
        self.get(&current.id).await
    }

    /// Flip a Member to Owner. Only Owners may do this.
    pub async fn toggle_role(&self, actor: &User, target_id: &str) -> Result<User> {
        let target = self.get(target_id).await?;
        if !visibility::can_toggle_role(actor, &target) {
            return Err(AppError::forbidden(
                "Only an owner can change roles, and only of member accounts",
            ));
        }

        let role = target.role.toggled();
        self.store
            .update(
                User::COLLECTION,
                &target.id,
                Patch::new().set("role", role.as_str()),
            )
            .await?;
        tracing::info!(user_id = %target.id, ?role, "Role changed");
        self.get(&target.id).await
    }

    /// Members ordered by points, highest first.
    pub async fn ranking(&self) -> Result<Vec<User>> {
        let mut members: Vec<User> = self
            .list()
            .await?
            .into_iter()
            .filter(|u| u.role == Role::Member)
            .collect();
        members.sort_by(|a, b| b.points.cmp(&a.points));
        Ok(members)
    }

    /// Task counters for one user. Owners may inspect anyone, others only
    /// themselves.
    pub async fn member_stats(&self, actor: &User, user_id: &str) -> Result<MemberStats> {
        if !actor.is_owner() && actor.id != user_id {
            return Err(AppError::forbidden("Only an owner can view other members' stats"));
        }
        let user = self.get(user_id).await?;
        let tasks: Vec<Task> = fetch(self.store.as_ref(), &Query::collection(Task::COLLECTION)).await?;
        Ok(stats_for(&user, &tasks))
    }
}

pub fn stats_for(user: &User, tasks: &[Task]) -> MemberStats {
    let assigned: Vec<&Task> = tasks.iter().filter(|t| t.is_assigned_to(user)).collect();
    let pending = assigned.iter().filter(|t| t.is_pending()).count();
    let completed = assigned.len() - pending;
    let completion_rate = if assigned.is_empty() {
        0
    } else {
        (completed * 100 / assigned.len()) as u32
    };

    MemberStats {
        user_id: user.id.clone(),
        name: user.name.clone(),
        points: user.points,
        assigned: assigned.len(),
        pending,
        completed,
        completion_rate,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conecta_protocol::{TaskFields, TaskStatus};
    use uuid::Uuid;

    fn task(responsible: &str, status: TaskStatus) -> Task {
        Task {
            status,
            ..TaskFields {
                responsible: Some(vec![responsible.to_string()]),
                ..Default::default()
            }
            .into_task(Uuid::new_v4())
        }
    }

    #[test]
    fn stats_count_only_assigned_tasks() {
        let carlos = User::member("u2", "Carlos", None);
        let tasks = vec![
            task("@Carlos", TaskStatus::Completed),
            task("@Carlos", TaskStatus::Completed),
            task("@Carlos", TaskStatus::Pending),
            task("@Luana", TaskStatus::Completed),
        ];

        let stats = stats_for(&carlos, &tasks);
        assert_eq!(stats.assigned, 3);
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.completed, 2);
        assert_eq!(stats.completion_rate, 66);
    }

    #[test]
    fn stats_without_tasks() {
        let stats = stats_for(&User::member("u9", "New", None), &[]);
        assert_eq!(stats.assigned, 0);
        assert_eq!(stats.completion_rate, 0);
    }
}
