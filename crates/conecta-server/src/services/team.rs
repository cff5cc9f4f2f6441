use crate::error::{AppError, Result};
use crate::services::require;
use crate::store::{DocumentStore, Entity, Query, Subscription, WriteOp, fetch};
use chrono::Utc;
use conecta_protocol::{Channel, ChannelMessage, CreateTeam, Team, User, ValidationError};
use futures_util::future::try_join_all;
use serde_json::Value;
use std::sync::Arc;

#[derive(Clone)]
pub struct TeamService {
    store: Arc<dyn DocumentStore>,
}

/// What a cascade removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CascadeReport {
    pub messages: usize,
    pub channels: usize,
    pub batches: usize,
}

impl TeamService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn newest_first() -> Query {
        Query::collection(Team::COLLECTION).order_by_desc("createdAt")
    }

    pub fn subscribe(&self) -> Subscription<Team> {
        Subscription::start(self.store.clone(), Self::newest_first())
    }

    pub async fn list(&self) -> Result<Vec<Team>> {
        Ok(fetch(self.store.as_ref(), &Self::newest_first()).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Team> {
        require(self.store.as_ref(), id).await
    }

    pub async fn create(&self, actor: &User, input: CreateTeam) -> Result<Team> {
        if !actor.is_owner() {
            return Err(AppError::forbidden("Only an owner can create teams"));
        }
        let name = input.name.trim();
        if name.is_empty() {
            return Err(ValidationError::Empty("name").into());
        }

        let mut team = Team {
            id: String::new(),
            name: name.to_string(),
            description: input.description.trim().to_string(),
            owner_id: actor.id.clone(),
            members: vec![actor.id.clone()],
            created_at: Utc::now(),
            logo_url: input.logo_url,
            theme_color: input.theme_color,
        };
        team.id = self.store.add(Team::COLLECTION, team.to_fields()?).await?;

        tracing::info!(team_id = %team.id, name = %team.name, "Team created");
        Ok(team)
    }

    /// Add the user to the team's members. Open to anyone; joining twice is a
    /// no-op. The merge happens inside the store, so concurrent joins never
    /// drop each other.
    pub async fn join(&self, user: &User, team_id: &str) -> Result<Team> {
        let team = self.get(team_id).await?;
        if team.members.iter().any(|m| *m == user.id) {
            return Ok(team);
        }

        self.store
            .commit(vec![WriteOp::ArrayUnion {
                collection: Team::COLLECTION.to_string(),
                id: team.id.clone(),
                field: "members".to_string(),
                values: vec![Value::from(user.id.as_str())],
            }])
            .await?;

        tracing::info!(team_id = %team.id, user_id = %user.id, "Joined team");
        self.get(&team.id).await
    }

    /// Delete a team with its channels and their messages.
    ///
    /// Children are resolved afresh on every call and the team document goes
    /// last, so a cascade interrupted between batches is finished by calling
    /// this again.
    pub async fn delete(&self, actor: &User, team_id: &str) -> Result<CascadeReport> {
        let team = self.get(team_id).await?;
        if !actor.is_owner() && team.owner_id != actor.id {
            return Err(AppError::forbidden(
                "Only the team owner or an owner can delete a team",
            ));
        }

        // Targets are resolved from raw documents so children that no longer
        // decode as entities are still removed.
        let store = self.store.as_ref();
        let channel_ids: Vec<String> = store
            .query(&Query::collection(Channel::COLLECTION).where_eq("teamId", team.id.as_str()))
            .await?
            .into_iter()
            .map(|doc| doc.id)
            .collect();

        let per_channel = try_join_all(channel_ids.iter().map(|channel_id| async move {
            let query = Query::collection(ChannelMessage::COLLECTION)
                .where_eq("channelId", channel_id.as_str());
            store.query(&query).await
        }))
        .await?;
        let message_ids: Vec<String> = per_channel
            .into_iter()
            .flatten()
            .map(|doc| doc.id)
            .collect();

        let mut ops: Vec<WriteOp> = Vec::with_capacity(message_ids.len() + channel_ids.len() + 1);
        ops.extend(
            message_ids
                .iter()
                .map(|id| WriteOp::delete(ChannelMessage::COLLECTION, id.as_str())),
        );
        ops.extend(
            channel_ids
                .iter()
                .map(|id| WriteOp::delete(Channel::COLLECTION, id.as_str())),
        );
        ops.push(WriteOp::delete(Team::COLLECTION, team.id.as_str()));

        let limit = store.max_batch_size().max(1);
        let mut report = CascadeReport {
            messages: message_ids.len(),
            channels: channel_ids.len(),
            batches: 0,
        };
        for chunk in ops.chunks(limit) {
            store.commit(chunk.to_vec()).await?;
            report.batches += 1;
            tracing::debug!(team_id = %team.id, ops = chunk.len(), "Cascade batch committed");
        }

        tracing::info!(
            team_id = %team.id,
            channels = report.channels,
            messages = report.messages,
            batches = report.batches,
            "Team deleted"
        );
        Ok(report)
    }
}
