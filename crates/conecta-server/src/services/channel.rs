use crate::error::{AppError, Result};
use crate::services::require;
use crate::store::{DocumentStore, Entity, Query, Subscription, fetch};
use crate::visibility;
use conecta_protocol::{Channel, CreateChannel, Team, User, normalize_channel_name};
use std::sync::Arc;

#[derive(Clone)]
pub struct ChannelService {
    store: Arc<dyn DocumentStore>,
}

impl ChannelService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn subscribe(&self) -> Subscription<Channel> {
        Subscription::start(self.store.clone(), Query::collection(Channel::COLLECTION))
    }

    pub async fn list(&self) -> Result<Vec<Channel>> {
        Ok(fetch(self.store.as_ref(), &Query::collection(Channel::COLLECTION)).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Channel> {
        require(self.store.as_ref(), id).await
    }

    pub async fn visible_to(&self, current: &User) -> Result<Vec<Channel>> {
        let channels = self.list().await?;
        let teams: Vec<Team> = fetch(self.store.as_ref(), &Query::collection(Team::COLLECTION)).await?;
        Ok(visibility::visible_channels(current, &channels, &teams))
    }

    /// Check that the user may read and post in a channel.
    pub async fn ensure_access(&self, current: &User, channel_id: &str) -> Result<Channel> {
        let channel = self.get(channel_id).await?;
        if let Some(team_id) = &channel.team_id {
            let team: Team = require(self.store.as_ref(), team_id).await?;
            if !team.has_member(&current.id) {
                return Err(AppError::forbidden("Join the team to use its channels"));
            }
        }
        Ok(channel)
    }

    /// Create a global channel (Owner) or a channel of a team (its owner).
    /// Names are unique within their scope.
    pub async fn create(&self, actor: &User, input: CreateChannel) -> Result<Channel> {
        let name = normalize_channel_name(&input.name);
        if name == "#" {
            return Err(AppError::BadRequest("Channel name must not be empty".to_string()));
        }

        let scope = match &input.team_id {
            None => {
                if !actor.is_owner() {
                    return Err(AppError::forbidden("Only an owner can create global channels"));
                }
                Query::collection(Channel::COLLECTION)
            }
            Some(team_id) => {
                let team: Team = require(self.store.as_ref(), team_id).await?;
                if team.owner_id != actor.id {
                    return Err(AppError::forbidden(
                        "Only the team owner can add channels to it",
                    ));
                }
                Query::collection(Channel::COLLECTION).where_eq("teamId", team_id.as_str())
            }
        };

        let taken = fetch::<Channel>(self.store.as_ref(), &scope)
            .await?
            .into_iter()
            .filter(|c| c.team_id == input.team_id)
            .any(|c| c.name == name);
        if taken {
            return Err(AppError::Conflict(format!("Channel {name} already exists")));
        }

        let mut channel = Channel {
            id: String::new(),
            name,
            team_id: input.team_id,
        };
        channel.id = self
            .store
            .add(Channel::COLLECTION, channel.to_fields()?)
            .await?;

        tracing::info!(channel_id = %channel.id, name = %channel.name, "Channel created");
        Ok(channel)
    }
}
