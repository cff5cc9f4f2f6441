use crate::assistant::{AssistantService, CompletionClient, GeminiClient};
use crate::auth::{IdentityProvider, LocalIdentityProvider};
use crate::services::{
    channel::ChannelService, message::MessageService, reminder::ReminderService,
    social::SocialService, task::TaskService, team::TeamService, user::UserService,
};
use crate::store::DocumentStore;
use serde::Deserialize;
use sqlx::SqlitePool;
use std::sync::Arc;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production";

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    pub bind_address: String,
    pub database_url: String,
    #[serde(default)]
    pub jwt_secret: Option<String>,
    /// Unset runs the assistant in demo mode.
    #[serde(default)]
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    /// Accounts registered with this email get the Owner role.
    #[serde(default)]
    pub owner_email: Option<String>,
    pub max_batch_size: usize,
    pub seed_demo_data: bool,
}

impl Config {
    /// Defaults overlaid with `CONECTA_*` environment variables.
    pub fn load() -> anyhow::Result<Self> {
        let mut config: Config = config::Config::builder()
            .set_default("bind_address", "0.0.0.0:8080")?
            .set_default("database_url", "sqlite:conecta.db")?
            .set_default("gemini_model", "gemini-2.5-flash")?
            .set_default("max_batch_size", 500)?
            .set_default("seed_demo_data", true)?
            .add_source(config::Environment::with_prefix("CONECTA").try_parsing(true))
            .build()?
            .try_deserialize()?;

        if config.jwt_secret.is_none() {
            tracing::warn!("CONECTA_JWT_SECRET not set, using default (insecure for production!)");
            config.jwt_secret = Some(DEV_JWT_SECRET.to_string());
        }
        if config.gemini_api_key.as_deref().is_some_and(str::is_empty) {
            config.gemini_api_key = None;
        }
        if config.owner_email.as_deref().is_some_and(str::is_empty) {
            config.owner_email = None;
        }
        if config.gemini_api_key.is_none() {
            tracing::warn!("CONECTA_GEMINI_API_KEY not set, assistant runs in demo mode");
        }

        Ok(config)
    }

    /// Settings for tests and embedding: in-memory database, demo assistant.
    pub fn in_memory() -> Self {
        Self {
            bind_address: "127.0.0.1:0".to_string(),
            database_url: "sqlite::memory:".to_string(),
            jwt_secret: Some("test-secret-key-for-testing-only".to_string()),
            gemini_api_key: None,
            gemini_model: "gemini-2.5-flash".to_string(),
            owner_email: None,
            max_batch_size: 500,
            seed_demo_data: false,
        }
    }

    pub fn jwt_secret(&self) -> &str {
        self.jwt_secret.as_deref().unwrap_or(DEV_JWT_SECRET)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn DocumentStore>,
    pub identity: Arc<dyn IdentityProvider>,
    pub user_service: UserService,
    pub task_service: TaskService,
    pub team_service: TeamService,
    pub channel_service: ChannelService,
    pub message_service: MessageService,
    pub social_service: SocialService,
    pub reminder_service: ReminderService,
    pub assistant: AssistantService,
}

impl AppState {
    pub fn new(config: Config, db: SqlitePool, store: Arc<dyn DocumentStore>) -> anyhow::Result<Self> {
        let identity: Arc<dyn IdentityProvider> =
            Arc::new(LocalIdentityProvider::new(db, config.jwt_secret().to_string()));

        let completion: Option<Arc<dyn CompletionClient>> = match &config.gemini_api_key {
            Some(key) => Some(Arc::new(GeminiClient::new(
                key.clone(),
                config.gemini_model.clone(),
            )?)),
            None => None,
        };

        Ok(Self::with_parts(config, store, identity, completion))
    }

    /// Assemble state around explicit collaborators.
    pub fn with_parts(
        config: Config,
        store: Arc<dyn DocumentStore>,
        identity: Arc<dyn IdentityProvider>,
        completion: Option<Arc<dyn CompletionClient>>,
    ) -> Self {
        let user_service = UserService::new(store.clone(), config.owner_email.clone());
        let task_service = TaskService::new(store.clone());
        let team_service = TeamService::new(store.clone());
        let channel_service = ChannelService::new(store.clone());
        let message_service = MessageService::new(store.clone());
        let social_service = SocialService::new(store.clone());
        let reminder_service = ReminderService::new(store.clone());
        let assistant = AssistantService::new(
            completion,
            user_service.clone(),
            task_service.clone(),
        );

        Self {
            config,
            store,
            identity,
            user_service,
            task_service,
            team_service,
            channel_service,
            message_service,
            social_service,
            reminder_service,
            assistant,
        }
    }
}
