mod assistant;
mod auth;
mod channels;
mod reminders;
mod social;
mod tasks;
mod teams;
mod users;

use crate::state::AppState;
use axum::{
    Router,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(|| async { "OK" }))
        // Auth routes
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        // User routes
        .route("/api/users", get(users::list_users))
        .route("/api/users/me", get(users::get_me).patch(users::update_me))
        .route("/api/users/ranking", get(users::ranking))
        .route("/api/users/{id}/role", post(users::toggle_role))
        .route("/api/users/{id}/stats", get(users::member_stats))
        // Task routes
        .route("/api/tasks", get(tasks::list_tasks).post(tasks::create_task))
        .route("/api/tasks/pending", get(tasks::pending_tasks))
        .route(
            "/api/tasks/{id}",
            axum::routing::patch(tasks::update_task).delete(tasks::delete_task),
        )
        .route("/api/tasks/{id}/complete", post(tasks::complete_task))
        // Team routes
        .route("/api/teams", get(teams::list_teams).post(teams::create_team))
        .route("/api/teams/{id}", delete(teams::delete_team))
        .route("/api/teams/{id}/join", post(teams::join_team))
        // Channel routes
        .route(
            "/api/channels",
            get(channels::list_channels).post(channels::create_channel),
        )
        .route(
            "/api/channels/{id}/messages",
            get(channels::list_messages).post(channels::post_message),
        )
        // DM routes
        .route(
            "/api/dms/{user_id}",
            get(social::conversation).post(social::send_direct),
        )
        // Social routes
        .route("/api/social", get(social::social_view))
        .route("/api/posts", get(social::feed).post(social::publish))
        // Calendar routes
        .route(
            "/api/reminders",
            get(reminders::list_reminders).post(reminders::add_reminder),
        )
        .route("/api/reminders/{id}", delete(reminders::delete_reminder))
        .route("/api/calendar/{day}/{month}/{year}", get(reminders::agenda))
        // Assistant
        .route("/api/assistant", post(assistant::handle))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
