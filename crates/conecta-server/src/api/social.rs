use crate::auth::CurrentUser;
use crate::error::Result;
use crate::services::social::SocialPane;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use conecta_protocol::{CreateMessage, CreatePost, DirectMessage, Post, SocialView};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct SocialQuery {
    #[serde(default)]
    pub view: SocialView,
}

pub async fn social_view(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<SocialQuery>,
) -> Result<Json<SocialPane>> {
    let contacts = state.user_service.visible_to(&current.user).await?;
    let pane = state
        .social_service
        .view(&current.user, query.view, contacts)
        .await?;
    Ok(Json(pane))
}

pub async fn feed(State(state): State<AppState>, current: CurrentUser) -> Result<Json<Vec<Post>>> {
    Ok(Json(state.social_service.feed(&current.user).await?))
}

pub async fn publish(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<CreatePost>,
) -> Result<(StatusCode, Json<Post>)> {
    let post = state.social_service.publish(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

pub async fn conversation(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<DirectMessage>>> {
    state.user_service.get(&user_id).await?;
    let messages = state
        .message_service
        .conversation(&current.user.id, &user_id)
        .await?;
    Ok(Json(messages))
}

pub async fn send_direct(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<DirectMessage>)> {
    let receiver = state.user_service.get(&user_id).await?;
    let message = state
        .message_service
        .send_direct(&current.user, &receiver.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
