use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conecta_protocol::{Channel, ChannelMessage, CreateChannel, CreateMessage};

pub async fn list_channels(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Channel>>> {
    let channels = state.channel_service.visible_to(&current.user).await?;
    Ok(Json(channels))
}

pub async fn create_channel(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<CreateChannel>,
) -> Result<(StatusCode, Json<Channel>)> {
    let channel = state.channel_service.create(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(channel)))
}

pub async fn list_messages(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Vec<ChannelMessage>>> {
    let channel = state.channel_service.ensure_access(&current.user, &id).await?;
    let messages = state.message_service.channel_messages(&channel.id).await?;
    Ok(Json(messages))
}

pub async fn post_message(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<CreateMessage>,
) -> Result<(StatusCode, Json<ChannelMessage>)> {
    let channel = state.channel_service.ensure_access(&current.user, &id).await?;
    let message = state
        .message_service
        .post_to_channel(&current.user, &channel.id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}
