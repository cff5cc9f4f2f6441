use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conecta_protocol::{CreateTeam, Team};
use serde_json::{Value, json};

pub async fn list_teams(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<Team>>> {
    Ok(Json(state.team_service.list().await?))
}

pub async fn create_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<CreateTeam>,
) -> Result<(StatusCode, Json<Team>)> {
    let team = state.team_service.create(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn join_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Team>> {
    let team = state.team_service.join(&current.user, &id).await?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Value>> {
    let report = state.team_service.delete(&current.user, &id).await?;
    Ok(Json(json!({
        "deleted": id,
        "channels": report.channels,
        "messages": report.messages,
    })))
}
