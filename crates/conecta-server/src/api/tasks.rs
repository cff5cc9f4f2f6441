use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use conecta_protocol::{Task, TaskFields};

pub async fn list_tasks(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Task>>> {
    let tasks = state.task_service.visible_to(&current.user).await?;
    Ok(Json(tasks))
}

pub async fn pending_tasks(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<Task>>> {
    let tasks = state.task_service.pending_for(&current.user).await?;
    Ok(Json(tasks))
}

pub async fn create_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<TaskFields>,
) -> Result<(StatusCode, Json<Task>)> {
    let task = state.task_service.create(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

pub async fn update_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    Json(input): Json<TaskFields>,
) -> Result<Json<Task>> {
    let task = state.task_service.update(&current.user, &id, input).await?;
    Ok(Json(task))
}

pub async fn delete_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.task_service.delete(&current.user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn complete_task(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<Task>> {
    let task = state.task_service.complete(&current.user, &id).await?;
    Ok(Json(task))
}
