use crate::auth::CurrentUser;
use crate::error::Result;
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
};
use conecta_protocol::{MemberStats, UpdateProfile, User};

pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Json<Vec<User>>> {
    let users = state.user_service.visible_to(&current.user).await?;
    Ok(Json(users))
}

pub async fn get_me(current: CurrentUser) -> Json<User> {
    Json(current.user)
}

pub async fn update_me(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<UpdateProfile>,
) -> Result<Json<User>> {
    let user = state
        .user_service
        .update_profile(&current.user, input)
        .await?;
    Ok(Json(user))
}

pub async fn toggle_role(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<User>> {
    let user = state.user_service.toggle_role(&current.user, &id).await?;
    Ok(Json(user))
}

pub async fn ranking(State(state): State<AppState>, _current: CurrentUser) -> Result<Json<Vec<User>>> {
    Ok(Json(state.user_service.ranking().await?))
}

pub async fn member_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<MemberStats>> {
    let stats = state.user_service.member_stats(&current.user, &id).await?;
    Ok(Json(stats))
}
