use crate::auth::{CurrentUser, LoginRequest, LoginResponse, RegisterRequest};
use crate::error::Result;
use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use conecta_protocol::User;

pub async fn register(
    State(state): State<AppState>,
    Json(input): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>)> {
    let identity = state
        .identity
        .create_account(&input.email, &input.password, &input.name)
        .await?;
    let user = state.user_service.register(&identity).await?;

    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn login(
    State(state): State<AppState>,
    Json(input): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let session = state.identity.sign_in(&input.email, &input.password).await?;
    let user = state.user_service.ensure_profile(&session.identity).await?;

    Ok(Json(LoginResponse {
        token: session.token,
        user,
    }))
}

pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Result<StatusCode> {
    state.identity.sign_out(&current.token).await?;
    Ok(StatusCode::NO_CONTENT)
}
