use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{Json, extract::State};
use conecta_protocol::{AssistantRequest, AssistantTurn};

pub async fn handle(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<AssistantRequest>,
) -> Result<Json<AssistantTurn>> {
    if input.message.trim().is_empty() {
        return Err(AppError::BadRequest("Message must not be empty".to_string()));
    }
    let turn = state.assistant.handle(&current.user, input).await?;
    Ok(Json(turn))
}
