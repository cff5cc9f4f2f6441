use crate::auth::CurrentUser;
use crate::error::{AppError, Result};
use crate::state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use chrono::NaiveDate;
use conecta_protocol::{CreateReminder, DayAgenda, GlobalReminder};

pub async fn list_reminders(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> Result<Json<Vec<GlobalReminder>>> {
    Ok(Json(state.reminder_service.list().await?))
}

pub async fn add_reminder(
    State(state): State<AppState>,
    current: CurrentUser,
    Json(input): Json<CreateReminder>,
) -> Result<(StatusCode, Json<GlobalReminder>)> {
    let reminder = state.reminder_service.add(&current.user, input).await?;
    Ok((StatusCode::CREATED, Json(reminder)))
}

pub async fn delete_reminder(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.reminder_service.delete(&current.user, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn agenda(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path((day, month, year)): Path<(u32, u32, i32)>,
) -> Result<Json<DayAgenda>> {
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| AppError::BadRequest(format!("{day}/{month}/{year} is not a date")))?;
    Ok(Json(state.reminder_service.agenda(date).await?))
}
