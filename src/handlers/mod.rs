pub mod email;
pub mod health;
pub mod query;
pub mod slots;

use axum::extract::rejection::JsonRejection;
use axum::Json;
use chrono::{DateTime, FixedOffset, Utc};

use crate::errors::AppError;

/// Unwraps a JSON body, turning axum's rejection into a 400 with the usual
/// `{"error": ...}` shape.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::InvalidRequest(rejection.body_text()))
}

pub(crate) fn require_text(text: &str) -> Result<(), AppError> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidRequest("text must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn reference_now(now: Option<DateTime<FixedOffset>>) -> DateTime<FixedOffset> {
    now.unwrap_or_else(|| Utc::now().fixed_offset())
}
