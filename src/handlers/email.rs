use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::SchedulingAnalysis;
use crate::state::AppState;

use super::{json_body, reference_now, require_text};

#[derive(Debug, Deserialize)]
pub struct AnalyzeEmailRequest {
    pub text: String,
    #[serde(default)]
    pub now: Option<DateTime<FixedOffset>>,
}

// POST /api/email/analyze
pub async fn analyze_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AnalyzeEmailRequest>, JsonRejection>,
) -> Result<Json<SchedulingAnalysis>, AppError> {
    let req = json_body(payload)?;
    require_text(&req.text)?;

    let analysis = state
        .engine
        .analyze_email(&req.text, reference_now(req.now))
        .await;
    Ok(Json(analysis))
}
