use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{DateTime, FixedOffset};
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{ConversationContext, ParsedQuery};
use crate::state::AppState;

use super::{json_body, reference_now, require_text};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub text: String,
    #[serde(default)]
    pub context: Option<ConversationContext>,
    #[serde(default)]
    pub now: Option<DateTime<FixedOffset>>,
}

// POST /api/query
pub async fn parse_query(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<ParsedQuery>, AppError> {
    let req = json_body(payload)?;
    require_text(&req.text)?;

    let parsed = state
        .engine
        .parse_query(&req.text, req.context, reference_now(req.now))
        .await;
    Ok(Json(parsed))
}
