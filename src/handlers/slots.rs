use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use crate::errors::AppError;
use crate::models::{BusyInterval, CandidateSlot, SlotPreferences, SlotRequest};
use crate::state::AppState;

use super::json_body;

#[derive(Debug, Deserialize)]
pub struct RecommendSlotsRequest {
    pub request: SlotRequest,
    #[serde(default)]
    pub busy: Vec<BusyInterval>,
    #[serde(default)]
    pub preferences: Option<SlotPreferences>,
}

// POST /api/slots
pub async fn recommend_slots(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RecommendSlotsRequest>, JsonRejection>,
) -> Result<Json<Vec<CandidateSlot>>, AppError> {
    let req = json_body(payload)?;
    let slots = state
        .engine
        .recommend_slots(&req.request, &req.busy, req.preferences.as_ref())?;
    Ok(Json(slots))
}
