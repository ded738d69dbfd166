//! Meeting slot recommendation: generate a 30-minute grid of candidates
//! inside working hours, drop those overlapping busy time, score the rest and
//! keep the best.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, Timelike};
use uuid::Uuid;

use crate::models::working_hours::format_time;
use crate::models::{BusyInterval, CandidateSlot, SlotPreferences, SlotRequest};

pub const SLOT_STEP_MINUTES: i64 = 30;
pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 480;
pub const MAX_SUGGESTIONS: usize = 10;
/// Longest accepted range, in calendar days.
pub const MAX_RANGE_DAYS: i64 = 366;

const BASE_CONFIDENCE: f64 = 0.8;
const LATE_MORNING_BONUS: f64 = 0.2;
const EARLY_AFTERNOON_BONUS: f64 = 0.15;
const OFF_HOURS_PENALTY: f64 = 0.1;
const PREFERRED_TIME_BONUS: f64 = 0.3;
const AVOIDED_TIME_PENALTY: f64 = 0.4;

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("invalid slot request: {0}")]
    InvalidRequest(String),

    #[error("date range spans {days} days, the limit is {max}")]
    RangeTooLarge { days: i64, max: i64 },

    #[error("slot recommendation {request_id} failed: {reason}")]
    Internal { request_id: Uuid, reason: String },
}

pub fn validate_request(request: &SlotRequest) -> Result<(), SchedulingError> {
    if !(MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&request.duration_minutes) {
        return Err(SchedulingError::InvalidRequest(format!(
            "durationMinutes must be between {MIN_DURATION_MINUTES} and {MAX_DURATION_MINUTES}, got {}",
            request.duration_minutes
        )));
    }
    if !(1..=MAX_SUGGESTIONS).contains(&request.max_suggestions) {
        return Err(SchedulingError::InvalidRequest(format!(
            "maxSuggestions must be between 1 and {MAX_SUGGESTIONS}, got {}",
            request.max_suggestions
        )));
    }
    if request.range_end < request.range_start {
        return Err(SchedulingError::InvalidRequest(
            "rangeEnd must not be before rangeStart".to_string(),
        ));
    }
    if request.working_hours.window_minutes() <= 0 {
        return Err(SchedulingError::InvalidRequest(format!(
            "working hours {} are empty",
            request.working_hours.to_human_readable()
        )));
    }

    let (first, last) = day_bounds(request);
    let days = (last - first).num_days() + 1;
    if days > MAX_RANGE_DAYS {
        return Err(SchedulingError::RangeTooLarge {
            days,
            max: MAX_RANGE_DAYS,
        });
    }
    Ok(())
}

/// First and last calendar day of the range, in the offset of `range_start`.
fn day_bounds(request: &SlotRequest) -> (NaiveDate, NaiveDate) {
    let offset = *request.range_start.offset();
    (
        request.range_start.date_naive(),
        request.range_end.with_timezone(&offset).date_naive(),
    )
}

fn at(day: NaiveDate, time: NaiveTime, offset: FixedOffset) -> Result<DateTime<FixedOffset>, String> {
    day.and_time(time)
        .and_local_timezone(offset)
        .single()
        .ok_or_else(|| format!("cannot place {time} on {day}"))
}

/// Every `duration`-long window starting on the 30-minute grid from the
/// working-hours start, for each calendar day the range touches, weekends
/// included. The whole working window of each day is used; windows running
/// past the working-hours end are skipped.
pub fn generate_candidates(request: &SlotRequest) -> Result<Vec<CandidateSlot>, String> {
    let offset = *request.range_start.offset();
    let duration = Duration::minutes(i64::from(request.duration_minutes));
    let step = Duration::minutes(SLOT_STEP_MINUTES);
    let (first, last) = day_bounds(request);

    let mut candidates = Vec::new();
    let mut day = first;
    while day <= last {
        let day_start = at(day, request.working_hours.start, offset)?;
        let day_end = at(day, request.working_hours.end, offset)?;

        let mut start = day_start;
        loop {
            let end = start
                .checked_add_signed(duration)
                .ok_or_else(|| format!("slot end overflows after {start}"))?;
            if end > day_end {
                break;
            }
            candidates.push(CandidateSlot {
                start,
                end,
                duration_minutes: request.duration_minutes,
                confidence: BASE_CONFIDENCE,
            });
            start = start
                .checked_add_signed(step)
                .ok_or_else(|| format!("slot start overflows after {start}"))?;
        }

        day = day
            .succ_opt()
            .ok_or_else(|| format!("no calendar day after {day}"))?;
    }

    Ok(candidates)
}

/// Whether the slot collides with busy time: its start falls inside the
/// interval, its end falls inside it, or it contains the whole interval.
/// Intervals are half-open, so back-to-back meetings do not collide.
pub fn overlaps(slot: &CandidateSlot, busy: &BusyInterval) -> bool {
    let start_inside = slot.start >= busy.start && slot.start < busy.end;
    let end_inside = slot.end > busy.start && slot.end <= busy.end;
    let contains = slot.start <= busy.start && slot.end >= busy.end;
    start_inside || end_inside || contains
}

pub fn filter_conflicts(candidates: Vec<CandidateSlot>, busy: &[BusyInterval]) -> Vec<CandidateSlot> {
    candidates
        .into_iter()
        .filter(|slot| !busy.iter().any(|b| overlaps(slot, b)))
        .collect()
}

pub fn score_slot(slot: &CandidateSlot, preferences: Option<&SlotPreferences>) -> f64 {
    let mut score = BASE_CONFIDENCE;

    match slot.start.hour() {
        10 | 11 => score += LATE_MORNING_BONUS,
        14 | 15 => score += EARLY_AFTERNOON_BONUS,
        h if h < 9 || h > 16 => score -= OFF_HOURS_PENALTY,
        _ => {}
    }

    if let Some(prefs) = preferences {
        let start = format_time(&slot.start.time());
        if prefs.preferred_times.iter().any(|t| t.trim() == start) {
            score += PREFERRED_TIME_BONUS;
        }
        if prefs.avoid_times.iter().any(|t| t.trim() == start) {
            score -= AVOIDED_TIME_PENALTY;
        }
    }

    score.clamp(0.0, 1.0)
}

/// Generate, filter, score and select. Equal scores keep chronological
/// order, so the same inputs always give the same output.
pub fn recommend_slots(
    request: &SlotRequest,
    busy: &[BusyInterval],
    preferences: Option<&SlotPreferences>,
) -> Result<Vec<CandidateSlot>, SchedulingError> {
    validate_request(request)?;

    let request_id = Uuid::new_v4();
    let candidates = generate_candidates(request)
        .map_err(|reason| SchedulingError::Internal { request_id, reason })?;
    let generated = candidates.len();

    let mut slots = filter_conflicts(candidates, busy);
    let free = slots.len();

    for slot in &mut slots {
        slot.confidence = score_slot(slot, preferences);
    }
    if let Some(slot) = slots.iter().find(|s| !s.confidence.is_finite()) {
        return Err(SchedulingError::Internal {
            request_id,
            reason: format!("non-finite score for slot at {}", slot.start),
        });
    }

    slots.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    slots.truncate(request.max_suggestions);

    tracing::info!(
        %request_id,
        generated,
        free,
        returned = slots.len(),
        buffer_minutes = request.buffer_minutes,
        "recommended meeting slots"
    );

    Ok(slots)
}
