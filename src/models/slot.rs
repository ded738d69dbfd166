use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use super::working_hours::WorkingHours;

/// Half-open `[start, end)` range during which a calendar is occupied.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BusyInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub duration_minutes: u32,
    pub confidence: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SlotRequest {
    pub duration_minutes: u32,
    pub range_start: DateTime<FixedOffset>,
    pub range_end: DateTime<FixedOffset>,
    #[serde(default)]
    pub working_hours: WorkingHours,
    /// Accepted for compatibility; busy intervals are not padded by it.
    #[serde(default = "default_buffer_minutes")]
    pub buffer_minutes: u32,
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

impl SlotRequest {
    pub fn new(
        duration_minutes: u32,
        range_start: DateTime<FixedOffset>,
        range_end: DateTime<FixedOffset>,
    ) -> Self {
        Self {
            duration_minutes,
            range_start,
            range_end,
            working_hours: WorkingHours::default(),
            buffer_minutes: default_buffer_minutes(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

fn default_buffer_minutes() -> u32 {
    15
}

fn default_max_suggestions() -> usize {
    5
}

/// Times of day (`HH:MM`) the caller would like to favour or avoid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SlotPreferences {
    #[serde(default)]
    pub preferred_times: Vec<String>,
    #[serde(default)]
    pub avoid_times: Vec<String>,
}
