use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
}

impl Urgency {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "low" => Some(Urgency::Low),
            "medium" => Some(Urgency::Medium),
            "high" => Some(Urgency::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum MeetingType {
    OneOnOne,
    TeamMeeting,
    Interview,
    Casual,
    Formal,
}

impl MeetingType {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "one-on-one" => Some(MeetingType::OneOnOne),
            "team-meeting" => Some(MeetingType::TeamMeeting),
            "interview" => Some(MeetingType::Interview),
            "casual" => Some(MeetingType::Casual),
            "formal" => Some(MeetingType::Formal),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingDetails {
    /// Literal time phrases as they appear in the email, in order.
    pub proposed_times: Vec<String>,
    pub meeting_topic: String,
    pub participants: Vec<String>,
    pub urgency: Urgency,
    pub meeting_type: MeetingType,
    /// Minutes, always within 15..=480.
    pub estimated_duration: u32,
    pub action_items: Vec<String>,
    pub response_required: bool,
}

/// `details` is present exactly when `has_scheduling_intent` is true. Build
/// values through [`SchedulingAnalysis::scheduling`] and
/// [`SchedulingAnalysis::none`] to keep that so.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SchedulingAnalysis {
    pub has_scheduling_intent: bool,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<SchedulingDetails>,
}

impl SchedulingAnalysis {
    pub fn scheduling(confidence: f64, details: SchedulingDetails) -> Self {
        Self {
            has_scheduling_intent: true,
            confidence: confidence.clamp(0.0, 1.0),
            details: Some(details),
        }
    }

    pub fn none(confidence: f64) -> Self {
        Self {
            has_scheduling_intent: false,
            confidence: confidence.clamp(0.0, 1.0),
            details: None,
        }
    }
}
