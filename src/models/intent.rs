use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Intent {
    Schedule,
    Query,
    Update,
    Cancel,
    Availability,
    EmailQuery,
    EmailSearch,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Schedule => "schedule",
            Intent::Query => "query",
            Intent::Update => "update",
            Intent::Cancel => "cancel",
            Intent::Availability => "availability",
            Intent::EmailQuery => "email-query",
            Intent::EmailSearch => "email-search",
        }
    }

    /// Lenient parse of an intent tag. Accepts `email_query` as well as
    /// `email-query`; anything unrecognised is `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "schedule" => Some(Intent::Schedule),
            "query" => Some(Intent::Query),
            "update" => Some(Intent::Update),
            "cancel" => Some(Intent::Cancel),
            "availability" => Some(Intent::Availability),
            "email-query" => Some(Intent::EmailQuery),
            "email-search" => Some(Intent::EmailSearch),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EntitySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_time: Option<DateTime<FixedOffset>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl EntitySet {
    /// Fill every field that is unset here from `prior`.
    pub fn merged_over(mut self, prior: &EntitySet) -> Self {
        if self.date_time.is_none() {
            self.date_time = prior.date_time;
        }
        if self.duration.is_none() {
            self.duration = prior.duration;
        }
        if self.title.is_none() {
            self.title.clone_from(&prior.title);
        }
        if self.current_title.is_none() {
            self.current_title.clone_from(&prior.current_title);
        }
        if self.new_title.is_none() {
            self.new_title.clone_from(&prior.new_title);
        }
        if self.attendees.is_none() {
            self.attendees.clone_from(&prior.attendees);
        }
        if self.location.is_none() {
            self.location.clone_from(&prior.location);
        }
        if self.description.is_none() {
            self.description.clone_from(&prior.description);
        }
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParsedQuery {
    pub intent: Intent,
    pub entities: EntitySet,
    pub confidence: f64,
}

/// The previous turn of a conversation, passed back in by the caller so a
/// follow-up utterance can be merged instead of parsed from scratch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    pub original_query: String,
    #[serde(default)]
    pub intent: Option<Intent>,
    #[serde(default)]
    pub entities: EntitySet,
    #[serde(default)]
    pub missing_fields: Vec<String>,
}
