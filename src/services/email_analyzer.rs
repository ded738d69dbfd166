use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde_json::Value;

use crate::models::{MeetingType, SchedulingAnalysis, SchedulingDetails, Urgency};
use crate::services::ai::json::{extract_json_object, number_field, str_field, string_list};
use crate::services::ai::{ChatOptions, LlmProvider, Message};
use crate::services::extract;
use crate::services::resolver::{Resolver, ResolverChain};
use crate::services::temporal::{self, ResolvedTime};

/// Scores above this mean the email is about scheduling.
pub const INTENT_THRESHOLD: f64 = 0.4;

const DATE_REFERENCE_BONUS: f64 = 0.2;
const QUESTION_BONUS: f64 = 0.3;

pub const MIN_DURATION_MINUTES: u32 = 15;
pub const MAX_DURATION_MINUTES: u32 = 480;
const DEFAULT_DURATION_MINUTES: u32 = 30;
const MAX_ACTION_ITEMS: usize = 5;

/// Indicator phrases (any alternative counts once) and their weights.
const INDICATORS: &[(&[&str], f64)] = &[
    (&["schedule"], 0.3),
    (&["meeting"], 0.25),
    (&["appointment"], 0.3),
    (&["call"], 0.15),
    (&["availability"], 0.25),
    (&["calendar"], 0.2),
    (&["book"], 0.15),
    (&["reschedule"], 0.3),
    (&["catch up", "catch-up", "sync"], 0.2),
    (&["discussion"], 0.15),
    (&["interview"], 0.25),
];

const URGENCY_WORDS: &[&str] = &["urgent", "asap", "immediately", "emergency"];

const SYSTEM_PROMPT: &str = r#"You analyze emails for meeting scheduling intent.

Return ONLY a JSON object with this structure:
{
  "hasSchedulingIntent": true,
  "confidence": 0.0,
  "details": {
    "proposedTimes": ["time phrases exactly as written in the email"],
    "meetingTopic": "short topic",
    "participants": ["email addresses"],
    "urgency": "low|medium|high",
    "meetingType": "one-on-one|team-meeting|interview|casual|formal",
    "estimatedDuration": 30,
    "actionItems": ["things the recipient is asked to do"],
    "responseRequired": true
  }
}

Set "details" to null when the email does not propose or discuss a meeting. estimatedDuration is in minutes.
"#;

static RE_SCHEDULING_QUESTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \bwhen\s+(?:are|would|will)\s+you\s+(?:be\s+)?(?:free|available)
      | \bdoes\s+.{1,40}?\s+work\s+for\s+you
      | \bwould\s+.{1,40}?\s+work\s+(?:for\s+you|better)
      | \bare\s+you\s+(?:free|available)
      | \b(?:can|could|shall)\s+we\s+(?:meet|schedule|set\s+up|find\s+a\s+time|hop\s+on|talk|chat|reschedule)
      | \bwhat\s+time\s+works
      | \blet\s+me\s+know\s+(?:when|what\s+time|your\s+availability)
      | \bis\s+.{1,30}?\s+(?:ok|okay|good)\s+for\s+you",
    )
    .unwrap()
});

static RE_SUBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*subject:\s*(?:(?:re|fwd?):\s*)*(.+?)\s*$").unwrap());

static RE_ACTION_ITEM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:please|could\s+you|can\s+you|need\s+to|make\s+sure|action\s+item|don't\s+forget|remember\s+to)\b",
    )
    .unwrap()
});

static RE_SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").unwrap());

#[derive(Debug, Clone)]
pub struct EmailInput {
    pub text: String,
    pub now: DateTime<FixedOffset>,
}

impl EmailInput {
    pub fn new(text: impl Into<String>, now: DateTime<FixedOffset>) -> Self {
        Self {
            text: text.into(),
            now,
        }
    }
}

pub struct EmailAnalyzer {
    chain: ResolverChain<EmailInput, SchedulingAnalysis>,
}

impl EmailAnalyzer {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        let primary = llm.map(|llm| {
            Arc::new(OracleEmailResolver { llm })
                as Arc<dyn Resolver<Input = EmailInput, Output = SchedulingAnalysis>>
        });
        Self {
            chain: ResolverChain::new(primary, analyze_with_rules, timeout),
        }
    }

    pub fn rules_only() -> Self {
        Self {
            chain: ResolverChain::rules_only(analyze_with_rules),
        }
    }

    pub async fn analyze(&self, input: &EmailInput) -> SchedulingAnalysis {
        let analysis = self.chain.resolve(input).await;
        tracing::debug!(
            has_scheduling_intent = analysis.has_scheduling_intent,
            confidence = analysis.confidence,
            "analyzed email"
        );
        analysis
    }
}

/// Weighted keyword score in `[0, 1]`.
pub fn keyword_score(text: &str) -> f64 {
    let lower = text.to_lowercase();

    let mut score: f64 = INDICATORS
        .iter()
        .filter(|(phrases, _)| phrases.iter().any(|p| lower.contains(p)))
        .map(|(_, weight)| weight)
        .sum();

    if temporal::contains_time_reference(text) {
        score += DATE_REFERENCE_BONUS;
    }
    if RE_SCHEDULING_QUESTION.is_match(text) {
        score += QUESTION_BONUS;
    }

    score.min(1.0)
}

/// Rules can raise urgency to high but never detect low urgency.
pub fn detect_urgency(text: &str) -> Urgency {
    let lower = text.to_lowercase();
    if URGENCY_WORDS.iter().any(|w| lower.contains(w)) {
        Urgency::High
    } else {
        Urgency::Medium
    }
}

fn detect_meeting_type(text: &str) -> MeetingType {
    let lower = text.to_lowercase();
    let has = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if has(&["interview", "candidate"]) {
        MeetingType::Interview
    } else if has(&["1:1", "one-on-one", "one on one", "1-on-1"]) {
        MeetingType::OneOnOne
    } else if has(&["team", "standup", "stand-up", "all hands", "all-hands"]) {
        MeetingType::TeamMeeting
    } else if has(&["coffee", "lunch", "drinks", "catch up", "catch-up"]) {
        MeetingType::Casual
    } else {
        MeetingType::Formal
    }
}

fn detect_topic(text: &str) -> String {
    RE_SUBJECT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|s| !s.is_empty())
        .or_else(|| extract::extract_title(text))
        .unwrap_or_else(|| "Meeting".to_string())
}

fn detect_action_items(text: &str) -> Vec<String> {
    RE_SENTENCE_END
        .split(text)
        .map(str::trim)
        .filter(|s| RE_ACTION_ITEM.is_match(s))
        .take(MAX_ACTION_ITEMS)
        .map(str::to_string)
        .collect()
}

/// Deterministic analysis; always available.
pub fn analyze_with_rules(input: &EmailInput) -> SchedulingAnalysis {
    let text = input.text.as_str();
    let confidence = keyword_score(text);

    if confidence <= INTENT_THRESHOLD {
        return SchedulingAnalysis::none(confidence);
    }

    let details = SchedulingDetails {
        proposed_times: temporal::resolve(text, &input.now)
            .into_iter()
            .map(|r| r.original_phrase)
            .collect(),
        meeting_topic: detect_topic(text),
        participants: extract::extract_emails(text).unwrap_or_default(),
        urgency: detect_urgency(text),
        meeting_type: detect_meeting_type(text),
        estimated_duration: extract::extract_duration(text)
            .unwrap_or(DEFAULT_DURATION_MINUTES)
            .clamp(MIN_DURATION_MINUTES, MAX_DURATION_MINUTES),
        action_items: detect_action_items(text),
        response_required: text.contains('?') || RE_SCHEDULING_QUESTION.is_match(text),
    };

    SchedulingAnalysis::scheduling(confidence, details)
}

/// Resolves each proposed-time phrase against `now`, skipping phrases that
/// no longer resolve.
pub fn resolve_proposed_times(
    details: &SchedulingDetails,
    now: &DateTime<FixedOffset>,
) -> Vec<ResolvedTime> {
    details
        .proposed_times
        .iter()
        .filter_map(|phrase| temporal::resolve(phrase, now).into_iter().next())
        .collect()
}

struct OracleEmailResolver {
    llm: Arc<dyn LlmProvider>,
}

#[async_trait]
impl Resolver for OracleEmailResolver {
    type Input = EmailInput;
    type Output = SchedulingAnalysis;

    fn name(&self) -> &'static str {
        "llm-email"
    }

    async fn resolve(&self, input: &EmailInput) -> anyhow::Result<SchedulingAnalysis> {
        let system = format!(
            "{SYSTEM_PROMPT}\nCurrent date and time: {}.",
            input.now.to_rfc3339()
        );
        let messages = vec![Message::user(format!("Email:\n{}", input.text))];
        let options = ChatOptions {
            temperature: 0.3,
            max_tokens: 1000,
        };

        let response = self.llm.chat(&system, &messages, options).await?;
        let value = extract_json_object(&response)?;
        Ok(sanitize_analysis(&value))
    }
}

fn bool_field(value: &Value, key: &str) -> Option<bool> {
    match value.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Field-by-field cleanup of the model's analysis. Every field gets a
/// default or a clamp; nothing here fails.
fn sanitize_analysis(value: &Value) -> SchedulingAnalysis {
    let has_intent = bool_field(value, "hasSchedulingIntent").unwrap_or(false);
    let confidence = number_field(value, "confidence").unwrap_or(0.5);

    if !has_intent {
        return SchedulingAnalysis::none(confidence);
    }

    let empty = Value::Object(Default::default());
    let raw = value.get("details").filter(|v| v.is_object()).unwrap_or(&empty);

    let estimated_duration = number_field(raw, "estimatedDuration")
        .unwrap_or(f64::from(DEFAULT_DURATION_MINUTES))
        .clamp(f64::from(MIN_DURATION_MINUTES), f64::from(MAX_DURATION_MINUTES))
        .round() as u32;

    let details = SchedulingDetails {
        proposed_times: string_list(raw, "proposedTimes"),
        meeting_topic: str_field(raw, "meetingTopic").unwrap_or_else(|| "Meeting".to_string()),
        participants: string_list(raw, "participants"),
        urgency: str_field(raw, "urgency")
            .and_then(|s| Urgency::parse(&s))
            .unwrap_or(Urgency::Medium),
        meeting_type: str_field(raw, "meetingType")
            .and_then(|s| MeetingType::parse(&s))
            .unwrap_or(MeetingType::Formal),
        estimated_duration,
        action_items: string_list(raw, "actionItems"),
        response_required: bool_field(raw, "responseRequired").unwrap_or(false),
    };

    SchedulingAnalysis::scheduling(confidence, details)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Monday 2026-10-19, 08:15 at UTC-04:00.
    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-19T08:15:00-04:00").unwrap()
    }

    struct FixedReply(String);

    #[async_trait]
    impl LlmProvider for FixedReply {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _options: ChatOptions,
        ) -> anyhow::Result<String> {
            Ok(self.0.clone())
        }
    }

    struct Unreachable;

    #[async_trait]
    impl LlmProvider for Unreachable {
        async fn chat(
            &self,
            _system_prompt: &str,
            _messages: &[Message],
            _options: ChatOptions,
        ) -> anyhow::Result<String> {
            anyhow::bail!("401 unauthorized")
        }
    }

    fn analyzer_replying(reply: &str) -> EmailAnalyzer {
        EmailAnalyzer::new(
            Some(Arc::new(FixedReply(reply.to_string()))),
            Duration::from_secs(5),
        )
    }

    fn assert_details_invariant(analysis: &SchedulingAnalysis) {
        assert_eq!(analysis.details.is_some(), analysis.has_scheduling_intent);
        assert!((0.0..=1.0).contains(&analysis.confidence));
        if let Some(details) = &analysis.details {
            assert!((MIN_DURATION_MINUTES..=MAX_DURATION_MINUTES).contains(&details.estimated_duration));
        }
    }

    #[tokio::test]
    async fn test_weekly_sync_question() {
        let analyzer = EmailAnalyzer::rules_only();
        let analysis = analyzer
            .analyze(&EmailInput::new(
                "Can we schedule our weekly sync for this Friday at 10am?",
                now(),
            ))
            .await;

        assert!(analysis.has_scheduling_intent);
        assert!(analysis.confidence > INTENT_THRESHOLD);
        let details = analysis.details.as_ref().unwrap();
        assert_eq!(details.urgency, Urgency::Medium);
        assert_eq!(details.proposed_times, vec!["this Friday at 10am"]);
        assert!(details.response_required);
        assert_details_invariant(&analysis);
    }

    #[test]
    fn test_no_scheduling_intent() {
        let analysis = analyze_with_rules(&EmailInput::new(
            "Thanks for the notes, the report looks great.",
            now(),
        ));
        assert!(!analysis.has_scheduling_intent);
        assert!(analysis.details.is_none());
        assert!(analysis.confidence <= INTENT_THRESHOLD);
    }

    #[test]
    fn test_score_is_capped() {
        let text = "Urgent: schedule a meeting or call to reschedule the interview appointment, \
                    check my calendar availability and book a sync discussion. When are you free tomorrow?";
        assert_eq!(keyword_score(text), 1.0);
    }

    #[test]
    fn test_single_weak_keyword_is_not_enough() {
        assert!(keyword_score("I'll call you back") <= INTENT_THRESHOLD);
    }

    #[test]
    fn test_urgency_never_low() {
        assert_eq!(detect_urgency("Need this ASAP"), Urgency::High);
        assert_eq!(detect_urgency("whenever is fine, no rush"), Urgency::Medium);
    }

    #[test]
    fn test_rule_details() {
        let text = "Subject: Re: Candidate interview\n\
                    Hi, could we schedule a 45 minute interview with dana@example.com on Thursday at 3pm? \
                    Please send the job description beforehand.";
        let analysis = analyze_with_rules(&EmailInput::new(text, now()));
        let details = analysis.details.unwrap();

        assert_eq!(details.meeting_topic, "Candidate interview");
        assert_eq!(details.meeting_type, MeetingType::Interview);
        assert_eq!(details.participants, vec!["dana@example.com"]);
        assert_eq!(details.estimated_duration, 45);
        assert_eq!(details.proposed_times, vec!["Thursday at 3pm"]);
        assert_eq!(
            details.action_items,
            vec!["Please send the job description beforehand"]
        );
    }

    #[test]
    fn test_rule_duration_is_clamped() {
        let text = "Can we schedule a 10 hour meeting offsite?";
        let details = analyze_with_rules(&EmailInput::new(text, now())).details.unwrap();
        assert_eq!(details.estimated_duration, MAX_DURATION_MINUTES);

        let text = "Can we schedule a 5 minute meeting?";
        let details = analyze_with_rules(&EmailInput::new(text, now())).details.unwrap();
        assert_eq!(details.estimated_duration, MIN_DURATION_MINUTES);
    }

    #[tokio::test]
    async fn test_oracle_output_is_sanitized() {
        let analyzer = analyzer_replying(
            r#"Here you go: {"hasSchedulingIntent": true, "confidence": 1.4, "details": {
                "proposedTimes": ["Tuesday 2pm", 5],
                "meetingTopic": "",
                "participants": "bob@example.com",
                "urgency": "critical",
                "meetingType": "team_meeting",
                "estimatedDuration": 900,
                "responseRequired": "true"
            }} Hope that helps!"#,
        );
        let analysis = analyzer.analyze(&EmailInput::new("anything", now())).await;

        assert!(analysis.has_scheduling_intent);
        assert_eq!(analysis.confidence, 1.0);
        let details = analysis.details.as_ref().unwrap();
        assert_eq!(details.proposed_times, vec!["Tuesday 2pm"]);
        assert_eq!(details.meeting_topic, "Meeting");
        assert!(details.participants.is_empty());
        assert_eq!(details.urgency, Urgency::Medium);
        assert_eq!(details.meeting_type, MeetingType::TeamMeeting);
        assert_eq!(details.estimated_duration, 480);
        assert!(details.action_items.is_empty());
        assert!(details.response_required);
        assert_details_invariant(&analysis);
    }

    #[tokio::test]
    async fn test_oracle_negative_drops_details() {
        let analyzer = analyzer_replying(
            r#"{"hasSchedulingIntent": false, "confidence": -3, "details": {"meetingTopic": "x"}}"#,
        );
        let analysis = analyzer.analyze(&EmailInput::new("anything", now())).await;
        assert!(!analysis.has_scheduling_intent);
        assert!(analysis.details.is_none());
        assert_eq!(analysis.confidence, 0.0);
    }

    #[tokio::test]
    async fn test_oracle_missing_details_get_defaults() {
        let analyzer = analyzer_replying(r#"{"hasSchedulingIntent": true, "details": null}"#);
        let analysis = analyzer.analyze(&EmailInput::new("anything", now())).await;
        assert_eq!(analysis.confidence, 0.5);
        let details = analysis.details.as_ref().unwrap();
        assert_eq!(details.estimated_duration, DEFAULT_DURATION_MINUTES);
        assert_eq!(details.meeting_type, MeetingType::Formal);
        assert_details_invariant(&analysis);
    }

    #[tokio::test]
    async fn test_oracle_garbage_falls_back_to_rules() {
        let analyzer = analyzer_replying("Sorry, I can't help with that.");
        let text = "Are you free for a call on Monday at 4pm?";
        let analysis = analyzer.analyze(&EmailInput::new(text, now())).await;
        assert_eq!(analysis, analyze_with_rules(&EmailInput::new(text, now())));
        assert!(analysis.has_scheduling_intent);
    }

    #[tokio::test]
    async fn test_oracle_error_falls_back_to_rules() {
        let analyzer = EmailAnalyzer::new(Some(Arc::new(Unreachable)), Duration::from_secs(5));
        let analysis = analyzer
            .analyze(&EmailInput::new("Lunch menu attached.", now()))
            .await;
        assert!(!analysis.has_scheduling_intent);
    }

    #[test]
    fn test_resolve_proposed_times() {
        let details = SchedulingDetails {
            proposed_times: vec!["tomorrow at 2pm".to_string(), "sometime".to_string()],
            meeting_topic: "Planning".to_string(),
            participants: vec![],
            urgency: Urgency::Medium,
            meeting_type: MeetingType::Formal,
            estimated_duration: 30,
            action_items: vec![],
            response_required: false,
        };
        let resolved = resolve_proposed_times(&details, &now());
        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].original_phrase, "tomorrow at 2pm");
        assert_eq!(
            resolved[0].resolved_instant,
            DateTime::parse_from_rfc3339("2026-10-20T14:00:00-04:00").unwrap()
        );
    }
}
