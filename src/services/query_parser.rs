use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

use crate::models::{ConversationContext, EntitySet, Intent, ParsedQuery};
use crate::services::ai::json::{extract_json_object, number_field, str_field, string_list};
use crate::services::ai::{ChatOptions, LlmProvider, Message};
use crate::services::extract;
use crate::services::resolver::{Resolver, ResolverChain};
use crate::services::temporal;

/// Confidence reported by the keyword rules, below anything the model path
/// normally reports.
pub const FALLBACK_CONFIDENCE: f64 = 0.6;

const DEFAULT_ORACLE_CONFIDENCE: f64 = 0.8;

const SYSTEM_PROMPT: &str = r#"You are the intent extraction engine of a calendar assistant. Classify the user's request and extract scheduling entities.

Return ONLY valid JSON (no markdown, no explanation) with this exact structure:
{
  "intent": "schedule|query|update|cancel|availability|email-query|email-search",
  "entities": {
    "dateTime": "ISO-8601 date-time with offset, or null",
    "duration": 60,
    "title": "event title or null",
    "currentTitle": "existing title when renaming, or null",
    "newTitle": "new title when renaming, or null",
    "attendees": ["email addresses"],
    "location": "place or null",
    "description": "extra details or null"
  },
  "confidence": 0.9
}

Intent rules:
- "schedule": create a new event
- "query": ask what is on the calendar
- "update": change, move or rename an existing event
- "cancel": delete an existing event
- "availability": ask when someone is free or busy
- "email-query": read or summarize emails
- "email-search": find specific emails by sender, subject or topic

Duration is in minutes. Resolve relative dates against the current date given below.
"#;

static RE_EMAIL_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:e-?mails?|inbox|mail|gmail)\b").unwrap());
static RE_EMAIL_SEARCH_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:search|find|from|about)\b").unwrap());
static RE_SCHEDULE_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:schedule|book|create|set\s+up|arrange)\b").unwrap());
static RE_CANCEL_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:cancel|delete|remove)\b").unwrap());
static RE_UPDATE_WORDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:update|modify|change|reschedule|rename|move)\b").unwrap()
});
static RE_AVAILABILITY_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:free|available|availability|busy)\b").unwrap());

/// One utterance plus everything needed to interpret it.
#[derive(Debug, Clone)]
pub struct QueryInput {
    pub text: String,
    pub context: Option<ConversationContext>,
    pub now: DateTime<FixedOffset>,
}

impl QueryInput {
    pub fn new(text: impl Into<String>, now: DateTime<FixedOffset>) -> Self {
        Self {
            text: text.into(),
            context: None,
            now,
        }
    }

    pub fn with_context(mut self, context: ConversationContext) -> Self {
        self.context = Some(context);
        self
    }
}

pub struct QueryParser {
    chain: ResolverChain<QueryInput, ParsedQuery>,
}

impl QueryParser {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, timeout: Duration) -> Self {
        let primary = llm.map(|llm| {
            Arc::new(OracleQueryResolver { llm }) as Arc<dyn Resolver<Input = QueryInput, Output = ParsedQuery>>
        });
        Self {
            chain: ResolverChain::new(primary, parse_with_rules, timeout),
        }
    }

    pub fn rules_only() -> Self {
        Self {
            chain: ResolverChain::rules_only(parse_with_rules),
        }
    }

    pub async fn parse(&self, input: &QueryInput) -> ParsedQuery {
        let mut parsed = self.chain.resolve(input).await;

        // Both paths: a missing date-time is backfilled from the text.
        if parsed.entities.date_time.is_none() {
            parsed.entities.date_time = temporal::resolve_first(&input.text, &input.now);
        }

        tracing::debug!(
            intent = parsed.intent.as_str(),
            confidence = parsed.confidence,
            "parsed query"
        );
        parsed
    }
}

/// Fixed-priority keyword classification. Email addresses are removed first
/// so an attendee's domain cannot look like an email request.
pub fn classify_intent(text: &str) -> Intent {
    let text = extract::strip_emails(text);

    if RE_EMAIL_WORDS.is_match(&text) {
        if RE_EMAIL_SEARCH_WORDS.is_match(&text) {
            return Intent::EmailSearch;
        }
        return Intent::EmailQuery;
    }
    if RE_SCHEDULE_WORDS.is_match(&text) {
        return Intent::Schedule;
    }
    if RE_CANCEL_WORDS.is_match(&text) {
        return Intent::Cancel;
    }
    if RE_UPDATE_WORDS.is_match(&text) {
        return Intent::Update;
    }
    if RE_AVAILABILITY_WORDS.is_match(&text) {
        return Intent::Availability;
    }
    Intent::Query
}

/// Deterministic interpretation; always available.
pub fn parse_with_rules(input: &QueryInput) -> ParsedQuery {
    let text = input.text.as_str();
    let mut intent = classify_intent(text);

    // A keyword-less follow-up ("at 3pm then") continues the previous request.
    if intent == Intent::Query {
        if let Some(prior) = input.context.as_ref().and_then(|c| c.intent) {
            intent = prior;
        }
    }

    let mut entities = EntitySet {
        date_time: temporal::resolve_first(text, &input.now),
        duration: extract::extract_duration(text),
        title: extract::extract_title(text),
        attendees: extract::extract_emails(text),
        ..Default::default()
    };

    if intent == Intent::Update {
        if let Some(pair) = extract::extract_rename_pair(text) {
            entities.current_title = Some(pair.current_title);
            entities.new_title = Some(pair.new_title);
            // The rename pattern also matches the title heuristics; the pair wins.
            entities.title = None;
        }
    }

    if let Some(context) = &input.context {
        entities = entities.merged_over(&context.entities);
    }

    ParsedQuery {
        intent,
        entities,
        confidence: FALLBACK_CONFIDENCE,
    }
}

struct OracleQueryResolver {
    llm: Arc<dyn LlmProvider>,
}

#[async_trait]
impl Resolver for OracleQueryResolver {
    type Input = QueryInput;
    type Output = ParsedQuery;

    fn name(&self) -> &'static str {
        "llm-query"
    }

    async fn resolve(&self, input: &QueryInput) -> anyhow::Result<ParsedQuery> {
        let system = build_system_prompt(input);
        let messages = vec![Message::user(input.text.clone())];
        let options = ChatOptions {
            temperature: 0.1,
            max_tokens: 500,
        };

        let response = self.llm.chat(&system, &messages, options).await?;
        let value = extract_json_object(&response)?;
        sanitize_oracle_query(&value, &input.now)
    }
}

fn build_system_prompt(input: &QueryInput) -> String {
    let mut prompt = format!(
        "{SYSTEM_PROMPT}\nCurrent date and time: {} ({}).",
        input.now.to_rfc3339(),
        input.now.format("%A"),
    );

    if let Some(context) = &input.context {
        let entities = serde_json::to_string(&context.entities).unwrap_or_default();
        prompt.push_str(&format!(
            "\n\nThis message continues an earlier request. Merge the new details into it instead of starting over.\nEarlier request: {}\nEarlier intent: {}\nEarlier entities: {}",
            context.original_query,
            context.intent.map(|i| i.as_str()).unwrap_or("unknown"),
            entities,
        ));
        if !context.missing_fields.is_empty() {
            prompt.push_str(&format!(
                "\nThe user was asked for: {}",
                context.missing_fields.join(", ")
            ));
        }
    }

    prompt
}

/// Turns the model's JSON into a [`ParsedQuery`]. An unusable intent is an
/// error so the caller falls back to the rules; other fields are dropped
/// individually when malformed.
fn sanitize_oracle_query(value: &Value, now: &DateTime<FixedOffset>) -> anyhow::Result<ParsedQuery> {
    let intent = str_field(value, "intent")
        .and_then(|s| Intent::parse(&s))
        .ok_or_else(|| anyhow::anyhow!("model returned no usable intent"))?;

    let empty = Value::Object(Default::default());
    let raw = value.get("entities").filter(|v| v.is_object()).unwrap_or(&empty);

    let attendees: Vec<String> = string_list(raw, "attendees")
        .into_iter()
        .filter(|a| a.contains('@'))
        .collect();

    let entities = EntitySet {
        date_time: str_field(raw, "dateTime").and_then(|s| parse_model_datetime(&s, now)),
        duration: number_field(raw, "duration")
            .filter(|d| *d >= 1.0 && *d <= 1440.0)
            .map(|d| d.round() as u32),
        title: str_field(raw, "title"),
        current_title: str_field(raw, "currentTitle"),
        new_title: str_field(raw, "newTitle"),
        attendees: (!attendees.is_empty()).then_some(attendees),
        location: str_field(raw, "location"),
        description: str_field(raw, "description"),
    };

    let confidence = number_field(value, "confidence")
        .unwrap_or(DEFAULT_ORACLE_CONFIDENCE)
        .clamp(0.0, 1.0);

    Ok(ParsedQuery {
        intent,
        entities,
        confidence,
    })
}

fn parse_model_datetime(s: &str, now: &DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| naive.and_local_timezone(*now.offset()).single())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    // Monday 2026-10-19, 08:15 at UTC-04:00.
    fn now() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2026-10-19T08:15:00-04:00").unwrap()
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    struct ScriptedLlm {
        reply: anyhow::Result<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Ok(reply.to_string()),
                prompts: Mutex::new(vec![]),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: Err(anyhow::anyhow!("connection refused")),
                prompts: Mutex::new(vec![]),
            })
        }
    }

    #[async_trait]
    impl LlmProvider for ScriptedLlm {
        async fn chat(
            &self,
            system_prompt: &str,
            _messages: &[Message],
            _options: ChatOptions,
        ) -> anyhow::Result<String> {
            self.prompts.lock().unwrap().push(system_prompt.to_string());
            match &self.reply {
                Ok(reply) => Ok(reply.clone()),
                Err(e) => Err(anyhow::anyhow!("{e}")),
            }
        }
    }

    fn parser_with(llm: Arc<ScriptedLlm>) -> QueryParser {
        QueryParser::new(Some(llm), Duration::from_secs(5))
    }

    #[test]
    fn test_classify_priority() {
        assert_eq!(classify_intent("find emails from Sarah about the budget"), Intent::EmailSearch);
        assert_eq!(classify_intent("summarize my inbox"), Intent::EmailQuery);
        assert_eq!(classify_intent("email me when you book it"), Intent::EmailQuery);
        assert_eq!(classify_intent("Book a room for Friday"), Intent::Schedule);
        assert_eq!(classify_intent("cancel the standup"), Intent::Cancel);
        assert_eq!(classify_intent("move my 1:1 to Thursday"), Intent::Update);
        assert_eq!(classify_intent("am I free tomorrow?"), Intent::Availability);
        assert_eq!(classify_intent("what's on my calendar today"), Intent::Query);
    }

    #[test]
    fn test_attendee_domain_is_not_an_email_request() {
        assert_eq!(
            classify_intent("schedule lunch with jane@gmail.com"),
            Intent::Schedule
        );
    }

    #[tokio::test]
    async fn test_schedule_with_attendee_and_duration() {
        let parser = QueryParser::rules_only();
        let input = QueryInput::new(
            "Schedule a meeting with john@example.com tomorrow at 2pm for 1 hour",
            now(),
        );
        let parsed = parser.parse(&input).await;

        assert_eq!(parsed.intent, Intent::Schedule);
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
        assert_eq!(
            parsed.entities.attendees,
            Some(vec!["john@example.com".to_string()])
        );
        assert_eq!(parsed.entities.duration, Some(60));
        assert_eq!(parsed.entities.date_time, Some(at("2026-10-20T14:00:00-04:00")));
    }

    #[tokio::test]
    async fn test_rename_pair_for_update() {
        let parser = QueryParser::rules_only();
        let parsed = parser
            .parse(&QueryInput::new("Change test meeting to Project Review", now()))
            .await;

        assert_eq!(parsed.intent, Intent::Update);
        assert_eq!(parsed.entities.current_title.as_deref(), Some("test meeting"));
        assert_eq!(parsed.entities.new_title.as_deref(), Some("Project Review"));
        assert_eq!(parsed.entities.date_time, None);
    }

    #[tokio::test]
    async fn test_rename_pair_ignored_outside_update() {
        let parser = QueryParser::rules_only();
        let parsed = parser
            .parse(&QueryInput::new("Schedule a switch from plan A to plan B", now()))
            .await;
        assert_eq!(parsed.intent, Intent::Schedule);
        assert_eq!(parsed.entities.new_title, None);
    }

    #[tokio::test]
    async fn test_follow_up_merges_context() {
        let parser = QueryParser::rules_only();
        let context = ConversationContext {
            original_query: "Schedule a design review with ana@example.com".to_string(),
            intent: Some(Intent::Schedule),
            entities: EntitySet {
                title: Some("design review".to_string()),
                attendees: Some(vec!["ana@example.com".to_string()]),
                ..Default::default()
            },
            missing_fields: vec!["dateTime".to_string()],
        };
        let input = QueryInput::new("Thursday at 3pm", now()).with_context(context);
        let parsed = parser.parse(&input).await;

        assert_eq!(parsed.intent, Intent::Schedule);
        assert_eq!(parsed.entities.title.as_deref(), Some("design review"));
        assert_eq!(parsed.entities.date_time, Some(at("2026-10-22T15:00:00-04:00")));
        assert_eq!(
            parsed.entities.attendees,
            Some(vec!["ana@example.com".to_string()])
        );
    }

    #[tokio::test]
    async fn test_unintelligible_input_still_parses() {
        let parser = QueryParser::rules_only();
        let parsed = parser.parse(&QueryInput::new("asdf qwerty", now())).await;
        assert_eq!(parsed.intent, Intent::Query);
        assert_eq!(parsed.entities, EntitySet::default());
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_oracle_fenced_json() {
        let llm = ScriptedLlm::replying(
            "```json\n{\"intent\":\"cancel\",\"entities\":{\"title\":\"Standup\",\"attendees\":[\"not-an-email\"]},\"confidence\":0.95}\n```",
        );
        let parsed = parser_with(llm).parse(&QueryInput::new("drop standup", now())).await;

        assert_eq!(parsed.intent, Intent::Cancel);
        assert_eq!(parsed.entities.title.as_deref(), Some("Standup"));
        assert_eq!(parsed.entities.attendees, None);
        assert_eq!(parsed.confidence, 0.95);
    }

    #[tokio::test]
    async fn test_oracle_result_is_backfilled_with_date() {
        let llm = ScriptedLlm::replying(r#"{"intent":"schedule","entities":{"dateTime":null},"confidence":7}"#);
        let parsed = parser_with(llm)
            .parse(&QueryInput::new("lunch with Sam tomorrow at noon", now()))
            .await;

        assert_eq!(parsed.intent, Intent::Schedule);
        assert_eq!(parsed.confidence, 1.0);
        assert_eq!(parsed.entities.date_time, Some(at("2026-10-20T12:00:00-04:00")));
    }

    #[tokio::test]
    async fn test_oracle_datetime_without_offset_uses_reference_offset() {
        let llm = ScriptedLlm::replying(
            r#"{"intent":"schedule","entities":{"dateTime":"2026-10-21T10:30:00","duration":"45"}}"#,
        );
        let parsed = parser_with(llm).parse(&QueryInput::new("x", now())).await;
        assert_eq!(parsed.entities.date_time, Some(at("2026-10-21T10:30:00-04:00")));
        assert_eq!(parsed.entities.duration, Some(45));
        assert_eq!(parsed.confidence, DEFAULT_ORACLE_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_oracle_unknown_intent_falls_back() {
        let llm = ScriptedLlm::replying(r#"{"intent":"book","entities":{}}"#);
        let parsed = parser_with(llm)
            .parse(&QueryInput::new("cancel my dentist appointment", now()))
            .await;
        assert_eq!(parsed.intent, Intent::Cancel);
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_oracle_prose_falls_back() {
        let llm = ScriptedLlm::replying("I'm not sure what you mean.");
        let parsed = parser_with(llm)
            .parse(&QueryInput::new("am I busy on Friday?", now()))
            .await;
        assert_eq!(parsed.intent, Intent::Availability);
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_oracle_error_falls_back() {
        let parsed = parser_with(ScriptedLlm::failing())
            .parse(&QueryInput::new("show unread emails", now()))
            .await;
        assert_eq!(parsed.intent, Intent::EmailQuery);
        assert_eq!(parsed.confidence, FALLBACK_CONFIDENCE);
    }

    #[tokio::test]
    async fn test_prompt_carries_context() {
        let llm = ScriptedLlm::replying(r#"{"intent":"schedule","entities":{}}"#);
        let parser = parser_with(llm.clone());
        let context = ConversationContext {
            original_query: "Set up a call with Priya".to_string(),
            intent: Some(Intent::Schedule),
            entities: EntitySet::default(),
            missing_fields: vec!["dateTime".to_string(), "duration".to_string()],
        };
        parser
            .parse(&QueryInput::new("Friday at 10", now()).with_context(context))
            .await;

        let prompts = llm.prompts.lock().unwrap();
        assert!(prompts[0].contains("2026-10-19T08:15:00-04:00"));
        assert!(prompts[0].contains("Earlier request: Set up a call with Priya"));
        assert!(prompts[0].contains("The user was asked for: dateTime, duration"));
    }
}
