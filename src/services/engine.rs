use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

use crate::models::{
    BusyInterval, CandidateSlot, ConversationContext, ParsedQuery, SchedulingAnalysis,
    SlotPreferences, SlotRequest,
};
use crate::services::ai::LlmProvider;
use crate::services::email_analyzer::{EmailAnalyzer, EmailInput};
use crate::services::query_parser::{QueryInput, QueryParser};
use crate::services::scheduling::{self, SchedulingError};

/// Caller-facing entry point. Holds no per-request state, so one instance
/// can serve any number of concurrent callers.
pub struct Engine {
    query_parser: QueryParser,
    email_analyzer: EmailAnalyzer,
}

impl Engine {
    pub fn new(llm: Option<Arc<dyn LlmProvider>>, oracle_timeout: Duration) -> Self {
        Self {
            query_parser: QueryParser::new(llm.clone(), oracle_timeout),
            email_analyzer: EmailAnalyzer::new(llm, oracle_timeout),
        }
    }

    pub fn rules_only() -> Self {
        Self {
            query_parser: QueryParser::rules_only(),
            email_analyzer: EmailAnalyzer::rules_only(),
        }
    }

    pub async fn parse_query(
        &self,
        text: &str,
        context: Option<ConversationContext>,
        now: DateTime<FixedOffset>,
    ) -> ParsedQuery {
        let mut input = QueryInput::new(text, now);
        if let Some(context) = context {
            input = input.with_context(context);
        }
        self.query_parser.parse(&input).await
    }

    pub async fn analyze_email(&self, text: &str, now: DateTime<FixedOffset>) -> SchedulingAnalysis {
        self.email_analyzer.analyze(&EmailInput::new(text, now)).await
    }

    pub fn recommend_slots(
        &self,
        request: &SlotRequest,
        busy: &[BusyInterval],
        preferences: Option<&SlotPreferences>,
    ) -> Result<Vec<CandidateSlot>, SchedulingError> {
        scheduling::recommend_slots(request, busy, preferences)
    }
}
