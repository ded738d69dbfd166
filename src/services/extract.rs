//! Regex extraction of durations, email addresses and meeting titles from
//! free text. Every extractor returns `None` on no match.

use std::sync::LazyLock;

use regex::Regex;

static RE_HOURS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,3})[\s-]*(?:hours?|hrs?)\b").unwrap());

static RE_MINUTES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,4})[\s-]*(?:minutes?|mins?)\b").unwrap());

static RE_EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").unwrap()
});

// Single quotes only count when they stand apart from words, so possessives
// like "Bob's" never open a quote.
static RE_QUOTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""([^"]+)"|(?:^|\W)'([^']+)'(?:\W|$)|“([^”]+)”"#).unwrap()
});

static RE_MEETING_ABOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\bmeeting\s+(?:about|for|with|on)\s+(.+?)(?:\s+(?:at|on|for|with|tomorrow|today|tonight|next|this)\b|[,!?;]|\.(?:\s|$)|$)",
    )
    .unwrap()
});

static RE_SCHEDULE_A: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bschedule\s+(?:a|an)\s+(.+?)\s+(?:at|on|for|with)\b").unwrap()
});

static RE_RENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)\b(?:change|update|rename)\s+(?:the\s+)?["']?(.+?)["']?\s+to\s+["']?(.+?)["']?\s*[.!?]*\s*$"#,
    )
    .unwrap()
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenamePair {
    pub current_title: String,
    pub new_title: String,
}

/// Minutes from "<N> hour(s)" or, failing that, "<N> minute(s)". Matches are
/// not combined: "1 hour 30 minutes" is 60.
pub fn extract_duration(text: &str) -> Option<u32> {
    if let Some(hours) = first_number(&RE_HOURS, text) {
        return hours.checked_mul(60);
    }
    first_number(&RE_MINUTES, text)
}

fn first_number(re: &Regex, text: &str) -> Option<u32> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Email addresses in order of first appearance, without duplicates.
pub fn extract_emails(text: &str) -> Option<Vec<String>> {
    let mut emails: Vec<String> = Vec::new();
    for m in RE_EMAIL.find_iter(text) {
        let email = m.as_str().to_string();
        if !emails.contains(&email) {
            emails.push(email);
        }
    }
    (!emails.is_empty()).then_some(emails)
}

/// Text with every email address blanked out, for keyword matching that
/// must not see domains like `gmail.com`.
pub fn strip_emails(text: &str) -> String {
    RE_EMAIL.replace_all(text, " ").into_owned()
}

/// First successful of: a quoted substring, "meeting about/for/with/on X",
/// "schedule a X at/on/for/with".
pub fn extract_title(text: &str) -> Option<String> {
    if let Some(caps) = RE_QUOTED.captures(text) {
        let quoted = caps.iter().skip(1).flatten().next().map(|m| m.as_str());
        if let Some(title) = quoted.and_then(clean_title) {
            return Some(title);
        }
    }

    if let Some(title) = RE_MEETING_ABOUT
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| clean_title(m.as_str()))
        .filter(|t| !RE_EMAIL.is_match(t))
    {
        return Some(title);
    }

    RE_SCHEDULE_A
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| clean_title(m.as_str()))
}

/// "change/update/rename X to Y". Only meaningful once the intent is known
/// to be an update.
pub fn extract_rename_pair(text: &str) -> Option<RenamePair> {
    let caps = RE_RENAME.captures(text.trim())?;
    let current_title = clean_title(caps.get(1)?.as_str())?;
    let new_title = clean_title(caps.get(2)?.as_str())?;
    Some(RenamePair {
        current_title,
        new_title,
    })
}

fn clean_title(s: &str) -> Option<String> {
    let trimmed = s
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c.is_ascii_punctuation() && c != ')')
        .trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_hours_and_minutes() {
        assert_eq!(extract_duration("for 1 hour"), Some(60));
        assert_eq!(extract_duration("block 2 hours please"), Some(120));
        assert_eq!(extract_duration("a 45 minute call"), Some(45));
        assert_eq!(extract_duration("quick 15 mins"), Some(15));
        assert_eq!(extract_duration("no length given"), None);
    }

    #[test]
    fn test_duration_does_not_combine() {
        assert_eq!(extract_duration("1 hour 30 minutes"), Some(60));
    }

    #[test]
    fn test_emails_in_order() {
        let emails = extract_emails("cc bob@corp.io, then alice@example.com and bob@corp.io").unwrap();
        assert_eq!(emails, vec!["bob@corp.io", "alice@example.com"]);
        assert_eq!(extract_emails("nobody here"), None);
    }

    #[test]
    fn test_strip_emails() {
        assert!(!strip_emails("invite jane@gmail.com").contains("gmail"));
    }

    #[test]
    fn test_title_quoted_wins() {
        let title = extract_title("Schedule a meeting about budget called \"Q3 Planning\"");
        assert_eq!(title.as_deref(), Some("Q3 Planning"));
    }

    #[test]
    fn test_title_single_quoted() {
        let title = extract_title("Book 'Design Sync' for Friday");
        assert_eq!(title.as_deref(), Some("Design Sync"));
    }

    #[test]
    fn test_title_ignores_possessives() {
        assert_eq!(extract_title("Cancel Bob's standup and Sue's lunch"), None);

        let title = extract_title(
            "Schedule a meeting about Tom's launch and Ana's review tomorrow at 2pm",
        );
        assert_eq!(title.as_deref(), Some("Tom's launch and Ana's review"));
    }

    #[test]
    fn test_title_meeting_about() {
        let title = extract_title("Set up a meeting about the hiring plan tomorrow at 3pm");
        assert_eq!(title.as_deref(), Some("the hiring plan"));
    }

    #[test]
    fn test_title_schedule_a() {
        let title = extract_title("Schedule a design review on Friday");
        assert_eq!(title.as_deref(), Some("design review"));
    }

    #[test]
    fn test_title_skips_email_as_topic() {
        let title = extract_title("Schedule a meeting with john@example.com tomorrow at 2pm");
        assert_eq!(title.as_deref(), Some("meeting"));
    }

    #[test]
    fn test_title_none() {
        assert_eq!(extract_title("what's on my calendar"), None);
    }

    #[test]
    fn test_rename_pair() {
        let pair = extract_rename_pair("Change test meeting to Project Review").unwrap();
        assert_eq!(pair.current_title, "test meeting");
        assert_eq!(pair.new_title, "Project Review");
    }

    #[test]
    fn test_rename_pair_quoted() {
        let pair = extract_rename_pair("rename 'Sync' to 'Weekly Sync'.").unwrap();
        assert_eq!(pair.current_title, "Sync");
        assert_eq!(pair.new_title, "Weekly Sync");
        assert_eq!(extract_rename_pair("cancel my 3pm"), None);
    }
}
