//! Resolves natural date/time phrases ("tomorrow at 2pm", "next Tuesday
//! morning", "14:00") into absolute instants relative to a reference `now`.
//!
//! Text is scanned for three token kinds: dates, clock times and day periods.
//! Adjacent tokens separated only by connectors ("at", "on", commas) are
//! grouped into one phrase, and each phrase yields one [`ResolvedTime`] in
//! the offset of `now`. Missing parts default to the reference date, or to
//! 09:00 for a date with no time.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, Weekday};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static RE_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            (?P<rel>day\s+after\s+tomorrow|today|tomorrow)
          | (?:(?P<modifier>next|this)\s+)?(?P<weekday>monday|tuesday|wednesday|thursday|friday|saturday|sunday|tues|thurs)
          | (?P<iso>\d{4}-\d{2}-\d{2})
          | (?P<month>jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sept?(?:ember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\.?\s+(?P<day>\d{1,2})(?:st|nd|rd|th)?
          | in\s+(?P<count>\d{1,3})\s+(?P<unit>days?|weeks?)
        )\b",
    )
    .unwrap()
});

static RE_CLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        \b(?:
            (?P<h12>1[0-2]|0?[1-9])(?::(?P<m12>[0-5]\d))?\s*(?P<meridiem>a\.m\.|p\.m\.|am\b|pm\b)
          | (?P<h24>[01]?\d|2[0-3]):(?P<m24>[0-5]\d)\b
          | (?P<named>noon|midnight)\b
          | (?:at|around)\s+(?P<bare>1[0-2]|0?[1-9])(?::(?P<bm>[0-5]\d))?
            (?:\s*(?P<bare_meridiem>a\.m\.|p\.m\.|am\b|pm\b)|(?:\s+(?P<oclock>o'?clock))?\b)
        )
        (?:\s+in\s+the\s+(?P<suffix>morning|afternoon|evening))?",
    )
    .unwrap()
});

// What may follow a bare "at N" for it to read as a time: the end of the
// clause, a day period or a day name. "at 4 seasons" is not a time.
static RE_BARE_HOUR_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?ix)
        ^\s*(?:
            $
          | [,.;:!?)\n]
          | (?:this\s+)?(?:morning|afternoon|evening|tonight)\b
          | (?:on\s+|this\s+|next\s+)?(?:today|tomorrow|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b
        )",
    )
    .unwrap()
});

static RE_PERIOD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:this\s+)?(?P<period>morning|afternoon|evening|tonight)\b").unwrap()
});

static RE_CONNECTOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^[\s,]*(?:(?:at|on|around|by)\s+)?[\s,]*$").unwrap());

static RE_VAGUE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:next|this|later\s+this)\s+week\b|\bend\s+of\s+(?:the\s+)?(?:day|week)\b|\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b",
    )
    .unwrap()
});

/// One interpretation of a temporal phrase found in text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTime {
    pub original_phrase: String,
    pub resolved_instant: DateTime<FixedOffset>,
    pub confidence: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Period {
    Morning,
    Afternoon,
    Evening,
    Tonight,
}

impl Period {
    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "morning" => Some(Period::Morning),
            "afternoon" => Some(Period::Afternoon),
            "evening" => Some(Period::Evening),
            "tonight" => Some(Period::Tonight),
            _ => None,
        }
    }

    fn default_time(self) -> NaiveTime {
        let hour = match self {
            Period::Morning => 9,
            Period::Afternoon => 14,
            Period::Evening => 18,
            Period::Tonight => 20,
        };
        NaiveTime::from_hms_opt(hour, 0, 0).unwrap_or(NaiveTime::MIN)
    }

    fn is_pm(self) -> bool {
        !matches!(self, Period::Morning)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Meridiem {
    Am,
    Pm,
    /// 24-hour or named time, taken as written.
    Exact,
    /// "at 3" or "3:30": AM/PM comes from context.
    Ambiguous,
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    hour: u32,
    minute: u32,
    meridiem: Meridiem,
    suffix: Option<Period>,
}

impl Clock {
    fn to_time(self, hint: Option<Period>) -> Option<NaiveTime> {
        let hour = match self.meridiem {
            Meridiem::Exact => self.hour,
            Meridiem::Am => self.hour % 12,
            Meridiem::Pm => self.hour % 12 + 12,
            Meridiem::Ambiguous => match self.suffix.or(hint) {
                Some(p) if p.is_pm() && self.hour < 12 => self.hour + 12,
                Some(_) => self.hour,
                // Without context a bare 1..=7 is read as an afternoon meeting.
                None if (1..=7).contains(&self.hour) => self.hour + 12,
                None => self.hour,
            },
        };
        NaiveTime::from_hms_opt(hour, self.minute, 0)
    }
}

#[derive(Debug, Clone, Copy)]
enum Token {
    Date(NaiveDate),
    Clock(Clock),
    Period(Period),
}

#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    token: Token,
}

#[derive(Debug, Default)]
struct Group {
    start: usize,
    end: usize,
    date: Option<NaiveDate>,
    clock: Option<Clock>,
    period: Option<Period>,
}

impl Group {
    fn from_span(span: &Span) -> Self {
        let mut group = Group {
            start: span.start,
            end: span.end,
            ..Default::default()
        };
        group.absorb(span);
        group
    }

    fn accepts(&self, span: &Span) -> bool {
        match span.token {
            Token::Date(_) => self.date.is_none(),
            Token::Clock(_) => self.clock.is_none(),
            Token::Period(_) => self.period.is_none(),
        }
    }

    fn absorb(&mut self, span: &Span) {
        match span.token {
            Token::Date(d) => self.date = Some(d),
            Token::Clock(c) => self.clock = Some(c),
            Token::Period(p) => self.period = Some(p),
        }
        self.end = span.end;
    }

    fn resolve(&self, text: &str, now: &DateTime<FixedOffset>) -> Option<ResolvedTime> {
        let date = self.date.unwrap_or_else(|| now.date_naive());
        let (time, confidence) = match (self.clock, self.period, self.date) {
            (Some(clock), _, Some(_)) => (clock.to_time(self.period)?, 0.9),
            (Some(clock), _, None) => (clock.to_time(self.period)?, 0.85),
            (None, Some(period), Some(_)) => (period.default_time(), 0.8),
            (None, Some(period), None) => (period.default_time(), 0.7),
            (None, None, Some(_)) => (NaiveTime::from_hms_opt(9, 0, 0)?, 0.7),
            (None, None, None) => return None,
        };
        let resolved_instant = date.and_time(time).and_local_timezone(*now.offset()).single()?;
        Some(ResolvedTime {
            original_phrase: text.get(self.start..self.end)?.to_string(),
            resolved_instant,
            confidence,
        })
    }
}

/// Every temporal phrase in `text`, ordered by position. Empty when nothing
/// is recognised.
pub fn resolve(text: &str, now: &DateTime<FixedOffset>) -> Vec<ResolvedTime> {
    let spans = scan(text, now.date_naive());

    let mut groups: Vec<Group> = Vec::new();
    for span in &spans {
        if let Some(group) = groups.last_mut() {
            let gap = text.get(group.end..span.start).unwrap_or("");
            if group.accepts(span) && RE_CONNECTOR.is_match(gap) {
                group.absorb(span);
                continue;
            }
        }
        groups.push(Group::from_span(span));
    }

    groups.iter().filter_map(|g| g.resolve(text, now)).collect()
}

/// The first resolvable instant in `text`, if any.
pub fn resolve_first(text: &str, now: &DateTime<FixedOffset>) -> Option<DateTime<FixedOffset>> {
    resolve(text, now).into_iter().next().map(|r| r.resolved_instant)
}

/// Whether `text` mentions a date or time at all, including references too
/// vague to resolve ("next week", "10/21").
pub fn contains_time_reference(text: &str) -> bool {
    // Any fixed day works here; only whether something resolves matters.
    RE_VAGUE_REFERENCE.is_match(text) || !scan(text, NaiveDate::default()).is_empty()
}

fn scan(text: &str, today: NaiveDate) -> Vec<Span> {
    let mut spans: Vec<Span> = Vec::new();

    for caps in RE_DATE.captures_iter(text) {
        if let (Some(m), Some(date)) = (caps.get(0), parse_date(&caps, today)) {
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                token: Token::Date(date),
            });
        }
    }

    let mut clock_ranges: Vec<(usize, usize)> = Vec::new();
    for caps in RE_CLOCK.captures_iter(text) {
        let Some(m) = caps.get(0) else { continue };
        if let Some(clock) = parse_clock(&caps, &text[m.end()..]) {
            clock_ranges.push((m.start(), m.end()));
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                token: Token::Clock(clock),
            });
        }
    }

    for caps in RE_PERIOD.captures_iter(text) {
        let (Some(m), Some(period)) = (
            caps.get(0),
            caps.name("period").and_then(|p| Period::parse(p.as_str())),
        ) else {
            continue;
        };
        let overlaps = clock_ranges
            .iter()
            .any(|&(start, end)| m.start() < end && start < m.end());
        if !overlaps {
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                token: Token::Period(period),
            });
        }
    }

    spans.sort_by_key(|s| s.start);
    // Drop anything overlapping an earlier span (e.g. "2026-10-21" vs a clock).
    let mut kept: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if kept.last().map_or(true, |prev| span.start >= prev.end) {
            kept.push(span);
        }
    }
    kept
}

fn parse_date(caps: &Captures<'_>, today: NaiveDate) -> Option<NaiveDate> {
    if let Some(rel) = caps.name("rel") {
        let rel = rel.as_str().to_lowercase();
        let days = if rel == "today" {
            0
        } else if rel == "tomorrow" {
            1
        } else {
            2
        };
        return today.checked_add_signed(Duration::days(days));
    }

    if let Some(weekday) = caps.name("weekday") {
        let target = parse_weekday(weekday.as_str())?;
        let is_next = caps
            .name("modifier")
            .is_some_and(|m| m.as_str().eq_ignore_ascii_case("next"));
        let mut ahead = (i64::from(target.num_days_from_monday()) + 7
            - i64::from(today.weekday().num_days_from_monday()))
            % 7;
        if is_next && ahead == 0 {
            ahead = 7;
        }
        return today.checked_add_signed(Duration::days(ahead));
    }

    if let Some(iso) = caps.name("iso") {
        return NaiveDate::parse_from_str(iso.as_str(), "%Y-%m-%d").ok();
    }

    if let (Some(month), Some(day)) = (caps.name("month"), caps.name("day")) {
        let month = parse_month(month.as_str())?;
        let day: u32 = day.as_str().parse().ok()?;
        let this_year = NaiveDate::from_ymd_opt(today.year(), month, day)?;
        if this_year >= today {
            return Some(this_year);
        }
        return NaiveDate::from_ymd_opt(today.year() + 1, month, day);
    }

    if let (Some(count), Some(unit)) = (caps.name("count"), caps.name("unit")) {
        let count: i64 = count.as_str().parse().ok()?;
        let days = if unit.as_str().to_lowercase().starts_with("week") {
            count * 7
        } else {
            count
        };
        return today.checked_add_signed(Duration::days(days));
    }

    None
}

/// `rest` is the text after the match, used to reject bare hours that are
/// really counts or names ("a table at 4 seasons").
fn parse_clock(caps: &Captures<'_>, rest: &str) -> Option<Clock> {
    let suffix = caps.name("suffix").and_then(|s| Period::parse(s.as_str()));
    let number = |name: &str| -> Option<u32> { caps.name(name)?.as_str().parse().ok() };

    let (hour, minute, meridiem) = if let Some(hour) = number("h12") {
        let meridiem = if caps.name("meridiem")?.as_str().to_lowercase().starts_with('p') {
            Meridiem::Pm
        } else {
            Meridiem::Am
        };
        (hour, number("m12").unwrap_or(0), meridiem)
    } else if let Some(h24) = caps.name("h24") {
        let hour: u32 = h24.as_str().parse().ok()?;
        // "3:30" reads like a 12-hour time; "03:30" and "15:30" do not.
        let meridiem = if h24.as_str().len() == 1 && (1..=7).contains(&hour) {
            Meridiem::Ambiguous
        } else {
            Meridiem::Exact
        };
        (hour, number("m24")?, meridiem)
    } else if let Some(named) = caps.name("named") {
        let hour = if named.as_str().eq_ignore_ascii_case("noon") {
            12
        } else {
            0
        };
        (hour, 0, Meridiem::Exact)
    } else {
        let explicit = caps.name("bare_meridiem").is_some()
            || caps.name("bm").is_some()
            || caps.name("oclock").is_some()
            || suffix.is_some();
        if !explicit && !RE_BARE_HOUR_END.is_match(rest) {
            return None;
        }
        let meridiem = match caps.name("bare_meridiem") {
            Some(m) if m.as_str().to_lowercase().starts_with('p') => Meridiem::Pm,
            Some(_) => Meridiem::Am,
            None => Meridiem::Ambiguous,
        };
        (number("bare")?, number("bm").unwrap_or(0), meridiem)
    };

    Some(Clock {
        hour,
        minute,
        meridiem,
        suffix,
    })
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_lowercase().as_str() {
        "monday" => Some(Weekday::Mon),
        "tuesday" | "tues" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" | "thurs" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn parse_month(s: &str) -> Option<u32> {
    let prefix: String = s.to_lowercase().chars().take(3).collect();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}
