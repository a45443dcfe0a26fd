//! Natural-language helpers for task fields.
//!
//! Pure functions, no clock access: callers pass `today` in so behavior is
//! deterministic under test.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};

use crate::tools::tasks::Priority;

const HIGH_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "critical",
    "important",
    "emergency",
    "crucial",
    "vital",
    "high priority",
    "right away",
    "immediately",
    "blocker",
    "p0",
    "p1",
    "must",
    "required",
];

const LOW_KEYWORDS: &[&str] = &[
    "maybe",
    "sometime",
    "eventually",
    "when possible",
    "low priority",
    "nice to have",
    "optional",
    "if time",
    "p3",
    "p4",
    "someday",
];

/// Infer a priority from free text (title plus description). High keywords
/// win over low keywords; no match means [`Priority::Normal`].
pub fn infer_priority(text: &str) -> Priority {
    let lowered = text.to_lowercase();
    if HIGH_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return Priority::High;
    }
    if LOW_KEYWORDS.iter().any(|kw| lowered.contains(kw)) {
        return Priority::Low;
    }
    Priority::Normal
}

/// Parse a due-date phrase relative to `today`.
///
/// Accepts relative phrases (`today`, `tomorrow`, `next week`, `next month`,
/// `in 3 days`, `in 2 weeks`, `in 1 month`), weekday names (`friday`,
/// `next friday` — always a future occurrence), and ISO dates
/// (`2026-09-15`, with or without a time suffix).
pub fn parse_due_phrase(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    let phrase = input.trim().to_lowercase();
    if phrase.is_empty() {
        return None;
    }

    match phrase.as_str() {
        "today" | "now" => return Some(today),
        "tomorrow" => return today.checked_add_days(Days::new(1)),
        "next week" | "in a week" => return today.checked_add_days(Days::new(7)),
        "next month" | "in a month" => return today.checked_add_months(Months::new(1)),
        _ => {}
    }

    if let Some(date) = parse_in_n_units(&phrase, today) {
        return Some(date);
    }

    if let Some(date) = parse_weekday(&phrase, today) {
        return Some(date);
    }

    parse_iso(&phrase)
}

/// `in N days|weeks|months`
fn parse_in_n_units(phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
    let mut words = phrase.split_whitespace();
    if words.next() != Some("in") {
        return None;
    }
    let n: u32 = words.next()?.parse().ok()?;
    let unit = words.next()?;
    if words.next().is_some() {
        return None;
    }
    match unit {
        "day" | "days" => today.checked_add_days(Days::new(u64::from(n))),
        "week" | "weeks" => today.checked_add_days(Days::new(u64::from(n) * 7)),
        "month" | "months" => today.checked_add_months(Months::new(n)),
        _ => None,
    }
}

/// A bare or `next `-prefixed weekday name, resolved to the next future
/// occurrence (one week out when today is that weekday).
fn parse_weekday(phrase: &str, today: NaiveDate) -> Option<NaiveDate> {
    let name = phrase.strip_prefix("next ").unwrap_or(phrase);
    let target: Weekday = name.parse().ok()?;
    let ahead = (target.num_days_from_monday() + 7 - today.weekday().num_days_from_monday()) % 7;
    let ahead = if ahead == 0 { 7 } else { ahead };
    today.checked_add_days(Days::new(u64::from(ahead)))
}

fn parse_iso(phrase: &str) -> Option<NaiveDate> {
    // Accept a trailing time component ("2026-09-15T10:00:00", "... 10:00").
    let date_part = phrase
        .split(['t', ' '])
        .next()
        .unwrap_or(phrase);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
