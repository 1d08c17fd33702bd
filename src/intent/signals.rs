//! Complexity signals that make a create request unsafe to shortcut.
//!
//! A create utterance that mentions a date, a time, a span, a repeat, a
//! quantity or a priority needs attribute inference, so the router hands it to the
//! general agent instead of building the task itself.

use std::sync::LazyLock;

use regex::Regex;

use super::parser::{ParsedUtterance, TokenKind};

/// Why a create shortcut was declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComplexitySignal {
    /// A digit-led token such as `3`, `3pm` or `2024-12-25`.
    Numeric(String),
    /// A spelled-out number or ordinal (`two`, `third`).
    NumberWord(String),
    /// A clock expression (`10:30`, `5 pm`, `noon`).
    ClockTime(String),
    /// A calendar or relative-day expression (`tomorrow`, `next week`, `in may`).
    DateExpression(String),
    /// A span of time (`in an hour`, `a few days`).
    Duration(String),
    /// A repeat (`daily`, `every week`).
    Recurrence(String),
    /// Scheduling or priority vocabulary (`deadline`, `urgent`).
    Keyword(String),
}

static CLOCK_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b\d{1,2}(?::\d{2})?\s*(?:am|pm|a\.m\.|p\.m\.)|\b\d{1,2}:\d{2}\b|\b(?:noon|midnight|o'clock)\b")
        .expect("valid clock time regex")
});

// `may` and `march` only count in a date context.
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:today|tonight|tomorrow|yesterday|weekend|morning|afternoon|evening|monday|tuesday|wednesday|thursday|friday|saturday|sunday|january|february|april|june|july|august|september|october|november|december)\b|\b(?:next|this|last)\s+(?:week|month|year)\b|\bend\s+of\s+(?:the\s+)?(?:day|week|month)\b|\b(?:in|by|on|until|till|before|after|since|during|from|early|mid|late)\s+(?:may|march)\b|\b(?:may|march)\s+\d|\b\d{1,2}(?:st|nd|rd|th)?\s+(?:of\s+)?(?:may|march)\b",
    )
    .expect("valid date expression regex")
});

static DURATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:a|an|few|couple\s+of|several|\d+|one|two|three|four|five|six|seven|eight|nine|ten|twelve|half\s+an?)\s+(?:minute|hour|day|week|month|year)s?\b|\b(?:minute|hour|day|week|month|year)s?\s+(?:later|from\s+now)\b|\bwithin\s+(?:the\s+)?(?:minute|hour|day|week|month|year)\b",
    )
    .expect("valid duration regex")
});

static RECURRENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:daily|weekly|biweekly|fortnightly|monthly|quarterly|yearly|annually|hourly|nightly|weekdays|weeknights)\b|\bevery(?:day|\s+(?:other\s+)?\w+)|\beach\s+(?:day|week|month|year|morning|afternoon|evening|night|monday|tuesday|wednesday|thursday|friday|saturday|sunday)\b",
    )
    .expect("valid recurrence regex")
});

const NUMBER_WORDS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "twenty", "thirty", "forty", "fifty", "hundred", "dozen", "first", "second", "third",
    "fourth", "fifth", "sixth", "seventh", "eighth", "ninth", "tenth",
];

const KEYWORDS: &[&str] = &[
    "priority",
    "prioritize",
    "deadline",
    "urgent",
    "urgently",
    "important",
    "asap",
    "due",
];

/// Return the first complexity signal found in the utterance, if any.
pub fn detect(parsed: &ParsedUtterance) -> Option<ComplexitySignal> {
    if let Some(m) = CLOCK_TIME_RE.find(parsed.text()) {
        return Some(ComplexitySignal::ClockTime(m.as_str().to_owned()));
    }
    if let Some(m) = DATE_RE.find(parsed.text()) {
        return Some(ComplexitySignal::DateExpression(m.as_str().to_owned()));
    }
    if let Some(m) = RECURRENCE_RE.find(parsed.text()) {
        return Some(ComplexitySignal::Recurrence(m.as_str().to_owned()));
    }
    if let Some(m) = DURATION_RE.find(parsed.text()) {
        return Some(ComplexitySignal::Duration(m.as_str().to_owned()));
    }

    for token in parsed.tokens() {
        if token.kind == TokenKind::Number {
            return Some(ComplexitySignal::Numeric(token.lower.clone()));
        }
        if token.kind != TokenKind::Word {
            continue;
        }
        let word = token.lower.as_str();
        if NUMBER_WORDS.contains(&word) {
            return Some(ComplexitySignal::NumberWord(token.lower.clone()));
        }
        if KEYWORDS.contains(&word) {
            return Some(ComplexitySignal::Keyword(token.lower.clone()));
        }
    }
    None
}
