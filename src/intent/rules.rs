//! Verb + object rules recognised by the pattern router.

use super::parser::{ParsedUtterance, Token};

/// What a rule recognises.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    Create,
    Delete,
    Toggle,
}

/// A trigger lexicon for one intent. Each trigger is a token sequence.
#[derive(Debug)]
pub struct Rule {
    pub kind: RuleKind,
    pub triggers: &'static [&'static [&'static str]],
}

/// Declaration order is the tiebreak between equally long matches.
pub const RULES: &[Rule] = &[
    Rule {
        kind: RuleKind::Create,
        triggers: &[&["add"], &["create"], &["make"]],
    },
    Rule {
        kind: RuleKind::Delete,
        triggers: &[
            &["delete"],
            &["remove"],
            &["cancel"],
            &["unschedule"],
            &["get", "rid", "of"],
        ],
    },
    Rule {
        kind: RuleKind::Toggle,
        triggers: &[
            &["mark"],
            &["toggle"],
            &["finish"],
            &["finished"],
            &["complete"],
            &["completed"],
            &["did"],
        ],
    },
];

const CREATE_ADJECTIVES: &[&str] = &["new", "another"];
const CREATE_FILLERS: &[&str] = &["task", "reminder", "item", "entry", "todo", "to-do"];
const CREATE_LINKERS: &[&str] = &["to", "for", "called", "named"];
const SEPARATORS: &[&str] = &[":", "-", "–"];

/// Words that turn a delete request into a time-block delete.
const TIME_BLOCK_WORDS: &[&str] = &[
    "block",
    "blocks",
    "slot",
    "slots",
    "session",
    "sessions",
    "booking",
    "bookings",
    "unschedule",
];

/// One matched rule, in token indices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub kind: RuleKind,
    pub rule_index: usize,
    /// Index of the first trigger token.
    pub start: usize,
    /// One past the last token of the span.
    pub end: usize,
    /// First title token, for create matches.
    pub title_start: Option<usize>,
}

impl RuleMatch {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// True when a delete span talks about a scheduled block rather than a task.
    pub fn mentions_time_block(&self, parsed: &ParsedUtterance) -> bool {
        parsed.tokens()[self.start..self.end]
            .iter()
            .any(|t| TIME_BLOCK_WORDS.contains(&t.lower.as_str()))
    }
}

/// Find every rule match in the utterance.
pub fn find_matches(parsed: &ParsedUtterance) -> Vec<RuleMatch> {
    let tokens = parsed.tokens();
    let mut matches = Vec::new();

    for (rule_index, rule) in RULES.iter().enumerate() {
        for start in 0..tokens.len() {
            for trigger in rule.triggers {
                if !trigger_at(tokens, start, trigger) {
                    continue;
                }
                if let Some(m) = match_at(rule, rule_index, tokens, start, trigger.len()) {
                    matches.push(m);
                }
            }
        }
    }
    matches
}

/// The longest match; ties go to the earlier rule, then the earlier start.
pub fn best_match(parsed: &ParsedUtterance) -> Option<RuleMatch> {
    find_matches(parsed).into_iter().min_by(|a, b| {
        b.len()
            .cmp(&a.len())
            .then(a.rule_index.cmp(&b.rule_index))
            .then(a.start.cmp(&b.start))
    })
}

fn trigger_at(tokens: &[Token], start: usize, trigger: &[&str]) -> bool {
    tokens.len() >= start + trigger.len()
        && tokens[start..start + trigger.len()]
            .iter()
            .zip(trigger)
            .all(|(t, w)| t.lower == *w)
}

fn match_at(
    rule: &Rule,
    rule_index: usize,
    tokens: &[Token],
    start: usize,
    trigger_len: usize,
) -> Option<RuleMatch> {
    // "the remove button", "my finished tasks": not a verb
    if start > 0 && tokens[start - 1].is_determiner() {
        return None;
    }
    let after = start + trigger_len;

    let (body_start, title_start) = match rule.kind {
        RuleKind::Create => {
            let title = create_title_start(tokens, after)?;
            (title, Some(title))
        }
        RuleKind::Toggle if tokens[start].lower == "did" => {
            // "did you add ..." is a question, not a report
            if tokens.get(after).is_some_and(Token::is_pronoun) {
                return None;
            }
            (after, None)
        }
        _ => (after, None),
    };

    let end = tokens[body_start.min(tokens.len())..]
        .iter()
        .position(Token::is_punct)
        .map_or(tokens.len(), |offset| body_start + offset);

    Some(RuleMatch {
        kind: rule.kind,
        rule_index,
        start,
        end: end.max(after),
        title_start,
    })
}

/// Skip the optional slots after a create verb and return the first title token.
fn create_title_start(tokens: &[Token], mut cursor: usize) -> Option<usize> {
    let skip = |cursor: &mut usize, words: &[&str]| {
        if tokens
            .get(*cursor)
            .is_some_and(|t| words.contains(&t.lower.as_str()))
        {
            *cursor += 1;
        }
    };

    if tokens.get(cursor).is_some_and(Token::is_determiner) {
        cursor += 1;
    }
    skip(&mut cursor, CREATE_ADJECTIVES);
    skip(&mut cursor, CREATE_FILLERS);
    skip(&mut cursor, SEPARATORS);
    skip(&mut cursor, CREATE_LINKERS);

    tokens
        .get(cursor)
        .filter(|t| t.is_content_word())
        .map(|_| cursor)
}
