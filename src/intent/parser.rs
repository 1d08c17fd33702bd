//! Utterance parsing for the pattern router.
//!
//! The router only needs a light syntactic view of the utterance: tokens
//! with byte offsets, a coarse kind, and whether a word is a function word
//! (determiner, pronoun, preposition, auxiliary) or a content word.

/// Coarse token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    /// Alphabetic word (may contain inner apostrophes or hyphens).
    Word,
    /// Digit-led token: `3`, `3pm`, `1st`, `10:30`, `2024-12-25`.
    Number,
    /// A single punctuation or symbol character.
    Punct,
}

/// A token with its byte span in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// Lowercased token text.
    pub lower: String,
    /// Byte offset of the first character.
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Token {
    pub fn is_punct(&self) -> bool {
        self.kind == TokenKind::Punct
    }

    /// A word that carries meaning on its own (not a function word).
    pub fn is_content_word(&self) -> bool {
        self.kind == TokenKind::Word && !FUNCTION_WORDS.contains(&self.lower.as_str())
    }

    pub fn is_determiner(&self) -> bool {
        DETERMINERS.contains(&self.lower.as_str())
    }

    pub fn is_pronoun(&self) -> bool {
        PRONOUNS.contains(&self.lower.as_str())
    }
}

/// Determiners and possessives. A trigger word right after one of these is
/// being used as a noun or adjective ("the add button"), not as a verb.
const DETERMINERS: &[&str] = &[
    "a", "an", "the", "my", "your", "our", "their", "his", "her", "its", "this", "that", "these",
    "those",
];

const PRONOUNS: &[&str] = &["i", "you", "we", "they", "he", "she", "it"];

const FUNCTION_WORDS: &[&str] = &[
    "a", "an", "the", "my", "your", "our", "their", "his", "her", "its", "this", "that", "these",
    "those", "i", "me", "you", "we", "us", "they", "them", "it", "he", "him", "she", "to", "for",
    "of", "in", "on", "at", "by", "with", "from", "about", "into", "and", "or", "but", "is", "am",
    "are", "was", "were", "be", "been", "do", "does", "please", "can", "could", "would", "will",
    "should", "just", "also", "some", "any", "all", "as", "so", "up",
];

/// The parsed form of one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedUtterance {
    text: String,
    tokens: Vec<Token>,
}

impl ParsedUtterance {
    pub fn new(text: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            text: text.into(),
            tokens,
        }
    }

    /// The original text.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Original text from the start of token `index` to the end of the utterance.
    pub fn text_from_token(&self, index: usize) -> &str {
        self.tokens
            .get(index)
            .map_or("", |t| &self.text[t.start..])
    }

    /// Lowercased content words, in order.
    pub fn content_words(&self) -> impl Iterator<Item = &str> {
        self.tokens
            .iter()
            .filter(|t| t.is_content_word())
            .map(|t| t.lower.as_str())
    }
}

/// The language-parsing capability behind the pattern router.
pub trait UtteranceParser: Send + Sync {
    /// Returns the parser name, for logging.
    fn name(&self) -> &str;

    /// Parse one utterance.
    fn parse(&self, text: &str) -> Result<ParsedUtterance, ParseError>;
}

/// Parser failure. The router treats any failure as "no shortcut".
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// The parsing model is not loaded or not reachable.
    #[error("parser unavailable: {0}")]
    Unavailable(String),
}

/// Rule-free tokenizer that needs no model files.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalParser;

impl LexicalParser {
    pub fn new() -> Self {
        Self
    }
}

impl UtteranceParser for LexicalParser {
    fn name(&self) -> &str {
        "lexical"
    }

    fn parse(&self, text: &str) -> Result<ParsedUtterance, ParseError> {
        Ok(ParsedUtterance::new(text, tokenize(text)))
    }
}

/// Split text into word, number and punctuation tokens.
///
/// Apostrophes, hyphens, colons, slashes and dots are kept inside a token
/// when they sit between two alphanumeric characters (`can't`, `follow-up`,
/// `10:30`, `12/25`, `a.m`).
pub fn tokenize(text: &str) -> Vec<Token> {
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (start, c) = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_alphanumeric() {
            let mut j = i + 1;
            while j < chars.len() {
                let ch = chars[j].1;
                if ch.is_alphanumeric() {
                    j += 1;
                } else if matches!(ch, '\'' | '’' | '-' | ':' | '/' | '.')
                    && j + 1 < chars.len()
                    && chars[j + 1].1.is_alphanumeric()
                {
                    j += 2;
                } else {
                    break;
                }
            }
            let end = chars.get(j).map_or(text.len(), |(offset, _)| *offset);
            let kind = if c.is_ascii_digit() {
                TokenKind::Number
            } else {
                TokenKind::Word
            };
            tokens.push(Token {
                kind,
                lower: text[start..end].to_lowercase(),
                start,
                end,
            });
            i = j;
        } else {
            let end = start + c.len_utf8();
            tokens.push(Token {
                kind: TokenKind::Punct,
                lower: c.to_string(),
                start,
                end,
            });
            i += 1;
        }
    }

    tokens
}
