//! Reply classification ("decoder").
//!
//! Turns the counterparty's raw reply into a [`DecodedReply`]. Markers are
//! checked in a fixed precedence: question markers first, then decline
//! markers, then the accept default. Routing depends on that order.

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Classified purpose of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    Accept,
    Decline,
    Question,
    Negotiate,
    Unclear,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::Accept => "accept",
            Intent::Decline => "decline",
            Intent::Question => "question",
            Intent::Negotiate => "negotiate",
            Intent::Unclear => "unclear",
        }
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Negative,
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Sentiment::Positive => "positive",
            Sentiment::Negative => "negative",
            Sentiment::Neutral => "neutral",
        };
        write!(f, "{}", s)
    }
}

/// Structured view of one reply. Regenerated every stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedReply {
    pub raw_text: String,
    pub intent: Intent,
    pub sentiment: Sentiment,
    pub has_question: bool,
    /// The reply needs more than a plain continuation.
    pub requires_action: bool,
    /// Extracted entities (`url`, `price`, `collaboration_type`).
    #[serde(default)]
    pub entities: BTreeMap<String, String>,
}

impl DecodedReply {
    pub fn entity(&self, key: &str) -> Option<&str> {
        self.entities.get(key).map(|v| v.as_str())
    }
}

/// Converts raw reply text into a [`DecodedReply`].
pub trait ReplyClassifier: Send + Sync {
    fn classify(&self, text: &str) -> DecodedReply;
}

/// Marker vocabulary for [`KeywordClassifier`].
#[derive(Debug, Clone)]
pub struct MarkerSet {
    /// Substrings that mark a question (punctuation and CJK interrogatives).
    pub question_symbols: Vec<String>,
    /// Interrogatives, matched case-insensitively as whole words opening a sentence.
    pub question_words: Vec<String>,
    /// Substrings that mark a decline.
    pub decline_symbols: Vec<String>,
    /// Whole-word decline markers, matched case-insensitively.
    pub decline_words: Vec<String>,
    /// Agreeing phrases that contain a marker (`no problem`, `没问题`).
    /// Removed before any marker is matched.
    pub exceptions: Vec<String>,
}

impl MarkerSet {
    pub fn standard() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            question_symbols: owned(&["?", "？", "问", "什么", "怎么", "为什么"]),
            question_words: owned(&["what", "how", "why", "when", "where", "which", "who"]),
            decline_symbols: owned(&["不", "没", "拒绝", "不行", "取消"]),
            decline_words: owned(&[
                "no", "not", "never", "decline", "refuse", "cancel", "cannot", "unable", "can't",
                "won't", "don't",
            ]),
            exceptions: owned(&[
                "no problem",
                "not a problem",
                "no worries",
                "not bad",
                "don't mind",
                "do not mind",
                "don't worry",
                "没问题",
                "不错",
                "不客气",
                "没关系",
            ]),
        }
    }
}

/// Keyword-based classifier.
pub struct KeywordClassifier {
    exceptions: Option<Regex>,
    question: Regex,
    decline: Regex,
    url: Regex,
    price: Regex,
}

impl KeywordClassifier {
    /// Classifier with the standard marker vocabulary.
    pub fn standard() -> CoreResult<Self> {
        Self::new(&MarkerSet::standard())
    }

    pub fn new(markers: &MarkerSet) -> CoreResult<Self> {
        let exceptions = if markers.exceptions.is_empty() {
            None
        } else {
            let phrases: Vec<String> = markers.exceptions.iter().map(|p| regex::escape(p)).collect();
            Some(compile(&format!(r"(?i){}", phrases.join("|")))?)
        };
        let question = compile(&marker_pattern(&markers.question_symbols, &markers.question_words, true))?;
        let decline = compile(&marker_pattern(&markers.decline_symbols, &markers.decline_words, false))?;
        let url = compile(r"https?://[^\s，。]+")?;
        let price = compile(
            r"(?i)[$¥€£]\s?\d[\d,]*(?:\.\d+)?|\d[\d,]*(?:\.\d+)?\s?(?:元|rmb|usd|eur|yuan|dollars|dollar)",
        )?;

        Ok(Self {
            exceptions,
            question,
            decline,
            url,
            price,
        })
    }

    fn extract_entities(&self, text: &str) -> BTreeMap<String, String> {
        let mut entities = BTreeMap::new();

        if let Some(m) = self.url.find(text) {
            entities.insert("url".to_string(), m.as_str().to_string());
        }
        if let Some(m) = self.price.find(text) {
            entities.insert("price".to_string(), m.as_str().trim().to_string());
        }

        let lower = text.to_lowercase();
        let collaboration = if lower.contains("单推") || lower.contains("single") {
            Some("single")
        } else if lower.contains("合集") || lower.contains("collection") {
            Some("collection")
        } else if lower.contains("纯佣") || lower.contains("commission") {
            Some("commission")
        } else {
            None
        };
        if let Some(kind) = collaboration {
            entities.insert("collaboration_type".to_string(), kind.to_string());
        }

        entities
    }
}

impl ReplyClassifier for KeywordClassifier {
    fn classify(&self, text: &str) -> DecodedReply {
        let entities = self.extract_entities(text);

        if text.trim().is_empty() {
            return DecodedReply {
                raw_text: text.to_string(),
                intent: Intent::Unclear,
                sentiment: Sentiment::Neutral,
                has_question: false,
                requires_action: false,
                entities,
            };
        }

        let markers = match &self.exceptions {
            Some(exceptions) => exceptions.replace_all(text, " "),
            None => std::borrow::Cow::Borrowed(text),
        };
        let has_question = self.question.is_match(&markers);
        let has_decline = self.decline.is_match(&markers);

        let intent = if has_question {
            Intent::Question
        } else if has_decline {
            Intent::Decline
        } else {
            Intent::Accept
        };

        let sentiment = if has_decline {
            Sentiment::Negative
        } else if intent == Intent::Accept {
            Sentiment::Positive
        } else {
            Sentiment::Neutral
        };

        DecodedReply {
            raw_text: text.to_string(),
            intent,
            sentiment,
            has_question,
            requires_action: intent != Intent::Accept,
            entities,
        }
    }
}

fn marker_pattern(symbols: &[String], words: &[String], sentence_start: bool) -> String {
    let mut alternatives: Vec<String> = symbols.iter().map(|s| regex::escape(s)).collect();
    if !words.is_empty() {
        let words: Vec<String> = words.iter().map(|w| regex::escape(w)).collect();
        let lead = if sentence_start { r"(?:^|[.!;。！；]\s*)\s*" } else { "" };
        alternatives.push(format!(r"{}\b(?:{})\b", lead, words.join("|")));
    }
    if alternatives.is_empty() {
        // Matches nothing.
        return r"[^\s\S]".to_string();
    }
    format!("(?i){}", alternatives.join("|"))
}

fn compile(pattern: &str) -> CoreResult<Regex> {
    Regex::new(pattern)
        .map_err(|e| CoreError::Config(format!("Invalid classifier pattern '{}': {}", pattern, e)))
}
