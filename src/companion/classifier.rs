// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Rule-based response classifier.
//!
//! Rules are checked in priority order and the first match answers:
//! Crisis -> Sadness -> Anxiety -> General. The last rule always matches, so
//! every message gets exactly one reply.

use std::sync::LazyLock;

use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ============================================================================
// REPLIES
// ============================================================================

pub const CRISIS_REPLY: &str = "I'm listening. This sounds serious. Are you safe right now? \
If you are in immediate danger, please call local emergency services (911).";

pub const SADNESS_REPLY: &str =
    "I'm sorry you're feeling sad. Would you like to tell me more about what's been happening?";

pub const ANXIETY_REPLY: &str =
    "That sounds stressful. Do you want to try a short breathing exercise together?";

pub const GENERAL_REPLIES: [&str; 3] = [
    "I hear you. Tell me more about that.",
    "Thank you for sharing that with me. How does that make you feel?",
    "It's okay to feel this way. I'm here to listen.",
];

// ============================================================================
// PATTERNS
// ============================================================================

static CRISIS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:kill(?:ing)?\s?myself|\bsuicide\b|\bend it all\b|\bwant to die\b|\bi will die\b|\bi['’]m going to die\b|\bworthless\b|\bhurt myself\b)",
    )
    .expect("crisis regex is valid")
});

static SADNESS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:sad|depressed|unhappy|crying|lonely)\b").expect("sadness regex is valid")
});

static ANXIETY_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:anxious|panic|scared|worried)\b").expect("anxiety regex is valid")
});

// ============================================================================
// TYPES
// ============================================================================

/// Which rule produced a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyCategory {
    Crisis,
    Sadness,
    Anxiety,
    General,
}

impl ReplyCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crisis => "crisis",
            Self::Sadness => "sadness",
            Self::Anxiety => "anxiety",
            Self::General => "general",
        }
    }

    /// Whether the front end should surface emergency contacts.
    pub fn is_crisis(&self) -> bool {
        matches!(self, Self::Crisis)
    }
}

impl std::fmt::Display for ReplyCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub category: ReplyCategory,
    pub text: String,
}

enum Responder {
    Fixed(&'static str),
    OneOf(&'static [&'static str]),
}

impl Responder {
    fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> &'static str {
        match self {
            Responder::Fixed(text) => *text,
            Responder::OneOf(choices) => choices.choose(rng).copied().unwrap_or(choices[0]),
        }
    }
}

struct Rule {
    category: ReplyCategory,
    pattern: &'static LazyLock<Regex>,
    responder: Responder,
}

// ============================================================================
// CLASSIFIER
// ============================================================================

/// Ordered (pattern, responder) rules, then the general fallback.
/// Stateless; share it freely.
pub struct Classifier {
    rules: Vec<Rule>,
    fallback: Responder,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Rule {
                    category: ReplyCategory::Crisis,
                    pattern: &CRISIS_PATTERN,
                    responder: Responder::Fixed(CRISIS_REPLY),
                },
                Rule {
                    category: ReplyCategory::Sadness,
                    pattern: &SADNESS_PATTERN,
                    responder: Responder::Fixed(SADNESS_REPLY),
                },
                Rule {
                    category: ReplyCategory::Anxiety,
                    pattern: &ANXIETY_PATTERN,
                    responder: Responder::Fixed(ANXIETY_REPLY),
                },
            ],
            fallback: Responder::OneOf(&GENERAL_REPLIES),
        }
    }

    /// First matching rule, or the general fallback.
    fn rule_for(&self, text: &str) -> (ReplyCategory, &Responder) {
        match self.rules.iter().find(|rule| rule.pattern.is_match(text)) {
            Some(rule) => (rule.category, &rule.responder),
            None => (ReplyCategory::General, &self.fallback),
        }
    }

    /// Category of the first matching rule.
    pub fn classify(&self, text: &str) -> ReplyCategory {
        self.rule_for(text).0
    }

    /// Reply to `text`, drawing any random choice from `rng`.
    pub fn respond_with<R: Rng + ?Sized>(&self, text: &str, rng: &mut R) -> Reply {
        let (category, responder) = self.rule_for(text);
        let text = responder.pick(rng);

        tracing::debug!("REPLY_CLASSIFIED | category={}", category);

        Reply {
            category,
            text: text.to_string(),
        }
    }

    /// Reply to `text` using the thread RNG.
    pub fn respond(&self, text: &str) -> Reply {
        self.respond_with(text, &mut rand::thread_rng())
    }
}
