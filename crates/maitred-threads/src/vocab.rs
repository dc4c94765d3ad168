// SPDX-FileCopyrightText: 2026 Maitred Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reply vocabulary and the default keyword parser.
//!
//! Deliberately not NLU: a fixed multi-locale word list over normalized
//! full-string matches. Anything the list does not cover goes to a human.

use maitred_core::{ParsedReply, ReplyConfidence, ReplyIntent, ReplyParser};

/// Affirmative replies across the locales the platform dispatches in.
const YES_WORDS: &[&str] = &[
    "yes", "y", "yeah", "yep", "yup", "ok", "okay", "confirm", "confirmed",
    "accept", "accepted", "approve", "sure", "si", "sí", "oui", "ja", "da",
];

const NO_WORDS: &[&str] = &[
    "no", "n", "nope", "nah", "cancel", "cancelled", "reject", "rejected",
    "decline", "declined", "stop", "non", "nein",
];

/// Trim, lowercase, drop ASCII punctuation. "YES!!" and "yes" compare equal.
pub fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect()
}

pub fn is_affirmative(text: &str) -> bool {
    YES_WORDS.contains(&normalize(text).as_str())
}

pub fn is_negative(text: &str) -> bool {
    NO_WORDS.contains(&normalize(text).as_str())
}

/// Default [`ReplyParser`] over the fixed vocabulary.
///
/// Vocabulary hits are the only high-confidence intents this parser emits;
/// a question mark downgrades to `need-more-info` and everything else is
/// `requires-human`, so the engine never confirms or declines on a guess.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordReplyParser;

impl ReplyParser for KeywordReplyParser {
    fn parse(&self, text: &str) -> ParsedReply {
        if is_affirmative(text) {
            return ParsedReply {
                intent: ReplyIntent::Confirm,
                confidence: ReplyConfidence::High,
            };
        }
        if is_negative(text) {
            return ParsedReply {
                intent: ReplyIntent::Reject,
                confidence: ReplyConfidence::High,
            };
        }
        if text.contains('?') {
            return ParsedReply {
                intent: ReplyIntent::NeedMoreInfo,
                confidence: ReplyConfidence::Medium,
            };
        }
        ParsedReply {
            intent: ReplyIntent::RequiresHuman,
            confidence: ReplyConfidence::Low,
        }
    }
}
