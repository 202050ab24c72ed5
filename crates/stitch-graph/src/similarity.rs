//! Text similarity between messages.
//!
//! The baseline is token-set Jaccard over normalized tokens. Other strategies
//! (embedding search, for instance) implement [`SimilarityStrategy`] and plug
//! into the scorer and suggester unchanged.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use stitch_core::Message;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\p{L}\p{N}]+").expect("token pattern is valid"));

/// Words too common to say anything about topic.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "can", "do", "for", "from", "how",
    "i", "if", "in", "is", "it", "me", "my", "no", "not", "of", "on", "or", "so", "that", "the",
    "this", "to", "was", "we", "what", "with", "you", "your",
];

/// Scores how related two messages are, in `[0, 1]`.
pub trait SimilarityStrategy: Send + Sync {
    /// Similarity between `a` and `b`.
    fn similarity(&self, a: &Message, b: &Message) -> f64;
}

/// Token-set Jaccard similarity over message text.
#[derive(Clone, Copy, Debug, Default)]
pub struct LexicalSimilarity;

impl SimilarityStrategy for LexicalSimilarity {
    fn similarity(&self, a: &Message, b: &Message) -> f64 {
        jaccard(&normalize_tokens(&a.text()), &normalize_tokens(&b.text()))
    }
}

/// Lowercase, split on non-alphanumerics, drop stopwords and single chars.
pub fn normalize_tokens(text: &str) -> BTreeSet<String> {
    let lowered = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| t.chars().count() > 1 && !STOPWORDS.contains(t))
        .map(str::to_owned)
        .collect()
}

/// `|a ∩ b| / |a ∪ b|`, or `0.0` when both are empty.
#[allow(clippy::cast_precision_loss)]
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
