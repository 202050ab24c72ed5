//! Corruption scoring for orphan roots.
//!
//! The score is a sum of weighted factors, each an independent predicate
//! over a [`ScoreContext`], clamped to `[0, 1]`. Adding a factor means adding
//! a row to the factor table; evaluation order never changes the result.

use std::sync::Arc;

use serde::Serialize;
use stitch_core::{Message, MessageId, Session};
use stitch_settings::ScoringSettings;

use crate::forest::chronological;
use crate::similarity::{LexicalSimilarity, SimilarityStrategy};

/// Everything a factor predicate may look at.
pub struct ScoreContext<'a> {
    /// Session the message belongs to.
    pub session: &'a Session,
    /// Message being scored.
    pub message: &'a Message,
    /// Message immediately before it in the session timeline.
    pub previous: Option<&'a Message>,
    /// Similarity to the nearest main-thread message by time, if any.
    pub similarity_to_main: Option<f64>,
    /// Resume window in milliseconds.
    pub resume_epsilon_ms: u64,
    /// Similarity below which the message counts as off-topic.
    pub low_similarity_threshold: f64,
}

struct Factor {
    name: &'static str,
    weight: f64,
    applies: fn(&ScoreContext<'_>) -> bool,
}

const FACTORS: &[Factor] = &[
    Factor {
        name: "null_parent",
        weight: 0.4,
        applies: null_parent,
    },
    Factor {
        name: "near_previous",
        weight: 0.2,
        applies: near_previous,
    },
    Factor {
        name: "side_branch_unresolved",
        weight: 0.3,
        applies: side_branch_unresolved,
    },
    Factor {
        name: "low_similarity",
        weight: 0.1,
        applies: low_similarity,
    },
];

fn null_parent(ctx: &ScoreContext<'_>) -> bool {
    ctx.message.parent_id.is_none() && ctx.session.designated_root != Some(ctx.message.id)
}

fn near_previous(ctx: &ScoreContext<'_>) -> bool {
    ctx.previous.is_some_and(|prev| {
        let gap = (ctx.message.timestamp - prev.timestamp).num_milliseconds().unsigned_abs();
        gap <= ctx.resume_epsilon_ms
    })
}

fn side_branch_unresolved(ctx: &ScoreContext<'_>) -> bool {
    ctx.message.is_side_branch && ctx.session.is_detached_root(ctx.message.id)
}

fn low_similarity(ctx: &ScoreContext<'_>) -> bool {
    ctx.similarity_to_main
        .is_some_and(|s| s < ctx.low_similarity_threshold)
}

/// A score with the factors that produced it.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorruptionAssessment {
    /// Scored message.
    pub message_id: MessageId,
    /// Clamped score in `[0, 1]`.
    pub score: f64,
    /// Names of the factors that fired.
    pub factors: Vec<&'static str>,
}

/// Scores how likely a detached message is accidental corruption.
///
/// Advisory only: the score ranks orphans for a caller and never blocks a
/// repair.
#[derive(Clone)]
pub struct CorruptionScorer {
    settings: ScoringSettings,
    similarity: Arc<dyn SimilarityStrategy>,
}

impl Default for CorruptionScorer {
    fn default() -> Self {
        Self::new(ScoringSettings::default(), Arc::new(LexicalSimilarity))
    }
}

impl std::fmt::Debug for CorruptionScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorruptionScorer")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CorruptionScorer {
    /// Create a scorer.
    pub fn new(settings: ScoringSettings, similarity: Arc<dyn SimilarityStrategy>) -> Self {
        Self {
            settings,
            similarity,
        }
    }

    /// Score one message of `session`.
    pub fn assess(&self, session: &Session, message_id: MessageId) -> Option<CorruptionAssessment> {
        let message = session.message(message_id)?;
        let timeline = timeline(session);
        Some(self.assess_in(session, &timeline, message))
    }

    /// Score the root of every orphan thread, in `session.orphans` order.
    pub fn assess_orphans(&self, session: &Session) -> Vec<CorruptionAssessment> {
        let timeline = timeline(session);
        session
            .orphans
            .iter()
            .filter_map(|t| t.root())
            .map(|root| self.assess_in(session, &timeline, root))
            .collect()
    }

    fn assess_in(
        &self,
        session: &Session,
        timeline: &[&Message],
        message: &Message,
    ) -> CorruptionAssessment {
        let previous = timeline
            .binary_search_by(|m| chronological(m, message))
            .ok()
            .and_then(|pos| pos.checked_sub(1))
            .map(|pos| timeline[pos]);
        let similarity_to_main =
            nearest_main(session, message).map(|main| self.similarity.similarity(message, main));

        let ctx = ScoreContext {
            session,
            message,
            previous,
            similarity_to_main,
            resume_epsilon_ms: self.settings.resume_epsilon_ms,
            low_similarity_threshold: self.settings.low_similarity_threshold,
        };

        let mut total = 0.0_f64;
        let mut factors = Vec::new();
        for factor in FACTORS {
            if (factor.applies)(&ctx) {
                total += factor.weight;
                factors.push(factor.name);
            }
        }

        CorruptionAssessment {
            message_id: message.id,
            score: total.clamp(0.0, 1.0),
            factors,
        }
    }
}

fn timeline(session: &Session) -> Vec<&Message> {
    let mut all: Vec<&Message> = session.messages().collect();
    all.sort_by(|a, b| chronological(a, b));
    all
}

/// Main-thread message closest in time to `message`, excluding itself.
fn nearest_main<'a>(session: &'a Session, message: &Message) -> Option<&'a Message> {
    session
        .main
        .as_ref()?
        .messages
        .iter()
        .filter(|m| m.id != message.id)
        .min_by(|a, b| {
            let da = (a.timestamp - message.timestamp).num_milliseconds().unsigned_abs();
            let db = (b.timestamp - message.timestamp).num_milliseconds().unsigned_abs();
            da.cmp(&db).then_with(|| chronological(a, b))
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
