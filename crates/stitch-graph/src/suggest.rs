//! Candidate Suggester: ranked reattachment points for an orphan.

use std::sync::Arc;

use serde::Serialize;
use stitch_core::{Message, MessageId, Session, Thread};
use stitch_settings::SuggestSettings;
use tracing::debug;

use crate::similarity::{LexicalSimilarity, SimilarityStrategy};

/// A proposed parent for an orphan root.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    /// Candidate parent message.
    pub message_id: MessageId,
    /// Composite score in `[0, 1]`.
    pub confidence: f64,
}

/// Ranks Main and side-discussion messages as parents for an orphan.
///
/// `confidence = temporal_weight * 1 / (1 + |Δt| / window)
///             + lexical_weight * similarity`, clamped to `[0, 1]`.
#[derive(Clone)]
pub struct CandidateSuggester {
    settings: SuggestSettings,
    similarity: Arc<dyn SimilarityStrategy>,
}

impl Default for CandidateSuggester {
    fn default() -> Self {
        Self::new(SuggestSettings::default(), Arc::new(LexicalSimilarity))
    }
}

impl std::fmt::Debug for CandidateSuggester {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateSuggester")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl CandidateSuggester {
    /// Create a suggester.
    pub fn new(settings: SuggestSettings, similarity: Arc<dyn SimilarityStrategy>) -> Self {
        Self {
            settings,
            similarity,
        }
    }

    /// Composite score of attaching `orphan` under `candidate`.
    #[allow(clippy::cast_precision_loss)]
    pub fn score_pair(&self, orphan: &Message, candidate: &Message) -> f64 {
        let delta_secs = delta_ms(orphan, candidate) as f64 / 1000.0;
        let temporal = 1.0 / (1.0 + delta_secs / self.settings.window_secs);
        let lexical = self.similarity.similarity(orphan, candidate);
        (self.settings.temporal_weight * temporal + self.settings.lexical_weight * lexical)
            .clamp(0.0, 1.0)
    }

    /// Top candidates for the root of `thread`, best first.
    ///
    /// Candidates newer than the orphan root are skipped (the validator
    /// would refuse them). Returns an empty list when nothing clears
    /// `min_confidence`.
    pub fn suggest(&self, session: &Session, thread: &Thread) -> Vec<Candidate> {
        let Some(orphan) = thread.root() else {
            return Vec::new();
        };

        let pool = session
            .main
            .iter()
            .chain(session.side.iter())
            .filter(|t| t.thread_id != thread.thread_id)
            .flat_map(|t| t.messages.iter())
            .filter(|m| m.timestamp <= orphan.timestamp);

        let mut scored: Vec<(Candidate, u64)> = pool
            .map(|candidate| {
                let confidence = self.score_pair(orphan, candidate);
                (
                    Candidate {
                        message_id: candidate.id,
                        confidence,
                    },
                    delta_ms(orphan, candidate),
                )
            })
            .filter(|(c, _)| c.confidence > self.settings.min_confidence)
            .collect();

        scored.sort_by(|(a, da), (b, db)| {
            b.confidence
                .total_cmp(&a.confidence)
                .then(da.cmp(db))
                .then(a.message_id.cmp(&b.message_id))
        });
        scored.truncate(self.settings.top_k);

        debug!(
            orphan = %orphan.id,
            candidates = scored.len(),
            "ranked reattachment candidates"
        );
        scored.into_iter().map(|(c, _)| c).collect()
    }
}

fn delta_ms(a: &Message, b: &Message) -> u64 {
    (a.timestamp - b.timestamp).num_milliseconds().unsigned_abs()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{SessionFixture, scenario_one};

    #[test]
    fn scenario_one_ranks_closer_message_first() {
        let (fx, [a, b, _]) = scenario_one();
        let session = fx.build();
        let orphan = &session.orphans[0];
        let ranked = CandidateSuggester::default().suggest(&session, orphan);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].message_id, b);
        assert_eq!(ranked[1].message_id, a);
        assert!(ranked[0].confidence > ranked[1].confidence);
        assert!(ranked.iter().all(|c| (0.0..=1.0).contains(&c.confidence)));
    }

    #[test]
    fn later_candidates_are_skipped() {
        let mut fx = SessionFixture::new();
        let a = fx.root("alpha topic", 0);
        let b = fx.child(a, "alpha topic later", 100);
        let c = fx.root("alpha topic orphan", 50);
        let session = fx.build();
        let orphan = session.thread_of(c).unwrap();
        let ranked = CandidateSuggester::default().suggest(&session, orphan);
        assert!(ranked.iter().all(|cand| cand.message_id != b));
        assert_eq!(ranked[0].message_id, a);
    }

    #[test]
    fn nothing_above_floor_yields_empty() {
        let mut fx = SessionFixture::new();
        let a = fx.root("deploy kubernetes", 0);
        let _ = fx.child(a, "kubernetes deployed", 1);
        let _ = fx.root("banana bread", 86_400 * 30);
        let session = fx.build();
        let ranked = CandidateSuggester::default().suggest(&session, &session.orphans[0]);
        assert!(ranked.is_empty());
    }

    #[test]
    fn top_k_truncates() {
        let mut fx = SessionFixture::new();
        let mut parent = fx.root("step", 0);
        for i in 1..10 {
            parent = fx.child(parent, "step", i);
        }
        let _ = fx.root("step", 20);
        let session = fx.build();
        let suggester = CandidateSuggester::new(
            SuggestSettings {
                top_k: 3,
                ..SuggestSettings::default()
            },
            Arc::new(LexicalSimilarity),
        );
        let ranked = suggester.suggest(&session, &session.orphans[0]);
        assert_eq!(ranked.len(), 3);
        assert!(ranked.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    #[test]
    fn side_discussions_are_candidates() {
        let mut fx = SessionFixture::new();
        let a = fx.root("main", 0);
        let b = fx.child(a, "main", 1);
        let _ = fx.child(b, "main", 2);
        let side = fx.child(a, "side topic detail", 10);
        let c = fx.root("side topic detail", 11);
        let session = fx.build();
        let orphan = session.thread_of(c).unwrap();
        let ranked = CandidateSuggester::default().suggest(&session, orphan);
        assert_eq!(ranked[0].message_id, side);
    }

    #[test]
    fn score_pair_is_bounded() {
        let (fx, [a, _, c]) = scenario_one();
        let score = CandidateSuggester::default().score_pair(fx.get(c), fx.get(a));
        assert!(score > 0.6 && score <= 1.0);
    }
}
