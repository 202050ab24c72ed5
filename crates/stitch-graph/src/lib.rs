//! # stitch-graph
//!
//! Pure, synchronous analysis of one session's message set.
//!
//! - **Builder**: [`GraphBuilder`] turns a flat message list into a classified [`Session`](stitch_core::Session)
//! - **Similarity**: [`SimilarityStrategy`] with the token-set Jaccard baseline [`LexicalSimilarity`]
//! - **Scorer**: [`CorruptionScorer`], a table of weighted factors clamped to `[0, 1]`
//! - **Suggester**: [`CandidateSuggester`] ranks reattachment points for an orphan
//! - **Validator**: [`validate`] accepts or rejects a proposed re-parenting
//! - **Integrity**: [`integrity_report`] counts duplicates, dangling parents, cycles and repeated blocks
//!
//! Nothing here performs I/O; every function is safe to call speculatively.

#![deny(unsafe_code)]

pub mod builder;
mod forest;
pub mod integrity;
pub mod scorer;
pub mod similarity;
pub mod suggest;
pub mod validate;

pub use builder::GraphBuilder;
pub use integrity::integrity_report;
pub use scorer::{CorruptionAssessment, CorruptionScorer, ScoreContext};
pub use similarity::{LexicalSimilarity, SimilarityStrategy, jaccard, normalize_tokens};
pub use suggest::{Candidate, CandidateSuggester};
pub use validate::{Verdict, validate};

#[cfg(test)]
pub(crate) mod fixtures;
