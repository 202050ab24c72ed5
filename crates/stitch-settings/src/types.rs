//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a partial
//! JSON file only has to name the values it changes.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StitchSettings {
    /// Settings schema version.
    pub version: String,
    /// Corruption scorer thresholds.
    pub scoring: ScoringSettings,
    /// Candidate suggester parameters.
    pub suggest: SuggestSettings,
    /// Graph classification options.
    pub graph: GraphSettings,
    /// Persistence backend and paths.
    pub storage: StorageSettings,
    /// Log output.
    pub logging: LoggingSettings,
}

impl Default for StitchSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            scoring: ScoringSettings::default(),
            suggest: SuggestSettings::default(),
            graph: GraphSettings::default(),
            storage: StorageSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl StitchSettings {
    /// Check every bounded value.
    pub fn validate(&self) -> Result<()> {
        check_unit("scoring.lowSimilarityThreshold", self.scoring.low_similarity_threshold)?;
        check_unit("suggest.minConfidence", self.suggest.min_confidence)?;
        check_unit("suggest.temporalWeight", self.suggest.temporal_weight)?;
        check_unit("suggest.lexicalWeight", self.suggest.lexical_weight)?;
        if self.suggest.top_k == 0 {
            return Err(SettingsError::InvalidValue(
                "suggest.topK must be at least 1".into(),
            ));
        }
        if !(self.suggest.window_secs.is_finite() && self.suggest.window_secs > 0.0) {
            return Err(SettingsError::InvalidValue(format!(
                "suggest.windowSecs must be positive, got {}",
                self.suggest.window_secs
            )));
        }
        if self.storage.pool_size == 0 {
            return Err(SettingsError::InvalidValue(
                "storage.poolSize must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SettingsError::InvalidValue(format!(
            "{name} must be within [0, 1], got {value}"
        )))
    }
}

/// Corruption scorer thresholds.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoringSettings {
    /// Gap to the preceding message that signals an interrupted resume.
    pub resume_epsilon_ms: u64,
    /// Jaccard similarity below which an orphan counts as off-topic.
    pub low_similarity_threshold: f64,
}

impl Default for ScoringSettings {
    fn default() -> Self {
        Self {
            resume_epsilon_ms: 2000,
            low_similarity_threshold: 0.15,
        }
    }
}

/// Candidate suggester parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SuggestSettings {
    /// Temporal proximity window in seconds.
    pub window_secs: f64,
    /// Maximum candidates returned.
    pub top_k: usize,
    /// Candidates at or below this confidence are never offered.
    pub min_confidence: f64,
    /// Weight of temporal proximity in the composite score.
    pub temporal_weight: f64,
    /// Weight of lexical similarity in the composite score.
    pub lexical_weight: f64,
}

impl Default for SuggestSettings {
    fn default() -> Self {
        Self {
            window_secs: 300.0,
            top_k: 5,
            min_confidence: 0.1,
            temporal_weight: 0.6,
            lexical_weight: 0.4,
        }
    }
}

/// Graph classification options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GraphSettings {
    /// Extra record fields that may carry a reference back to the main
    /// thread (checked on detached components).
    pub rejoin_reference_fields: Vec<String>,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            rejoin_reference_fields: vec![
                "logicalParentUuid".to_string(),
                "logical_parent_id".to_string(),
                "rejoin_id".to_string(),
            ],
        }
    }
}

/// Which persistence provider to use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageBackend {
    /// Rewrite session files in place, with file backups.
    Mutation,
    /// Append repair events to a `SQLite` log and replay on load.
    EventSourced,
}

/// Persistence backend and paths.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Selected backend.
    pub backend: StorageBackend,
    /// Directory holding `<session_id>.jsonl` files.
    pub sessions_dir: String,
    /// Backup directory (mutation backend). Defaults to `<sessionsDir>/.backups`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<String>,
    /// Repair event database (event-sourced backend).
    pub database_path: String,
    /// Connection pool size.
    pub pool_size: u32,
    /// `SQLite` busy timeout in milliseconds.
    pub busy_timeout_ms: u32,
    /// Cache materialized message sets between loads.
    pub cache_materialized: bool,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::EventSourced,
            sessions_dir: "~/.stitch/sessions".to_string(),
            backup_dir: None,
            database_path: "~/.stitch/repairs.db".to_string(),
            pool_size: 4,
            busy_timeout_ms: 30_000,
            cache_materialized: true,
        }
    }
}

/// Log output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
