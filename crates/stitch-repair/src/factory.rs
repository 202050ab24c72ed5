//! Build a ready [`RepairService`] from settings.

use std::path::PathBuf;
use std::sync::Arc;

use stitch_settings::{StitchSettings, StorageBackend, expand_home};
use stitch_store::{
    ConnectionConfig, EventSourcedProvider, JsonlMessageStore, MaterializedCache, MutationProvider,
    RepairEventStore,
};
use tracing::info;

use crate::errors::{RepairError, Result};
use crate::service::RepairService;

const DEFAULT_BACKUP_SUBDIR: &str = ".backups";

/// Open the backend named in `settings.storage.backend`.
pub fn open(settings: &StitchSettings) -> Result<RepairService> {
    settings.validate()?;
    match settings.storage.backend {
        StorageBackend::Mutation => open_mutation(settings),
        StorageBackend::EventSourced => open_event_sourced(settings),
    }
}

/// Service over session files rewritten in place.
pub fn open_mutation(settings: &StitchSettings) -> Result<RepairService> {
    let store = JsonlMessageStore::new(expand_home(&settings.storage.sessions_dir));
    let backup_dir = backup_dir(settings);
    info!(
        sessions_dir = %store.root().display(),
        backup_dir = %backup_dir.display(),
        "opened mutation backend"
    );
    let provider = MutationProvider::new(store, backup_dir);
    Ok(RepairService::new(Arc::new(provider), settings))
}

/// Service over read-only session files and a `SQLite` repair log.
pub fn open_event_sourced(settings: &StitchSettings) -> Result<RepairService> {
    let store = JsonlMessageStore::new(expand_home(&settings.storage.sessions_dir));
    let db_path = expand_home(&settings.storage.database_path);
    let events = RepairEventStore::open(&db_path, &ConnectionConfig::from(&settings.storage))
        .map_err(RepairError::Open)?;

    let mut provider = EventSourcedProvider::new(Arc::new(store), Arc::new(events));
    if settings.storage.cache_materialized {
        provider = provider.with_cache(Arc::new(MaterializedCache::new()));
    }
    info!(
        database = %db_path.display(),
        cache = settings.storage.cache_materialized,
        "opened event-sourced backend"
    );
    Ok(RepairService::event_sourced(
        Arc::new(provider),
        settings,
        Arc::new(stitch_graph::LexicalSimilarity),
    ))
}

fn backup_dir(settings: &StitchSettings) -> PathBuf {
    settings.storage.backup_dir.as_deref().map_or_else(
        || expand_home(&settings.storage.sessions_dir).join(DEFAULT_BACKUP_SUBDIR),
        expand_home,
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
