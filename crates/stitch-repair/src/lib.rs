//! # stitch-repair
//!
//! Repair orchestration for corrupted conversation sessions.
//!
//! - **Executor**: [`RepairExecutor`] runs one repair through
//!   `Proposed -> Validated -> Persisted -> Materialized`
//! - **Service**: [`RepairService`], the caller-facing API
//!   (`build_session`, `suggest_repairs`, `preview_repair`, `propose_repair`, `undo_last`)
//! - **Factory**: [`open`], [`open_mutation`], [`open_event_sourced`] build a
//!   service from [`StitchSettings`](stitch_settings::StitchSettings)

#![deny(unsafe_code)]

pub mod errors;
pub mod executor;
pub mod factory;
pub mod service;

pub use errors::{RepairError, Result};
pub use executor::{RepairExecutor, RepairOutcome, RepairRequest, RepairState};
pub use factory::{open, open_event_sourced, open_mutation};
pub use service::RepairService;
