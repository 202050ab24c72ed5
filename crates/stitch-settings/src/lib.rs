//! # stitch-settings
//!
//! Configuration for the stitch repair engine.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StitchSettings::default()`]
//! 2. **User file**: `~/.stitch/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STITCH_*` overrides (highest priority)
//!
//! Settings are passed explicitly to the components that need them; there is
//! no global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, expand_home, load_settings, load_settings_from_path, settings_path};
pub use types::*;
