//! # strand-settings
//!
//! Layered configuration for the strand agent core.
//!
//! Settings are loaded from three layers (in priority order):
//! 1. **Compiled defaults**: [`StrandSettings::default()`]
//! 2. **User file**: `~/.strand/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `STRAND_*` overrides (highest priority)

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{deep_merge, load_settings, load_settings_from_path, settings_path};
pub use types::*;

use std::sync::OnceLock;

/// Global settings singleton.
static SETTINGS: OnceLock<StrandSettings> = OnceLock::new();

/// Get the global settings instance.
///
/// On first call, loads `~/.strand/settings.json` with env overrides. If
/// loading fails, the failure is logged and compiled defaults are used.
pub fn get_settings() -> &'static StrandSettings {
    SETTINGS.get_or_init(|| {
        load_settings().unwrap_or_else(|e| {
            tracing::warn!(error = %e, category = e.category(), "failed to load settings, using defaults");
            StrandSettings::default()
        })
    })
}

/// Initialize the global settings with a specific value.
///
/// Returns the settings back if the global was already initialized.
#[allow(clippy::result_large_err)]
pub fn init_settings(settings: StrandSettings) -> std::result::Result<(), StrandSettings> {
    SETTINGS.set(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_path_is_under_home_dot_strand() {
        let path = settings_path();
        assert!(path.ends_with(".strand/settings.json"));
    }

    #[test]
    fn global_is_initialized_once() {
        let first = get_settings().clone();
        assert!(init_settings(StrandSettings::default()).is_err());
        assert_eq!(get_settings(), &first);
    }
}
