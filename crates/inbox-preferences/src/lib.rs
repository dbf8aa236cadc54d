//! Per-user support inbox preferences.
//!
//! Holds the `UserPreferences` record model, the `PreferencesStore` contract
//! consumed by the Slack runtime, and two store implementations: an in-memory
//! store and a JSON-file store that flushes on a debounced schedule.

mod file_store;
mod memory_store;
mod model;

pub use file_store::{JsonFilePreferencesStore, DEFAULT_PREFERENCES_FLUSH_DELAY};
pub use memory_store::InMemoryPreferencesStore;
pub use model::{PreferencesUpdate, SortOrder, UserPreferences};

use anyhow::Result;

/// Storage contract for per-user preferences.
///
/// Implementations own their records exclusively; callers only see clones.
pub trait PreferencesStore: Send + Sync {
    /// Returns the user's preferences, creating defaults for unknown users.
    fn get(&self, user_id: &str) -> UserPreferences;

    /// Merges `update` into the user's preferences and returns the result.
    fn set(&self, user_id: &str, update: PreferencesUpdate) -> UserPreferences;

    /// Returns users active within `window_ms` that monitor at least one channel.
    fn active_users(&self, window_ms: u64) -> Vec<String>;

    /// Persists pending changes. Stores without persistence succeed trivially.
    fn flush(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn is_active(prefs: &UserPreferences, window_ms: u64, now_unix_ms: u64) -> bool {
    let cutoff = now_unix_ms.saturating_sub(window_ms);
    prefs.last_active_ts >= cutoff && !prefs.monitored_channels.is_empty()
}
