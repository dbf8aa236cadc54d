use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use inbox_core::current_unix_timestamp_ms;

use crate::{is_active, PreferencesStore, PreferencesUpdate, UserPreferences};

/// Preferences store that keeps records in memory only.
#[derive(Debug, Default)]
pub struct InMemoryPreferencesStore {
    records: Mutex<BTreeMap<String, UserPreferences>>,
}

impl InMemoryPreferencesStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = UserPreferences>) -> Self {
        let records = records
            .into_iter()
            .map(|prefs| (prefs.user_id.clone(), prefs))
            .collect();
        Self {
            records: Mutex::new(records),
        }
    }
}

impl PreferencesStore for InMemoryPreferencesStore {
    fn get(&self, user_id: &str) -> UserPreferences {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .entry(user_id.to_string())
            .or_insert_with(|| UserPreferences::new(user_id))
            .clone()
    }

    fn set(&self, user_id: &str, update: PreferencesUpdate) -> UserPreferences {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let prefs = records
            .entry(user_id.to_string())
            .or_insert_with(|| UserPreferences::new(user_id));
        prefs.apply(update);
        prefs.clone()
    }

    fn active_users(&self, window_ms: u64) -> Vec<String> {
        let now_unix_ms = current_unix_timestamp_ms();
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        records
            .values()
            .filter(|prefs| is_active(prefs, window_ms, now_unix_ms))
            .map(|prefs| prefs.user_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use inbox_core::current_unix_timestamp_ms;

    use super::InMemoryPreferencesStore;
    use crate::{PreferencesStore, PreferencesUpdate, SortOrder};

    #[test]
    fn unit_get_creates_default_preferences_for_unknown_user() {
        let store = InMemoryPreferencesStore::new();
        let prefs = store.get("U1");
        assert_eq!(prefs.user_id, "U1");
        assert!(prefs.monitored_channels.is_empty());
        assert_eq!(prefs.sort_order, SortOrder::Newest);
    }

    #[test]
    fn functional_active_users_filters_by_window_and_monitored_channels() {
        let store = InMemoryPreferencesStore::new();
        let now = current_unix_timestamp_ms();
        store.set(
            "U_ACTIVE",
            PreferencesUpdate {
                monitored_channels: Some(vec!["C1".to_string()]),
                last_active_ts: Some(now),
                ..PreferencesUpdate::default()
            },
        );
        store.set(
            "U_STALE",
            PreferencesUpdate {
                monitored_channels: Some(vec!["C1".to_string()]),
                last_active_ts: Some(now.saturating_sub(20 * 60 * 1_000)),
                ..PreferencesUpdate::default()
            },
        );
        store.set(
            "U_NO_CHANNELS",
            PreferencesUpdate {
                last_active_ts: Some(now),
                ..PreferencesUpdate::default()
            },
        );

        assert_eq!(store.active_users(10 * 60 * 1_000), vec!["U_ACTIVE"]);
    }
}
