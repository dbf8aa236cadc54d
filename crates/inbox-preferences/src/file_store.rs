use std::{
    collections::BTreeMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use anyhow::{Context, Result};
use inbox_core::{current_unix_timestamp_ms, write_text_atomic};

use crate::{is_active, PreferencesStore, PreferencesUpdate, UserPreferences};

pub const DEFAULT_PREFERENCES_FLUSH_DELAY: Duration = Duration::from_millis(2_000);

/// Preferences store backed by a JSON array file.
///
/// Mutations schedule one flush after `flush_delay`; further mutations inside
/// that window ride along with the pending flush.
#[derive(Clone)]
pub struct JsonFilePreferencesStore {
    inner: Arc<FileStoreInner>,
}

struct FileStoreInner {
    path: PathBuf,
    flush_delay: Duration,
    state: Mutex<FileStoreState>,
}

#[derive(Default)]
struct FileStoreState {
    records: BTreeMap<String, UserPreferences>,
    flush_scheduled: bool,
}

impl JsonFilePreferencesStore {
    /// Loads records from `path`. A missing, unreadable or corrupt file yields
    /// an empty store.
    pub fn load(path: PathBuf, flush_delay: Duration) -> Self {
        let records = match read_records(&path) {
            Ok(Some(records)) => {
                tracing::info!(
                    path = %path.display(),
                    count = records.len(),
                    "loaded user preferences"
                );
                records
            }
            Ok(None) => BTreeMap::new(),
            Err(error) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %format!("{error:#}"),
                    "failed to load preferences file, starting fresh"
                );
                BTreeMap::new()
            }
        };

        Self {
            inner: Arc::new(FileStoreInner {
                path,
                flush_delay,
                state: Mutex::new(FileStoreState {
                    records,
                    flush_scheduled: false,
                }),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn len(&self) -> usize {
        self.inner.lock_state().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn schedule_flush(&self) {
        {
            let mut state = self.inner.lock_state();
            if state.flush_scheduled {
                return;
            }
            state.flush_scheduled = true;
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let inner = Arc::clone(&self.inner);
                handle.spawn(async move {
                    tokio::time::sleep(inner.flush_delay).await;
                    if let Err(error) = inner.write_to_disk() {
                        tracing::warn!(
                            path = %inner.path.display(),
                            error = %format!("{error:#}"),
                            "failed to save preferences"
                        );
                    }
                });
            }
            Err(_) => {
                if let Err(error) = self.inner.write_to_disk() {
                    tracing::warn!(
                        path = %self.inner.path.display(),
                        error = %format!("{error:#}"),
                        "failed to save preferences"
                    );
                }
            }
        }
    }
}

impl FileStoreInner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, FileStoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_to_disk(&self) -> Result<()> {
        let payload = {
            let mut state = self.lock_state();
            state.flush_scheduled = false;
            let records = state.records.values().collect::<Vec<_>>();
            serde_json::to_string_pretty(&records).context("failed to serialize preferences")?
        };
        write_text_atomic(&self.path, &payload)
            .with_context(|| format!("failed to write preferences {}", self.path.display()))
    }
}

impl PreferencesStore for JsonFilePreferencesStore {
    fn get(&self, user_id: &str) -> UserPreferences {
        let (prefs, created) = {
            let mut state = self.inner.lock_state();
            match state.records.get(user_id) {
                Some(existing) => (existing.clone(), false),
                None => {
                    let prefs = UserPreferences::new(user_id);
                    state.records.insert(user_id.to_string(), prefs.clone());
                    (prefs, true)
                }
            }
        };
        if created {
            self.schedule_flush();
        }
        prefs
    }

    fn set(&self, user_id: &str, update: PreferencesUpdate) -> UserPreferences {
        let updated = {
            let mut state = self.inner.lock_state();
            let prefs = state
                .records
                .entry(user_id.to_string())
                .or_insert_with(|| UserPreferences::new(user_id));
            prefs.apply(update);
            prefs.clone()
        };
        self.schedule_flush();
        updated
    }

    fn active_users(&self, window_ms: u64) -> Vec<String> {
        let now_unix_ms = current_unix_timestamp_ms();
        let state = self.inner.lock_state();
        state
            .records
            .values()
            .filter(|prefs| is_active(prefs, window_ms, now_unix_ms))
            .map(|prefs| prefs.user_id.clone())
            .collect()
    }

    fn flush(&self) -> Result<()> {
        self.inner.write_to_disk()
    }
}

fn read_records(path: &Path) -> Result<Option<BTreeMap<String, UserPreferences>>> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read preferences file {}", path.display()))?;
    let entries = serde_json::from_str::<Vec<UserPreferences>>(&raw)
        .with_context(|| format!("failed to parse preferences file {}", path.display()))?;
    Ok(Some(
        entries
            .into_iter()
            .map(|prefs| (prefs.user_id.clone(), prefs))
            .collect(),
    ))
}
