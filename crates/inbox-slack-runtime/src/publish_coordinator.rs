//! Home-tab publishing: immediate for direct actions, debounced per user for
//! background updates.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use inbox_preferences::PreferencesStore;
use serde_json::Value;

use crate::{debouncer::Debouncer, slack_api_client::SlackPlatform};

pub const DEFAULT_PUBLISH_DEBOUNCE_MS: u64 = 3_000;
pub const DEFAULT_ACTIVE_WINDOW_MS: u64 = 10 * 60 * 1_000;

/// Renders the Home-tab document for one user.
#[async_trait]
pub trait HomeViewBuilder: Send + Sync {
    async fn build_home_view(&self, user_id: &str) -> anyhow::Result<Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishConfig {
    pub debounce_ms: u64,
    pub active_window_ms: u64,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_PUBLISH_DEBOUNCE_MS,
            active_window_ms: DEFAULT_ACTIVE_WINDOW_MS,
        }
    }
}

struct Publisher {
    platform: Arc<dyn SlackPlatform>,
    builder: Arc<dyn HomeViewBuilder>,
}

impl Publisher {
    async fn publish(&self, user_id: &str) -> bool {
        let view = match self.builder.build_home_view(user_id).await {
            Ok(view) => view,
            Err(error) => {
                tracing::warn!(user_id, error = %format!("{error:#}"), "failed to build home view");
                return false;
            }
        };
        match self.platform.publish_view(user_id, &view).await {
            Ok(()) => {
                tracing::debug!(user_id, "published home view");
                true
            }
            Err(error) => {
                tracing::warn!(user_id, %error, "failed to publish home view");
                false
            }
        }
    }
}

pub struct PublishCoordinator {
    publisher: Arc<Publisher>,
    preferences: Arc<dyn PreferencesStore>,
    debouncer: Debouncer,
    config: PublishConfig,
}

impl PublishCoordinator {
    pub fn new(
        platform: Arc<dyn SlackPlatform>,
        builder: Arc<dyn HomeViewBuilder>,
        preferences: Arc<dyn PreferencesStore>,
        config: PublishConfig,
    ) -> Self {
        Self {
            publisher: Arc::new(Publisher { platform, builder }),
            preferences,
            debouncer: Debouncer::new(Duration::from_millis(config.debounce_ms)),
            config,
        }
    }

    pub fn config(&self) -> PublishConfig {
        self.config
    }

    /// Builds and publishes the user's Home tab right away. Failures are
    /// logged and reported as `false`; they never reach the caller as errors.
    pub async fn publish_now(&self, user_id: &str) -> bool {
        self.publisher.publish(user_id).await
    }

    /// Publishes after the debounce window, coalescing repeated calls per user.
    pub fn publish_debounced(&self, user_id: &str) {
        let publisher = Arc::clone(&self.publisher);
        let owned_user_id = user_id.to_string();
        self.debouncer.debounce(user_id, move || async move {
            publisher.publish(&owned_user_id).await;
        });
        tracing::debug!(user_id, delay_ms = self.config.debounce_ms, "scheduled debounced publish");
    }

    /// Schedules a debounced publish for every recently active user that
    /// monitors `channel_id`, and returns those users.
    pub fn publish_to_active_users_for_channel(&self, channel_id: &str) -> Vec<String> {
        let scheduled = self
            .preferences
            .active_users(self.config.active_window_ms)
            .into_iter()
            .filter(|user_id| self.preferences.get(user_id).monitors(channel_id))
            .collect::<Vec<_>>();
        for user_id in &scheduled {
            self.publish_debounced(user_id);
        }
        if !scheduled.is_empty() {
            tracing::debug!(channel_id, users = scheduled.len(), "fan-out publish");
        }
        scheduled
    }

    pub fn pending_publishes(&self) -> usize {
        self.debouncer.pending_count()
    }

    /// Cancels every pending debounced publish without running it.
    pub fn shutdown(&self) {
        let cancelled = self.debouncer.cancel_all();
        tracing::info!(cancelled, "publish coordinator stopped");
    }
}
