//! Cached channel and user lookups that translate Slack IDs to display names.

use std::{sync::Arc, time::Duration};

use futures_util::future::join_all;

use crate::{lookup_cache::TtlCache, slack_api_client::SlackPlatform};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: String,
    pub display_name: String,
    pub real_name: String,
    pub avatar: String,
}

/// Channel name lookups plus bot channel membership.
pub struct ChannelDirectory {
    platform: Arc<dyn SlackPlatform>,
    cache: TtlCache<String, ChannelInfo>,
}

impl ChannelDirectory {
    pub fn new(platform: Arc<dyn SlackPlatform>, ttl: Duration) -> Self {
        Self {
            platform,
            cache: TtlCache::new(ttl),
        }
    }

    /// Falls back to `{id, name: id}` (uncached) when the lookup fails.
    pub async fn channel(&self, channel_id: &str) -> ChannelInfo {
        if let Some(cached) = self.cache.get(&channel_id.to_string()) {
            return cached;
        }

        match self.platform.resolve_channel(channel_id).await {
            Ok(resolved) => {
                let info = ChannelInfo {
                    id: channel_id.to_string(),
                    name: resolved
                        .name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| channel_id.to_string()),
                };
                self.cache.insert(channel_id.to_string(), info.clone());
                info
            }
            Err(error) => {
                tracing::warn!(channel_id, %error, "failed to resolve channel");
                ChannelInfo {
                    id: channel_id.to_string(),
                    name: channel_id.to_string(),
                }
            }
        }
    }

    pub async fn channel_name(&self, channel_id: &str) -> String {
        self.channel(channel_id).await.name
    }

    /// Joins a channel so its messages can be read. `already_in_channel`
    /// counts as success.
    pub async fn join_channel(&self, channel_id: &str) -> bool {
        match self.platform.join_channel(channel_id).await {
            Ok(()) => true,
            Err(error) if error.api_error_code() == Some("already_in_channel") => true,
            Err(error) => {
                tracing::warn!(channel_id, %error, "failed to join channel");
                false
            }
        }
    }

    pub async fn join_channels(&self, channel_ids: &[String]) -> Vec<bool> {
        join_all(
            channel_ids
                .iter()
                .map(|channel_id| self.join_channel(channel_id)),
        )
        .await
    }
}

/// User profile lookups.
pub struct UserDirectory {
    platform: Arc<dyn SlackPlatform>,
    cache: TtlCache<String, UserInfo>,
}

impl UserDirectory {
    pub fn new(platform: Arc<dyn SlackPlatform>, ttl: Duration) -> Self {
        Self {
            platform,
            cache: TtlCache::new(ttl),
        }
    }

    /// Falls back to the raw user ID (uncached) when the lookup fails.
    pub async fn user(&self, user_id: &str) -> UserInfo {
        if let Some(cached) = self.cache.get(&user_id.to_string()) {
            return cached;
        }

        match self.platform.resolve_user(user_id).await {
            Ok(profile) => {
                let real_name = non_empty(profile.real_name);
                let info = UserInfo {
                    id: user_id.to_string(),
                    display_name: non_empty(profile.display_name)
                        .or_else(|| real_name.clone())
                        .unwrap_or_else(|| user_id.to_string()),
                    real_name: real_name.unwrap_or_else(|| user_id.to_string()),
                    avatar: profile.image_48.unwrap_or_default(),
                };
                self.cache.insert(user_id.to_string(), info.clone());
                info
            }
            Err(error) => {
                tracing::warn!(user_id, %error, "failed to resolve user");
                UserInfo {
                    id: user_id.to_string(),
                    display_name: user_id.to_string(),
                    real_name: user_id.to_string(),
                    avatar: String::new(),
                }
            }
        }
    }

    pub async fn display_name(&self, user_id: &str) -> String {
        self.user(user_id).await.display_name
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}
