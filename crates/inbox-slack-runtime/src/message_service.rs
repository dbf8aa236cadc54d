//! Cache-or-fetch orchestration for inbox messages and inbound message events.

use std::{collections::BTreeSet, sync::Arc};

use futures_util::future::join_all;

use crate::{
    directory::{ChannelDirectory, UserDirectory},
    message::{sort_newest_first, InboxMessage, ThreadReply},
    message_cache::MessageCache,
    slack_api_client::{SlackHistoryMessage, SlackPlatform},
};

pub const DEFAULT_HISTORY_FETCH_LIMIT: usize = 50;
pub const DEFAULT_THREAD_REPLY_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageServiceConfig {
    pub history_fetch_limit: usize,
    pub thread_reply_limit: usize,
}

impl Default for MessageServiceConfig {
    fn default() -> Self {
        Self {
            history_fetch_limit: DEFAULT_HISTORY_FETCH_LIMIT,
            thread_reply_limit: DEFAULT_THREAD_REPLY_LIMIT,
        }
    }
}

/// Decides what the inbox shows for a set of channels.
///
/// Upstream failures never escape: a channel that cannot be fetched
/// contributes no messages.
pub struct MessageService {
    platform: Arc<dyn SlackPlatform>,
    cache: Arc<MessageCache>,
    users: Arc<UserDirectory>,
    channels: Arc<ChannelDirectory>,
    config: MessageServiceConfig,
}

impl MessageService {
    pub fn new(
        platform: Arc<dyn SlackPlatform>,
        cache: Arc<MessageCache>,
        users: Arc<UserDirectory>,
        channels: Arc<ChannelDirectory>,
        config: MessageServiceConfig,
    ) -> Self {
        Self {
            platform,
            cache,
            users,
            channels,
            config,
        }
    }

    pub fn cache(&self) -> &MessageCache {
        &self.cache
    }

    /// Messages for all `channel_ids`, newest first. Channels are fetched
    /// concurrently; completion order does not affect the result.
    pub async fn get_messages(&self, channel_ids: &[String]) -> Vec<InboxMessage> {
        let per_channel = join_all(
            channel_ids
                .iter()
                .map(|channel_id| self.get_channel_messages(channel_id)),
        )
        .await;
        let mut merged = per_channel.into_iter().flatten().collect::<Vec<_>>();
        sort_newest_first(&mut merged);
        merged
    }

    pub async fn get_channel_messages(&self, channel_id: &str) -> Vec<InboxMessage> {
        if let Some(cached) = self.cache.get_channel(channel_id) {
            tracing::debug!(channel_id, count = cached.len(), "message cache hit");
            return cached;
        }
        tracing::debug!(channel_id, "message cache miss");
        self.fetch_channel_messages(channel_id).await
    }

    /// Fetches recent history from Slack and replaces the cached list.
    pub async fn fetch_channel_messages(&self, channel_id: &str) -> Vec<InboxMessage> {
        let history = match self
            .platform
            .fetch_history(channel_id, self.config.history_fetch_limit)
            .await
        {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(channel_id, %error, "failed to fetch channel history");
                return Vec::new();
            }
        };

        let kept = history
            .into_iter()
            .filter_map(inbox_candidate)
            .collect::<Vec<_>>();

        let author_ids = kept
            .iter()
            .map(|candidate| candidate.user_id.clone())
            .collect::<BTreeSet<_>>();
        let (channel_name, _) = futures_util::join!(
            self.channels.channel_name(channel_id),
            join_all(author_ids.iter().map(|user_id| self.users.user(user_id)))
        );

        let mut messages = Vec::with_capacity(kept.len());
        for candidate in kept {
            let display_name = self.users.display_name(&candidate.user_id).await;
            messages.push(
                InboxMessage::new(
                    channel_id,
                    &channel_name,
                    &candidate.ts,
                    &candidate.user_id,
                    &display_name,
                    &candidate.text,
                )
                .with_replies(candidate.reply_count),
            );
        }

        tracing::debug!(channel_id, count = messages.len(), "fetched channel history");
        self.cache.set_channel(channel_id, messages.clone());
        messages
    }

    /// Applies an inbound message event to the cache.
    ///
    /// A thread reply (`thread_ts` present and different from `ts`) bumps the
    /// cached parent's reply count and returns `None`; a parent that is not
    /// cached is skipped. Anything else becomes a new inbox message.
    pub async fn process_new_message(
        &self,
        channel_id: &str,
        ts: &str,
        user_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Option<InboxMessage> {
        if let Some(thread_ts) = thread_ts.filter(|thread_ts| *thread_ts != ts) {
            match self.cache.record_reply(channel_id, thread_ts) {
                Some(parent) => tracing::debug!(
                    channel_id,
                    thread_ts,
                    reply_count = parent.reply_count,
                    "recorded thread reply"
                ),
                None => tracing::debug!(
                    channel_id,
                    thread_ts,
                    "dropped reply for uncached parent"
                ),
            }
            return None;
        }

        let (channel_name, display_name) = futures_util::join!(
            self.channels.channel_name(channel_id),
            self.users.display_name(user_id)
        );
        let message = InboxMessage::new(
            channel_id,
            &channel_name,
            ts,
            user_id,
            &display_name,
            text,
        );
        self.cache.add_message(channel_id, message.clone());
        Some(message)
    }

    /// Marks a cached parent as answered after the bot posted a reply for a
    /// responder. Returns `false` when the parent is not cached.
    pub fn record_team_reply(&self, channel_id: &str, thread_ts: &str) -> bool {
        self.cache.record_reply(channel_id, thread_ts).is_some()
    }

    /// Thread messages (parent first) for the reply modal.
    pub async fn get_thread_replies(&self, channel_id: &str, thread_ts: &str) -> Vec<ThreadReply> {
        let history = match self
            .platform
            .fetch_thread_replies(channel_id, thread_ts, self.config.thread_reply_limit)
            .await
        {
            Ok(history) => history,
            Err(error) => {
                tracing::warn!(channel_id, thread_ts, %error, "failed to fetch thread replies");
                return Vec::new();
            }
        };

        let mut replies = Vec::with_capacity(history.len());
        for entry in history {
            let (Some(user_id), Some(ts)) = (entry.user, entry.ts) else {
                continue;
            };
            let display_name = self.users.display_name(&user_id).await;
            replies.push(ThreadReply {
                user_id,
                display_name,
                text: entry.text.unwrap_or_default(),
                ts,
            });
        }
        replies
    }

    pub fn invalidate_channel(&self, channel_id: &str) {
        self.cache.invalidate_channel(channel_id);
    }
}

struct InboxCandidate {
    ts: String,
    user_id: String,
    text: String,
    reply_count: u32,
}

/// Keeps user-authored top-level posts: no subtype other than `file_share`,
/// and both an author and a timestamp.
fn inbox_candidate(entry: SlackHistoryMessage) -> Option<InboxCandidate> {
    if entry
        .subtype
        .as_deref()
        .is_some_and(|subtype| subtype != "file_share")
    {
        return None;
    }
    let ts = entry.ts.filter(|ts| !ts.trim().is_empty())?;
    let user_id = entry.user.filter(|user| !user.trim().is_empty())?;
    Some(InboxCandidate {
        ts,
        user_id,
        text: entry.text.unwrap_or_default(),
        reply_count: entry.reply_count.unwrap_or(0),
    })
}
