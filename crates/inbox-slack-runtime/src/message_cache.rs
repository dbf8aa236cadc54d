//! TTL cache of channel message lists with point lookup by `(channel, ts)`.
//!
//! Messages live once, in a store keyed by `(channel_id, ts)`. A cached
//! channel list is an ordered sequence of `ts` keys into that store, so a
//! point update (a reply arriving) is visible through both views without a
//! second write. Channel lists expire after `ttl`; individual entries after
//! `2 * ttl`, and every list write extends the entries it references so a
//! live list never points at an expired message.

use std::{
    collections::{HashMap, HashSet},
    sync::{Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use tokio::time::Instant;

use crate::message::InboxMessage;

pub const DEFAULT_MESSAGE_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MessageKey {
    channel_id: String,
    ts: String,
}

impl MessageKey {
    fn new(channel_id: &str, ts: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            ts: ts.to_string(),
        }
    }
}

#[derive(Debug)]
struct CachedMessage {
    message: InboxMessage,
    expires_at: Instant,
}

#[derive(Debug)]
struct CachedChannel {
    ts_keys: Vec<String>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct MessageCacheState {
    messages: HashMap<MessageKey, CachedMessage>,
    channels: HashMap<String, CachedChannel>,
}

#[derive(Debug)]
pub struct MessageCache {
    channel_ttl: Duration,
    message_ttl: Duration,
    state: Mutex<MessageCacheState>,
}

impl Default for MessageCache {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CACHE_TTL)
    }
}

impl MessageCache {
    pub fn new(channel_ttl: Duration) -> Self {
        Self {
            channel_ttl,
            message_ttl: channel_ttl.saturating_mul(2),
            state: Mutex::new(MessageCacheState::default()),
        }
    }

    pub fn channel_ttl(&self) -> Duration {
        self.channel_ttl
    }

    fn lock_state(&self) -> MutexGuard<'_, MessageCacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached list for `channel_id`, newest-first, or `None` when
    /// absent or expired.
    pub fn get_channel(&self, channel_id: &str) -> Option<Vec<InboxMessage>> {
        let now = Instant::now();
        let mut state = self.lock_state();
        let live = state
            .channels
            .get(channel_id)
            .is_some_and(|channel| channel.expires_at > now);
        if !live {
            state.channels.remove(channel_id);
            return None;
        }

        let state = &*state;
        let channel = state.channels.get(channel_id)?;
        Some(
            channel
                .ts_keys
                .iter()
                .filter_map(|ts| state.messages.get(&MessageKey::new(channel_id, ts)))
                .filter(|cached| cached.expires_at > now)
                .map(|cached| cached.message.clone())
                .collect(),
        )
    }

    /// Replaces the channel list; a full fetch overwrites individual entries.
    pub fn set_channel(&self, channel_id: &str, messages: Vec<InboxMessage>) {
        let now = Instant::now();
        let mut state = self.lock_state();
        purge_expired_locked(&mut state, now);

        let mut seen = HashSet::new();
        let mut ts_keys = Vec::with_capacity(messages.len());
        for message in messages {
            if !seen.insert(message.ts.clone()) {
                continue;
            }
            ts_keys.push(message.ts.clone());
            state.messages.insert(
                MessageKey::new(channel_id, &message.ts),
                CachedMessage {
                    message,
                    expires_at: now + self.message_ttl,
                },
            );
        }
        state.channels.insert(
            channel_id.to_string(),
            CachedChannel {
                ts_keys,
                expires_at: now + self.channel_ttl,
            },
        );
    }

    /// Puts `message` at the head of the channel list, replacing any entry
    /// with the same `ts`. An uncached channel gets a fresh one-element list.
    pub fn add_message(&self, channel_id: &str, message: InboxMessage) {
        let now = Instant::now();
        let mut state = self.lock_state();

        let mut ts_keys = match state.channels.remove(channel_id) {
            Some(channel) if channel.expires_at > now => channel.ts_keys,
            _ => Vec::new(),
        };
        ts_keys.retain(|ts| ts != &message.ts);
        ts_keys.insert(0, message.ts.clone());

        let message_expires_at = now + self.message_ttl;
        for ts in ts_keys.iter().skip(1) {
            if let Some(cached) = state.messages.get_mut(&MessageKey::new(channel_id, ts)) {
                cached.expires_at = cached.expires_at.max(message_expires_at);
            }
        }
        state.messages.insert(
            MessageKey::new(channel_id, &message.ts),
            CachedMessage {
                message,
                expires_at: message_expires_at,
            },
        );
        state.channels.insert(
            channel_id.to_string(),
            CachedChannel {
                ts_keys,
                expires_at: now + self.channel_ttl,
            },
        );
    }

    pub fn get_message(&self, channel_id: &str, ts: &str) -> Option<InboxMessage> {
        let now = Instant::now();
        let mut state = self.lock_state();
        let key = MessageKey::new(channel_id, ts);
        match state.messages.get(&key) {
            Some(cached) if cached.expires_at > now => Some(cached.message.clone()),
            Some(_) => {
                state.messages.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Sets reply state on a cached message. Returns `false` (and changes
    /// nothing) when the message is not cached.
    pub fn update_reply_count(
        &self,
        channel_id: &str,
        ts: &str,
        reply_count: u32,
        has_team_reply: bool,
    ) -> bool {
        self.with_live_message(channel_id, ts, |message| {
            message.reply_count = reply_count;
            message.has_team_reply = has_team_reply;
        })
        .is_some()
    }

    /// Counts one more team reply on a cached message and returns its new state.
    pub fn record_reply(&self, channel_id: &str, ts: &str) -> Option<InboxMessage> {
        self.with_live_message(channel_id, ts, |message| {
            message.reply_count = message.reply_count.saturating_add(1);
            message.has_team_reply = true;
        })
    }

    fn with_live_message<F>(&self, channel_id: &str, ts: &str, mutate: F) -> Option<InboxMessage>
    where
        F: FnOnce(&mut InboxMessage),
    {
        let now = Instant::now();
        let mut state = self.lock_state();
        let cached = state
            .messages
            .get_mut(&MessageKey::new(channel_id, ts))
            .filter(|cached| cached.expires_at > now)?;
        mutate(&mut cached.message);
        Some(cached.message.clone())
    }

    /// Drops the channel list only; individual entries stay so late reply
    /// updates still land.
    pub fn invalidate_channel(&self, channel_id: &str) {
        self.lock_state().channels.remove(channel_id);
    }

    pub fn flush(&self) {
        let mut state = self.lock_state();
        state.channels.clear();
        state.messages.clear();
    }

    pub fn purge_expired(&self) {
        let now = Instant::now();
        purge_expired_locked(&mut self.lock_state(), now);
    }

    /// Number of live channel lists.
    pub fn channel_count(&self) -> usize {
        let now = Instant::now();
        self.lock_state()
            .channels
            .values()
            .filter(|channel| channel.expires_at > now)
            .count()
    }

    /// Number of live individual message entries.
    pub fn message_count(&self) -> usize {
        let now = Instant::now();
        self.lock_state()
            .messages
            .values()
            .filter(|cached| cached.expires_at > now)
            .count()
    }
}

fn purge_expired_locked(state: &mut MessageCacheState, now: Instant) {
    state.channels.retain(|_, channel| channel.expires_at > now);
    state.messages.retain(|_, cached| cached.expires_at > now);
}
