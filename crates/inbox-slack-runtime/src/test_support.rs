//! In-process `SlackPlatform` double shared by unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::slack_api_client::{
    SlackApiError, SlackChannelInfo, SlackHistoryMessage, SlackPlatform, SlackPostedMessage,
    SlackUserProfile,
};

pub(crate) fn history_message(ts: &str, user: &str, text: &str) -> SlackHistoryMessage {
    SlackHistoryMessage {
        ts: Some(ts.to_string()),
        user: Some(user.to_string()),
        text: Some(text.to_string()),
        ..SlackHistoryMessage::default()
    }
}

fn scripted_failure(method: &str) -> SlackApiError {
    SlackApiError::Api {
        method: method.to_string(),
        code: "fatal_error".to_string(),
    }
}

#[derive(Default)]
pub(crate) struct FakeSlackPlatform {
    history: Mutex<HashMap<String, Vec<SlackHistoryMessage>>>,
    history_delays: Mutex<HashMap<String, Duration>>,
    replies: Mutex<HashMap<String, Vec<SlackHistoryMessage>>>,
    users: Mutex<HashMap<String, SlackUserProfile>>,
    channels: Mutex<HashMap<String, String>>,
    failures: Mutex<HashSet<String>>,
    join_error_codes: Mutex<HashMap<String, String>>,
    published: Mutex<Vec<(String, Value)>>,
    opened: Mutex<Vec<(String, Value)>>,
    posted: Mutex<Vec<(String, String, Option<String>)>>,
    joined: Mutex<Vec<String>>,
    history_calls: AtomicUsize,
    user_calls: AtomicUsize,
    channel_calls: AtomicUsize,
}

impl FakeSlackPlatform {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_history(self, channel_id: &str, messages: Vec<SlackHistoryMessage>) -> Self {
        self.history
            .lock()
            .expect("history lock")
            .insert(channel_id.to_string(), messages);
        self
    }

    pub(crate) fn with_history_delay(self, channel_id: &str, delay: Duration) -> Self {
        self.history_delays
            .lock()
            .expect("delay lock")
            .insert(channel_id.to_string(), delay);
        self
    }

    pub(crate) fn with_replies(
        self,
        channel_id: &str,
        thread_ts: &str,
        messages: Vec<SlackHistoryMessage>,
    ) -> Self {
        self.replies
            .lock()
            .expect("replies lock")
            .insert(format!("{channel_id}:{thread_ts}"), messages);
        self
    }

    pub(crate) fn with_user(self, user_id: &str, display_name: &str) -> Self {
        self.users.lock().expect("users lock").insert(
            user_id.to_string(),
            SlackUserProfile {
                display_name: Some(display_name.to_string()),
                real_name: Some(format!("{display_name} (real)")),
                image_48: None,
            },
        );
        self
    }

    pub(crate) fn with_channel(self, channel_id: &str, name: &str) -> Self {
        self.channels
            .lock()
            .expect("channels lock")
            .insert(channel_id.to_string(), name.to_string());
        self
    }

    pub(crate) fn with_join_error(self, channel_id: &str, code: &str) -> Self {
        self.join_error_codes
            .lock()
            .expect("join lock")
            .insert(channel_id.to_string(), code.to_string());
        self
    }

    /// Makes calls fail; keys look like `history:C1`, `user:U1`, `publish:U1`.
    pub(crate) fn fail(&self, key: &str) {
        self.failures
            .lock()
            .expect("failures lock")
            .insert(key.to_string());
    }

    fn should_fail(&self, key: &str) -> bool {
        self.failures.lock().expect("failures lock").contains(key)
    }

    pub(crate) fn published_users(&self) -> Vec<String> {
        self.published
            .lock()
            .expect("published lock")
            .iter()
            .map(|(user_id, _)| user_id.clone())
            .collect()
    }

    pub(crate) fn last_published_view(&self, user_id: &str) -> Option<Value> {
        self.published
            .lock()
            .expect("published lock")
            .iter()
            .rev()
            .find(|(published_user, _)| published_user == user_id)
            .map(|(_, view)| view.clone())
    }

    pub(crate) fn opened_views(&self) -> Vec<(String, Value)> {
        self.opened.lock().expect("opened lock").clone()
    }

    pub(crate) fn posted_messages(&self) -> Vec<(String, String, Option<String>)> {
        self.posted.lock().expect("posted lock").clone()
    }

    pub(crate) fn joined_channels(&self) -> Vec<String> {
        self.joined.lock().expect("joined lock").clone()
    }

    pub(crate) fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn user_calls(&self) -> usize {
        self.user_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn channel_calls(&self) -> usize {
        self.channel_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlackPlatform for FakeSlackPlatform {
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let delay = self
            .history_delays
            .lock()
            .expect("delay lock")
            .get(channel_id)
            .copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail(&format!("history:{channel_id}")) {
            return Err(scripted_failure("conversations.history"));
        }
        let mut messages = self
            .history
            .lock()
            .expect("history lock")
            .get(channel_id)
            .cloned()
            .unwrap_or_default();
        messages.truncate(limit);
        Ok(messages)
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError> {
        if self.should_fail(&format!("replies:{channel_id}")) {
            return Err(scripted_failure("conversations.replies"));
        }
        let mut messages = self
            .replies
            .lock()
            .expect("replies lock")
            .get(&format!("{channel_id}:{thread_ts}"))
            .cloned()
            .unwrap_or_default();
        messages.truncate(limit);
        Ok(messages)
    }

    async fn resolve_user(&self, user_id: &str) -> Result<SlackUserProfile, SlackApiError> {
        self.user_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(&format!("user:{user_id}")) {
            return Err(scripted_failure("users.info"));
        }
        self.users
            .lock()
            .expect("users lock")
            .get(user_id)
            .cloned()
            .ok_or_else(|| SlackApiError::Api {
                method: "users.info".to_string(),
                code: "user_not_found".to_string(),
            })
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<SlackChannelInfo, SlackApiError> {
        self.channel_calls.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(&format!("channel:{channel_id}")) {
            return Err(scripted_failure("conversations.info"));
        }
        let name = self
            .channels
            .lock()
            .expect("channels lock")
            .get(channel_id)
            .cloned();
        Ok(SlackChannelInfo {
            id: channel_id.to_string(),
            name,
        })
    }

    async fn join_channel(&self, channel_id: &str) -> Result<(), SlackApiError> {
        let code = self
            .join_error_codes
            .lock()
            .expect("join lock")
            .get(channel_id)
            .cloned();
        if let Some(code) = code {
            return Err(SlackApiError::Api {
                method: "conversations.join".to_string(),
                code,
            });
        }
        self.joined
            .lock()
            .expect("joined lock")
            .push(channel_id.to_string());
        Ok(())
    }

    async fn publish_view(&self, user_id: &str, view: &Value) -> Result<(), SlackApiError> {
        if self.should_fail(&format!("publish:{user_id}")) {
            return Err(scripted_failure("views.publish"));
        }
        self.published
            .lock()
            .expect("published lock")
            .push((user_id.to_string(), view.clone()));
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &Value) -> Result<(), SlackApiError> {
        self.opened
            .lock()
            .expect("opened lock")
            .push((trigger_id.to_string(), view.clone()));
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostedMessage, SlackApiError> {
        if self.should_fail(&format!("post:{channel_id}")) {
            return Err(scripted_failure("chat.postMessage"));
        }
        self.posted.lock().expect("posted lock").push((
            channel_id.to_string(),
            text.to_string(),
            thread_ts.map(ToOwned::to_owned),
        ));
        Ok(SlackPostedMessage {
            channel: channel_id.to_string(),
            ts: "9999.0001".to_string(),
        })
    }
}
