//! Slack Web API client and the platform contract the inbox core consumes.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::slack_helpers::{
    is_retryable_slack_status, is_retryable_transport_error, parse_retry_after, retry_delay,
    truncate_for_slack,
};

#[derive(Debug, Error)]
/// Failures surfaced by Slack Web API calls.
pub enum SlackApiError {
    #[error("slack api {method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api {method} failed with status {status}: {body}")]
    HttpStatus {
        method: String,
        status: u16,
        body: String,
    },
    #[error("slack api {method} returned error: {code}")]
    Api { method: String, code: String },
    #[error("failed to decode slack {method} response: {source}")]
    Decode {
        method: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("slack api {method} response missing {field}")]
    MissingField { method: String, field: &'static str },
}

impl SlackApiError {
    /// Slack's `error` code for `ok: false` responses.
    pub fn api_error_code(&self) -> Option<&str> {
        match self {
            Self::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
/// Raw message entry returned by `conversations.history` / `conversations.replies`.
pub struct SlackHistoryMessage {
    #[serde(default)]
    pub ts: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
    #[serde(default)]
    pub thread_ts: Option<String>,
    #[serde(default)]
    pub reply_count: Option<u32>,
    #[serde(default)]
    pub bot_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackUserProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub image_48: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SlackChannelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlackPostedMessage {
    pub channel: String,
    pub ts: String,
}

#[async_trait]
/// Chat platform operations used by the inbox. Every call is fallible and
/// rate limited upstream; callers decide how failures degrade.
pub trait SlackPlatform: Send + Sync {
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError>;

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError>;

    async fn resolve_user(&self, user_id: &str) -> Result<SlackUserProfile, SlackApiError>;

    async fn resolve_channel(&self, channel_id: &str) -> Result<SlackChannelInfo, SlackApiError>;

    async fn join_channel(&self, channel_id: &str) -> Result<(), SlackApiError>;

    async fn publish_view(&self, user_id: &str, view: &Value) -> Result<(), SlackApiError>;

    async fn open_view(&self, trigger_id: &str, view: &Value) -> Result<(), SlackApiError>;

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostedMessage, SlackApiError>;
}

#[derive(Debug, Deserialize)]
struct SlackEnvelope<T> {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    body: T,
}

#[derive(Debug, Default, Deserialize)]
struct SlackEmptyBody {}

#[derive(Debug, Default, Deserialize)]
struct SlackMessagesBody {
    #[serde(default)]
    messages: Vec<SlackHistoryMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserInfoBody {
    #[serde(default)]
    user: Option<SlackUserInfoUser>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackUserInfoUser {
    #[serde(default)]
    profile: SlackUserProfile,
}

#[derive(Debug, Default, Deserialize)]
struct SlackChannelInfoBody {
    #[serde(default)]
    channel: Option<SlackChannelInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackPostMessageBody {
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    channel: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackAuthTestBody {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct SlackOpenSocketBody {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone)]
/// Connection settings for `SlackApiClient`.
pub struct SlackApiClientConfig {
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    /// Total attempts per call; `1` disables transport-level retries.
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

#[derive(Clone)]
pub struct SlackApiClient {
    http: reqwest::Client,
    api_base: String,
    app_token: String,
    bot_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl SlackApiClient {
    pub fn new(config: SlackApiClientConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("support-inbox"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .context("failed to create slack api client")?;

        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            app_token: config.app_token.trim().to_string(),
            bot_token: config.bot_token.trim().to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    pub async fn resolve_bot_user_id(&self) -> Result<String, SlackApiError> {
        let body: SlackAuthTestBody = self
            .call("auth.test", || {
                self.http
                    .post(self.url("auth.test"))
                    .bearer_auth(&self.bot_token)
            })
            .await?;
        body.user_id
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SlackApiError::MissingField {
                method: "auth.test".to_string(),
                field: "user_id",
            })
    }

    pub async fn open_socket_connection(&self) -> Result<String, SlackApiError> {
        let body: SlackOpenSocketBody = self
            .call("apps.connections.open", || {
                self.http
                    .post(self.url("apps.connections.open"))
                    .bearer_auth(&self.app_token)
            })
            .await?;
        body.url
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| SlackApiError::MissingField {
                method: "apps.connections.open".to_string(),
                field: "url",
            })
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{method}", self.api_base)
    }

    async fn call<T, F>(&self, method: &str, mut builder: F) -> Result<T, SlackApiError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header("x-inbox-retry-attempt", attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let envelope = response.json::<SlackEnvelope<T>>().await.map_err(
                            |source| SlackApiError::Decode {
                                method: method.to_string(),
                                source,
                            },
                        )?;
                        if !envelope.ok {
                            return Err(SlackApiError::Api {
                                method: method.to_string(),
                                code: envelope
                                    .error
                                    .unwrap_or_else(|| "unknown_error".to_string()),
                            });
                        }
                        return Ok(envelope.body);
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    if attempt < self.retry_max_attempts
                        && is_retryable_slack_status(status.as_u16())
                    {
                        tokio::time::sleep(retry_delay(
                            self.retry_base_delay_ms,
                            attempt,
                            retry_after,
                        ))
                        .await;
                        continue;
                    }

                    return Err(SlackApiError::HttpStatus {
                        method: method.to_string(),
                        status: status.as_u16(),
                        body: truncate_for_slack(&body, 800),
                    });
                }
                Err(error) => {
                    if attempt < self.retry_max_attempts && is_retryable_transport_error(&error) {
                        tokio::time::sleep(retry_delay(self.retry_base_delay_ms, attempt, None))
                            .await;
                        continue;
                    }
                    return Err(SlackApiError::Transport {
                        method: method.to_string(),
                        source: error,
                    });
                }
            }
        }
    }
}

#[async_trait]
impl SlackPlatform for SlackApiClient {
    async fn fetch_history(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError> {
        let limit = limit.to_string();
        let body: SlackMessagesBody = self
            .call("conversations.history", || {
                self.http
                    .get(self.url("conversations.history"))
                    .bearer_auth(&self.bot_token)
                    .query(&[("channel", channel_id), ("limit", limit.as_str())])
            })
            .await?;
        Ok(body.messages)
    }

    async fn fetch_thread_replies(
        &self,
        channel_id: &str,
        thread_ts: &str,
        limit: usize,
    ) -> Result<Vec<SlackHistoryMessage>, SlackApiError> {
        let limit = limit.to_string();
        let body: SlackMessagesBody = self
            .call("conversations.replies", || {
                self.http
                    .get(self.url("conversations.replies"))
                    .bearer_auth(&self.bot_token)
                    .query(&[
                        ("channel", channel_id),
                        ("ts", thread_ts),
                        ("limit", limit.as_str()),
                    ])
            })
            .await?;
        Ok(body.messages)
    }

    async fn resolve_user(&self, user_id: &str) -> Result<SlackUserProfile, SlackApiError> {
        let body: SlackUserInfoBody = self
            .call("users.info", || {
                self.http
                    .get(self.url("users.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&[("user", user_id)])
            })
            .await?;
        body.user
            .map(|user| user.profile)
            .ok_or_else(|| SlackApiError::MissingField {
                method: "users.info".to_string(),
                field: "user",
            })
    }

    async fn resolve_channel(&self, channel_id: &str) -> Result<SlackChannelInfo, SlackApiError> {
        let body: SlackChannelInfoBody = self
            .call("conversations.info", || {
                self.http
                    .get(self.url("conversations.info"))
                    .bearer_auth(&self.bot_token)
                    .query(&[("channel", channel_id)])
            })
            .await?;
        body.channel.ok_or_else(|| SlackApiError::MissingField {
            method: "conversations.info".to_string(),
            field: "channel",
        })
    }

    async fn join_channel(&self, channel_id: &str) -> Result<(), SlackApiError> {
        let payload = json!({ "channel": channel_id });
        let _: SlackEmptyBody = self
            .call("conversations.join", || {
                self.http
                    .post(self.url("conversations.join"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn publish_view(&self, user_id: &str, view: &Value) -> Result<(), SlackApiError> {
        let payload = json!({ "user_id": user_id, "view": view });
        let _: SlackEmptyBody = self
            .call("views.publish", || {
                self.http
                    .post(self.url("views.publish"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn open_view(&self, trigger_id: &str, view: &Value) -> Result<(), SlackApiError> {
        let payload = json!({ "trigger_id": trigger_id, "view": view });
        let _: SlackEmptyBody = self
            .call("views.open", || {
                self.http
                    .post(self.url("views.open"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;
        Ok(())
    }

    async fn post_message(
        &self,
        channel_id: &str,
        text: &str,
        thread_ts: Option<&str>,
    ) -> Result<SlackPostedMessage, SlackApiError> {
        let mut payload = json!({
            "channel": channel_id,
            "text": text,
        });
        if let Some(thread_ts) = thread_ts.map(str::trim).filter(|value| !value.is_empty()) {
            payload["thread_ts"] = Value::String(thread_ts.to_string());
        }

        let body: SlackPostMessageBody = self
            .call("chat.postMessage", || {
                self.http
                    .post(self.url("chat.postMessage"))
                    .bearer_auth(&self.bot_token)
                    .json(&payload)
            })
            .await?;

        Ok(SlackPostedMessage {
            channel: body.channel.unwrap_or_else(|| channel_id.to_string()),
            ts: body.ts.ok_or_else(|| SlackApiError::MissingField {
                method: "chat.postMessage".to_string(),
                field: "ts",
            })?,
        })
    }
}
