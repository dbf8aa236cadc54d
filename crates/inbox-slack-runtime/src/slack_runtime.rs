//! Socket Mode runtime that wires the inbox services together and feeds them
//! Slack events.

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use inbox_preferences::{JsonFilePreferencesStore, PreferencesStore};
use serde_json::json;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

use crate::{
    directory::{ChannelDirectory, UserDirectory},
    event_router::{normalize_socket_envelope, InboxEventHandler, SlackSocketEnvelope},
    lookup_cache::DEFAULT_LOOKUP_CACHE_TTL,
    message_cache::{MessageCache, DEFAULT_MESSAGE_CACHE_TTL},
    message_service::{MessageService, MessageServiceConfig},
    publish_coordinator::{PublishConfig, PublishCoordinator},
    slack_api_client::{SlackApiClient, SlackApiClientConfig, SlackPlatform},
    views::InboxHomeViewBuilder,
};

const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Cache lifetimes, fetch sizes and publish timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InboxTuning {
    pub message_cache_ttl: Duration,
    pub lookup_cache_ttl: Duration,
    pub messages: MessageServiceConfig,
    pub publish: PublishConfig,
}

impl Default for InboxTuning {
    fn default() -> Self {
        Self {
            message_cache_ttl: DEFAULT_MESSAGE_CACHE_TTL,
            lookup_cache_ttl: DEFAULT_LOOKUP_CACHE_TTL,
            messages: MessageServiceConfig::default(),
            publish: PublishConfig::default(),
        }
    }
}

#[derive(Debug, Clone)]
/// Runtime configuration for the support inbox Socket Mode loop.
pub struct SupportInboxRuntimeConfig {
    pub api_base: String,
    pub app_token: String,
    pub bot_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub reconnect_delay: Duration,
    pub preferences_path: PathBuf,
    pub preferences_flush_delay: Duration,
    pub tuning: InboxTuning,
}

/// The inbox services assembled over one platform client and preferences store.
pub struct SupportInboxServices {
    pub preferences: Arc<dyn PreferencesStore>,
    pub message_cache: Arc<MessageCache>,
    pub messages: Arc<MessageService>,
    pub coordinator: Arc<PublishCoordinator>,
    pub handler: Arc<InboxEventHandler>,
}

impl SupportInboxServices {
    pub fn assemble(
        platform: Arc<dyn SlackPlatform>,
        preferences: Arc<dyn PreferencesStore>,
        tuning: InboxTuning,
    ) -> Self {
        let message_cache = Arc::new(MessageCache::new(tuning.message_cache_ttl));
        let channels = Arc::new(ChannelDirectory::new(
            Arc::clone(&platform),
            tuning.lookup_cache_ttl,
        ));
        let users = Arc::new(UserDirectory::new(
            Arc::clone(&platform),
            tuning.lookup_cache_ttl,
        ));
        let messages = Arc::new(MessageService::new(
            Arc::clone(&platform),
            Arc::clone(&message_cache),
            users,
            Arc::clone(&channels),
            tuning.messages,
        ));
        let builder = Arc::new(InboxHomeViewBuilder::new(
            Arc::clone(&preferences),
            Arc::clone(&messages),
        ));
        let coordinator = Arc::new(PublishCoordinator::new(
            Arc::clone(&platform),
            builder,
            Arc::clone(&preferences),
            tuning.publish,
        ));
        let handler = Arc::new(InboxEventHandler::new(
            platform,
            Arc::clone(&preferences),
            Arc::clone(&messages),
            channels,
            Arc::clone(&coordinator),
        ));
        Self {
            preferences,
            message_cache,
            messages,
            coordinator,
            handler,
        }
    }

    /// Normalizes and handles one envelope inline. Returns the number of
    /// inbox events it produced.
    pub async fn dispatch_envelope(&self, envelope: &SlackSocketEnvelope) -> Result<usize> {
        let events = normalize_socket_envelope(envelope)?;
        let count = events.len();
        for event in events {
            self.handler.handle(event).await;
        }
        Ok(count)
    }

    /// Cancels pending publishes and persists preferences.
    pub fn shutdown(&self) -> Result<()> {
        self.coordinator.shutdown();
        self.preferences
            .flush()
            .context("failed to flush preferences on shutdown")
    }
}

pub async fn run_support_inbox(config: SupportInboxRuntimeConfig) -> Result<()> {
    let mut runtime = SupportInboxRuntime::new(config).await?;
    let result = runtime.run().await;
    runtime.services.shutdown()?;
    result
}

struct SupportInboxRuntime {
    config: SupportInboxRuntimeConfig,
    slack_client: Arc<SlackApiClient>,
    services: SupportInboxServices,
}

impl SupportInboxRuntime {
    async fn new(config: SupportInboxRuntimeConfig) -> Result<Self> {
        let slack_client = Arc::new(SlackApiClient::new(SlackApiClientConfig {
            api_base: config.api_base.clone(),
            app_token: config.app_token.clone(),
            bot_token: config.bot_token.clone(),
            request_timeout_ms: config.request_timeout_ms,
            retry_max_attempts: config.retry_max_attempts,
            retry_base_delay_ms: config.retry_base_delay_ms,
        })?);

        let bot_user_id = slack_client
            .resolve_bot_user_id()
            .await
            .context("failed to authenticate slack bot token")?;
        tracing::info!(%bot_user_id, "slack bot authenticated");

        let preferences = Arc::new(JsonFilePreferencesStore::load(
            config.preferences_path.clone(),
            config.preferences_flush_delay,
        ));
        tracing::info!(
            path = %preferences.path().display(),
            users = preferences.len(),
            "loaded user preferences"
        );

        let services =
            SupportInboxServices::assemble(slack_client.clone(), preferences, config.tuning);

        Ok(Self {
            config,
            slack_client,
            services,
        })
    }

    async fn run(&mut self) -> Result<()> {
        let mut failure_streak = 0_usize;
        loop {
            match self.slack_client.open_socket_connection().await {
                Ok(socket_url) => {
                    tracing::info!("slack socket connected");
                    match self.run_socket_session(&socket_url).await {
                        Ok(SessionEnd::Shutdown) => {
                            tracing::info!("support inbox shutdown requested");
                            return Ok(());
                        }
                        Ok(SessionEnd::Disconnected) => {
                            failure_streak = 0;
                            tracing::info!("slack socket disconnected");
                        }
                        Err(error) => {
                            failure_streak = failure_streak.saturating_add(1);
                            tracing::warn!(
                                failure_streak,
                                error = %format!("{error:#}"),
                                "slack socket session error"
                            );
                        }
                    }
                }
                Err(error) => {
                    failure_streak = failure_streak.saturating_add(1);
                    tracing::warn!(failure_streak, %error, "failed to open slack socket connection");
                }
            }

            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("support inbox shutdown requested");
                    return Ok(());
                }
                _ = tokio::time::sleep(self.config.reconnect_delay) => {}
            }
        }
    }

    async fn run_socket_session(&mut self, socket_url: &str) -> Result<SessionEnd> {
        let (stream, _response) = connect_async(socket_url)
            .await
            .context("failed to connect slack socket mode websocket")?;
        let (mut sink, mut source) = stream.split();
        let mut purge_tick = tokio::time::interval(CACHE_PURGE_INTERVAL);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    return Ok(SessionEnd::Shutdown);
                }
                maybe_message = source.next() => {
                    let Some(message_result) = maybe_message else {
                        return Ok(SessionEnd::Disconnected);
                    };
                    let message = message_result.context("failed reading slack websocket message")?;
                    if let Some(envelope) = parse_socket_envelope(message)? {
                        ack_envelope(&mut sink, &envelope.envelope_id).await?;
                        if envelope.envelope_type == "disconnect" {
                            return Ok(SessionEnd::Disconnected);
                        }
                        self.spawn_envelope_handler(envelope);
                    }
                }
                _ = purge_tick.tick() => {
                    self.services.message_cache.purge_expired();
                }
            }
        }
    }

    /// Handlers run off the socket loop so slow Slack calls never delay acks.
    fn spawn_envelope_handler(&self, envelope: SlackSocketEnvelope) {
        let events = match normalize_socket_envelope(&envelope) {
            Ok(events) => events,
            Err(error) => {
                tracing::warn!(
                    envelope_type = %envelope.envelope_type,
                    error = %format!("{error:#}"),
                    "dropping malformed slack envelope"
                );
                return;
            }
        };
        for event in events {
            let handler = Arc::clone(&self.services.handler);
            tokio::spawn(async move {
                handler.handle(event).await;
            });
        }
    }
}

enum SessionEnd {
    Shutdown,
    Disconnected,
}

async fn ack_envelope<S>(sink: &mut S, envelope_id: &str) -> Result<()>
where
    S: futures_util::Sink<WsMessage> + Unpin,
    S::Error: std::error::Error + Send + Sync + 'static,
{
    let ack = json!({ "envelope_id": envelope_id }).to_string();
    sink.send(WsMessage::Text(ack.into()))
        .await
        .context("failed to send slack socket ack")
}

/// Decodes a websocket frame into an envelope. Control frames and the
/// `hello` greeting (no `envelope_id`) yield `None`.
fn parse_socket_envelope(message: WsMessage) -> Result<Option<SlackSocketEnvelope>> {
    let text = match message {
        WsMessage::Text(text) => text.to_string(),
        WsMessage::Binary(bytes) => {
            String::from_utf8(bytes.to_vec()).context("invalid utf-8 slack socket payload")?
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Close(_) | WsMessage::Frame(_) => {
            return Ok(None);
        }
    };
    let value = serde_json::from_str::<serde_json::Value>(&text)
        .context("failed to parse slack socket envelope")?;
    if value.get("envelope_id").is_none() {
        let frame_type = value["type"].as_str().unwrap_or("unknown");
        if frame_type == "disconnect" {
            return Ok(Some(SlackSocketEnvelope {
                envelope_id: String::new(),
                envelope_type: frame_type.to_string(),
                payload: serde_json::Value::Null,
            }));
        }
        tracing::debug!(frame_type, "slack socket control frame");
        return Ok(None);
    }
    serde_json::from_value::<SlackSocketEnvelope>(value)
        .map(Some)
        .context("failed to parse slack socket envelope")
}
