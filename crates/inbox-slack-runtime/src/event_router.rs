//! Socket Mode envelope normalization and inbox event handling.

use std::sync::Arc;

use anyhow::{Context, Result};
use inbox_core::current_unix_timestamp_ms;
use inbox_preferences::{PreferencesStore, PreferencesUpdate, SortOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    directory::ChannelDirectory,
    message_service::MessageService,
    publish_coordinator::PublishCoordinator,
    slack_api_client::SlackPlatform,
    views::{
        build_reply_modal, build_settings_view, ThreadTarget, REPLY_INPUT_ACTION_ID,
        REPLY_INPUT_BLOCK_ID, REPLY_MODAL_CALLBACK_ID,
    },
};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SlackSocketEnvelope {
    pub envelope_id: String,
    #[serde(rename = "type")]
    pub envelope_type: String,
    #[serde(default)]
    pub payload: Value,
}

/// Home-tab button and select interactions, keyed by `action_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxAction {
    ChannelSelect(Vec<String>),
    ChannelFilter(String),
    PagePrev,
    PageNext,
    PageNoop,
    Refresh,
    OpenSettings,
    BackToInbox,
    SortSelect(SortOrder),
    Reply(ThreadTarget),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboxEvent {
    HomeOpened {
        user_id: String,
    },
    ChannelMessage {
        channel_id: String,
        ts: String,
        user_id: String,
        text: String,
        thread_ts: Option<String>,
    },
    Action {
        user_id: String,
        trigger_id: Option<String>,
        action: InboxAction,
    },
    ReplySubmitted {
        user_id: String,
        target: ThreadTarget,
        text: String,
    },
}

impl InboxEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::HomeOpened { .. } => "home_opened",
            Self::ChannelMessage { .. } => "channel_message",
            Self::Action { .. } => "action",
            Self::ReplySubmitted { .. } => "reply_submitted",
        }
    }
}

#[derive(Debug, Deserialize)]
struct SlackEventCallbackEnvelope {
    #[serde(rename = "type")]
    callback_type: String,
    event: SlackEventPayload,
}

#[derive(Debug, Deserialize)]
struct SlackEventPayload {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    subtype: Option<String>,
    #[serde(default)]
    user: Option<String>,
    #[serde(default)]
    bot_id: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    channel: Option<String>,
    #[serde(default)]
    channel_type: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    thread_ts: Option<String>,
    #[serde(default)]
    tab: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SlackInteractionUser {
    id: String,
}

#[derive(Debug, Deserialize)]
struct SlackInteractionPayload {
    #[serde(rename = "type")]
    interaction_type: String,
    user: SlackInteractionUser,
    #[serde(default)]
    trigger_id: Option<String>,
    #[serde(default)]
    actions: Vec<SlackBlockAction>,
    #[serde(default)]
    view: Option<SlackSubmittedView>,
}

#[derive(Debug, Deserialize)]
struct SlackBlockAction {
    action_id: String,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    selected_option: Option<SlackSelectedOption>,
    #[serde(default)]
    selected_conversations: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct SlackSelectedOption {
    value: String,
}

#[derive(Debug, Deserialize)]
struct SlackSubmittedView {
    #[serde(default)]
    callback_id: String,
    #[serde(default)]
    private_metadata: String,
    #[serde(default)]
    state: Value,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|value| !value.trim().is_empty())
}

/// Turns one Socket Mode envelope into zero or more inbox events. Envelope
/// types and events the inbox does not react to yield an empty list.
pub fn normalize_socket_envelope(envelope: &SlackSocketEnvelope) -> Result<Vec<InboxEvent>> {
    match envelope.envelope_type.as_str() {
        "events_api" => normalize_event_callback(&envelope.payload),
        "interactive" => normalize_interaction(&envelope.payload),
        _ => Ok(Vec::new()),
    }
}

fn normalize_event_callback(payload: &Value) -> Result<Vec<InboxEvent>> {
    let callback = serde_json::from_value::<SlackEventCallbackEnvelope>(payload.clone())
        .context("failed to decode slack event callback payload")?;
    if callback.callback_type != "event_callback" {
        return Ok(Vec::new());
    }

    let event = callback.event;
    let normalized = match event.event_type.as_str() {
        "app_home_opened" if event.tab.as_deref() == Some("home") => {
            non_empty(event.user).map(|user_id| InboxEvent::HomeOpened { user_id })
        }
        "message" => normalize_channel_message(event),
        _ => None,
    };
    Ok(normalized.into_iter().collect())
}

fn normalize_channel_message(event: SlackEventPayload) -> Option<InboxEvent> {
    if event.channel_type.as_deref() != Some("channel") {
        return None;
    }
    if matches!(
        event.subtype.as_deref(),
        Some("message_changed" | "message_deleted")
    ) {
        return None;
    }
    if event.bot_id.is_some() {
        return None;
    }
    Some(InboxEvent::ChannelMessage {
        channel_id: non_empty(event.channel)?,
        ts: non_empty(event.ts)?,
        user_id: non_empty(event.user)?,
        text: event.text.unwrap_or_default(),
        thread_ts: non_empty(event.thread_ts),
    })
}

fn normalize_interaction(payload: &Value) -> Result<Vec<InboxEvent>> {
    let interaction = serde_json::from_value::<SlackInteractionPayload>(payload.clone())
        .context("failed to decode slack interaction payload")?;
    let user_id = interaction.user.id;

    match interaction.interaction_type.as_str() {
        "block_actions" => Ok(interaction
            .actions
            .into_iter()
            .filter_map(parse_block_action)
            .map(|action| InboxEvent::Action {
                user_id: user_id.clone(),
                trigger_id: interaction.trigger_id.clone(),
                action,
            })
            .collect()),
        "view_submission" => {
            let Some(view) = interaction.view else {
                return Ok(Vec::new());
            };
            if view.callback_id != REPLY_MODAL_CALLBACK_ID {
                return Ok(Vec::new());
            }
            let target = serde_json::from_str::<ThreadTarget>(&view.private_metadata)
                .context("failed to decode reply modal metadata")?;
            let text = view.state["values"][REPLY_INPUT_BLOCK_ID][REPLY_INPUT_ACTION_ID]["value"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            if text.trim().is_empty() {
                return Ok(Vec::new());
            }
            Ok(vec![InboxEvent::ReplySubmitted {
                user_id,
                target,
                text,
            }])
        }
        _ => Ok(Vec::new()),
    }
}

fn parse_block_action(action: SlackBlockAction) -> Option<InboxAction> {
    let selected = action.selected_option.map(|option| option.value);
    let parsed = match action.action_id.as_str() {
        "channel_select" => {
            InboxAction::ChannelSelect(action.selected_conversations.unwrap_or_default())
        }
        "channel_filter" => {
            let value = selected.unwrap_or_default();
            InboxAction::ChannelFilter(if value == "all" { String::new() } else { value })
        }
        "page_prev" => InboxAction::PagePrev,
        "page_next" => InboxAction::PageNext,
        "page_noop" => InboxAction::PageNoop,
        "refresh_button" => InboxAction::Refresh,
        "settings_button" => InboxAction::OpenSettings,
        "back_to_inbox" => InboxAction::BackToInbox,
        "sort_select" => InboxAction::SortSelect(SortOrder::parse_or_default(
            selected.as_deref().unwrap_or_default(),
        )),
        "reply_button" => {
            let value = action.value?;
            match serde_json::from_str::<ThreadTarget>(&value) {
                Ok(target) => InboxAction::Reply(target),
                Err(error) => {
                    tracing::warn!(%error, "ignoring reply button with malformed value");
                    return None;
                }
            }
        }
        other => {
            tracing::debug!(action_id = other, "ignoring unknown block action");
            return None;
        }
    };
    Some(parsed)
}

/// Applies inbox events to preferences, the message cache and the Home tab.
pub struct InboxEventHandler {
    platform: Arc<dyn SlackPlatform>,
    preferences: Arc<dyn PreferencesStore>,
    messages: Arc<MessageService>,
    channels: Arc<ChannelDirectory>,
    coordinator: Arc<PublishCoordinator>,
}

impl InboxEventHandler {
    pub fn new(
        platform: Arc<dyn SlackPlatform>,
        preferences: Arc<dyn PreferencesStore>,
        messages: Arc<MessageService>,
        channels: Arc<ChannelDirectory>,
        coordinator: Arc<PublishCoordinator>,
    ) -> Self {
        Self {
            platform,
            preferences,
            messages,
            channels,
            coordinator,
        }
    }

    pub async fn handle(&self, event: InboxEvent) {
        tracing::debug!(kind = event.kind(), "handling inbox event");
        match event {
            InboxEvent::HomeOpened { user_id } => {
                self.preferences.set(
                    &user_id,
                    PreferencesUpdate {
                        last_active_ts: Some(current_unix_timestamp_ms()),
                        ..PreferencesUpdate::default()
                    },
                );
                self.coordinator.publish_now(&user_id).await;
            }
            InboxEvent::ChannelMessage {
                channel_id,
                ts,
                user_id,
                text,
                thread_ts,
            } => {
                self.messages
                    .process_new_message(&channel_id, &ts, &user_id, &text, thread_ts.as_deref())
                    .await;
                self.coordinator
                    .publish_to_active_users_for_channel(&channel_id);
            }
            InboxEvent::Action {
                user_id,
                trigger_id,
                action,
            } => self.handle_action(&user_id, trigger_id.as_deref(), action).await,
            InboxEvent::ReplySubmitted {
                user_id,
                target,
                text,
            } => self.handle_reply_submission(&user_id, &target, &text).await,
        }
    }

    async fn handle_action(&self, user_id: &str, trigger_id: Option<&str>, action: InboxAction) {
        match action {
            InboxAction::ChannelSelect(channel_ids) => {
                let joined = self.channels.join_channels(&channel_ids).await;
                let failed = joined.iter().filter(|ok| !**ok).count();
                if failed > 0 {
                    tracing::warn!(user_id, failed, "some selected channels could not be joined");
                }
                self.preferences.set(
                    user_id,
                    PreferencesUpdate {
                        monitored_channels: Some(channel_ids),
                        onboarded: Some(true),
                        current_page: Some(0),
                        ..PreferencesUpdate::default()
                    },
                );
                self.coordinator.publish_now(user_id).await;
            }
            InboxAction::ChannelFilter(channel_filter) => {
                self.preferences.set(
                    user_id,
                    PreferencesUpdate {
                        channel_filter: Some(channel_filter),
                        current_page: Some(0),
                        ..PreferencesUpdate::default()
                    },
                );
                self.coordinator.publish_now(user_id).await;
            }
            InboxAction::PagePrev => {
                self.turn_page(user_id, |page| page.saturating_sub(1)).await;
            }
            InboxAction::PageNext => {
                self.turn_page(user_id, |page| page.saturating_add(1)).await;
            }
            InboxAction::PageNoop => {}
            InboxAction::Refresh => {
                for channel_id in self.preferences.get(user_id).monitored_channels {
                    self.messages.invalidate_channel(&channel_id);
                }
                self.coordinator.publish_now(user_id).await;
            }
            InboxAction::OpenSettings => {
                let view = build_settings_view(&self.preferences.get(user_id));
                if let Err(error) = self.platform.publish_view(user_id, &view).await {
                    tracing::warn!(user_id, %error, "failed to publish settings view");
                }
            }
            InboxAction::BackToInbox => {
                self.coordinator.publish_now(user_id).await;
            }
            InboxAction::SortSelect(sort_order) => {
                self.preferences.set(
                    user_id,
                    PreferencesUpdate {
                        sort_order: Some(sort_order),
                        ..PreferencesUpdate::default()
                    },
                );
            }
            InboxAction::Reply(target) => {
                let Some(trigger_id) = trigger_id else {
                    tracing::warn!(user_id, "reply button without trigger id");
                    return;
                };
                let replies = self
                    .messages
                    .get_thread_replies(&target.channel_id, &target.thread_ts)
                    .await;
                let modal = build_reply_modal(&target, &replies);
                if let Err(error) = self.platform.open_view(trigger_id, &modal).await {
                    tracing::warn!(user_id, %error, "failed to open reply modal");
                }
            }
        }
    }

    async fn turn_page(&self, user_id: &str, next: impl FnOnce(usize) -> usize) {
        let current_page = self.preferences.get(user_id).current_page;
        self.preferences.set(
            user_id,
            PreferencesUpdate {
                current_page: Some(next(current_page)),
                ..PreferencesUpdate::default()
            },
        );
        self.coordinator.publish_now(user_id).await;
    }

    async fn handle_reply_submission(&self, user_id: &str, target: &ThreadTarget, text: &str) {
        if let Err(error) = self
            .platform
            .post_message(&target.channel_id, text, Some(&target.thread_ts))
            .await
        {
            tracing::warn!(
                user_id,
                channel_id = %target.channel_id,
                %error,
                "failed to post thread reply"
            );
            return;
        }
        self.messages
            .record_team_reply(&target.channel_id, &target.thread_ts);
        self.coordinator.publish_now(user_id).await;
    }
}
