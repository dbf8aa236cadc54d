//! Block Kit documents for the Home tab and the reply modal.

mod components;
mod home;
mod reply_modal;
mod time_format;

use std::sync::Arc;

use async_trait::async_trait;
use inbox_preferences::PreferencesStore;
use serde_json::Value;

use crate::{message_service::MessageService, publish_coordinator::HomeViewBuilder};

pub use components::{build_message_blocks, build_pagination_blocks, ThreadTarget};
pub use home::{
    arrange_messages, build_inbox_view, build_onboarding_view, build_settings_view, MAX_BLOCKS,
    MESSAGES_PER_PAGE,
};
pub use reply_modal::{
    build_reply_modal, REPLY_INPUT_ACTION_ID, REPLY_INPUT_BLOCK_ID, REPLY_MODAL_CALLBACK_ID,
};
pub use time_format::{message_permalink, time_ago, time_ago_at};

/// Renders onboarding for users without channels and the inbox otherwise.
pub struct InboxHomeViewBuilder {
    preferences: Arc<dyn PreferencesStore>,
    messages: Arc<MessageService>,
}

impl InboxHomeViewBuilder {
    pub fn new(preferences: Arc<dyn PreferencesStore>, messages: Arc<MessageService>) -> Self {
        Self {
            preferences,
            messages,
        }
    }
}

#[async_trait]
impl HomeViewBuilder for InboxHomeViewBuilder {
    async fn build_home_view(&self, user_id: &str) -> anyhow::Result<Value> {
        let prefs = self.preferences.get(user_id);
        if !prefs.onboarded || prefs.monitored_channels.is_empty() {
            return Ok(build_onboarding_view());
        }
        let messages = self.messages.get_messages(&prefs.monitored_channels).await;
        Ok(build_inbox_view(&prefs, &messages))
    }
}
