use serde_json::{json, Value};

use super::time_format::time_ago;
use crate::{message::InboxMessage, slack_helpers::truncate_for_slack};

pub(crate) const MESSAGE_CARD_TEXT_LIMIT: usize = 200;

/// Payload carried by a card's reply button and by the reply modal.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadTarget {
    pub channel_id: String,
    pub thread_ts: String,
    pub channel_name: String,
}

impl ThreadTarget {
    pub fn for_message(message: &InboxMessage) -> Self {
        Self {
            channel_id: message.channel_id.clone(),
            thread_ts: message.ts.clone(),
            channel_name: message.channel_name.clone(),
        }
    }

    pub fn to_json_string(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// One inbox card: divider, author line, quoted text with a Reply button, and
/// reply status.
pub fn build_message_blocks(message: &InboxMessage) -> Vec<Value> {
    let (status_emoji, status_text) = if message.has_team_reply {
        (":white_check_mark:", "Responded")
    } else {
        (":warning:", "Needs attention")
    };
    let urgency = if !message.has_team_reply && message.reply_count == 0 {
        ":red_circle: "
    } else {
        ""
    };
    let display_text = truncate_for_slack(&message.text, MESSAGE_CARD_TEXT_LIMIT);

    vec![
        json!({"type": "divider"}),
        mrkdwn_context(&format!(
            "{urgency}*#{}* | <@{}> | {}",
            message.channel_name,
            message.user_id,
            time_ago(message.unix_ts)
        )),
        json!({
            "type": "section",
            "text": {"type": "mrkdwn", "text": format!("\"{display_text}\"")},
            "accessory": {
                "type": "button",
                "text": plain_text("Reply"),
                "action_id": "reply_button",
                "value": ThreadTarget::for_message(message).to_json_string(),
            }
        }),
        mrkdwn_context(&format!(
            "{} replies | {status_emoji} {status_text}",
            message.reply_count
        )),
    ]
}

/// Prev / page indicator / Next buttons. Empty when there is a single page.
pub fn build_pagination_blocks(current_page: usize, total_pages: usize) -> Vec<Value> {
    if total_pages <= 1 {
        return Vec::new();
    }

    let mut elements = Vec::with_capacity(3);
    if current_page > 0 {
        elements.push(button("< Prev", "page_prev"));
    }
    elements.push(button(
        &format!("Page {} of {total_pages}", current_page + 1),
        "page_noop",
    ));
    if current_page + 1 < total_pages {
        elements.push(button("Next >", "page_next"));
    }

    vec![
        json!({"type": "divider"}),
        json!({"type": "actions", "elements": elements}),
    ]
}

pub(crate) fn plain_text(text: &str) -> Value {
    json!({"type": "plain_text", "text": text, "emoji": true})
}

pub(crate) fn button(text: &str, action_id: &str) -> Value {
    json!({"type": "button", "text": plain_text(text), "action_id": action_id})
}

pub(crate) fn mrkdwn_section(text: &str) -> Value {
    json!({"type": "section", "text": {"type": "mrkdwn", "text": text}})
}

pub(crate) fn mrkdwn_context(text: &str) -> Value {
    json!({"type": "context", "elements": [{"type": "mrkdwn", "text": text}]})
}

pub(crate) fn header(text: &str) -> Value {
    json!({"type": "header", "text": plain_text(text)})
}
