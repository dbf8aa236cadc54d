use inbox_preferences::{SortOrder, UserPreferences};
use serde_json::{json, Value};

use super::components::{
    build_message_blocks, build_pagination_blocks, button, header, mrkdwn_context, mrkdwn_section,
};
use crate::message::InboxMessage;

pub const MESSAGES_PER_PAGE: usize = 20;
pub const MAX_BLOCKS: usize = 100;

const MAX_CARDS_PER_VIEW: usize = (MAX_BLOCKS - 10) / 4;

fn channel_picker(initial_channels: &[String], placeholder: &str) -> Value {
    let mut element = json!({
        "type": "multi_conversations_select",
        "placeholder": {"type": "plain_text", "text": placeholder},
        "action_id": "channel_select",
        "filter": {"include": ["public"], "exclude_bot_users": true},
    });
    if !initial_channels.is_empty() {
        element["initial_conversations"] = json!(initial_channels);
    }
    element
}

fn option(text: &str, value: &str) -> Value {
    json!({"text": {"type": "plain_text", "text": text}, "value": value})
}

pub fn build_onboarding_view() -> Value {
    json!({
        "type": "home",
        "blocks": [
            header("Welcome to Support Inbox"),
            mrkdwn_section(
                "Monitor all your help channels in one place. Get started by selecting the channels you want to monitor."
            ),
            {"type": "divider"},
            mrkdwn_section("*Step 1:* Select the help channels you want to monitor"),
            {
                "type": "actions",
                "elements": [channel_picker(&[], "Select channels to monitor...")]
            },
            mrkdwn_context("Tip: Select channels like `#help-technicalsupport`, `#help-devpods`, etc."),
        ]
    })
}

pub fn build_settings_view(prefs: &UserPreferences) -> Value {
    let sort_options = [SortOrder::Newest, SortOrder::Oldest, SortOrder::Unresponded]
        .into_iter()
        .map(|order| option(order.label(), order.as_str()))
        .collect::<Vec<_>>();

    json!({
        "type": "home",
        "blocks": [
            header("Settings"),
            {"type": "actions", "elements": [button("Back to Inbox", "back_to_inbox")]},
            {"type": "divider"},
            mrkdwn_section(
                "*Monitored Channels*\nSelect the public channels you want to monitor for support messages."
            ),
            {
                "type": "actions",
                "elements": [channel_picker(&prefs.monitored_channels, "Select channels...")]
            },
            {"type": "divider"},
            mrkdwn_section("*Sort Order*\nHow should messages be sorted in your inbox?"),
            {
                "type": "actions",
                "elements": [{
                    "type": "static_select",
                    "placeholder": {"type": "plain_text", "text": "Sort order"},
                    "action_id": "sort_select",
                    "initial_option": option(prefs.sort_order.label(), prefs.sort_order.as_str()),
                    "options": sort_options,
                }]
            },
        ]
    })
}

/// Applies the user's channel filter and sort order. `messages` arrive
/// newest-first.
pub fn arrange_messages(prefs: &UserPreferences, messages: &[InboxMessage]) -> Vec<InboxMessage> {
    let mut arranged = messages
        .iter()
        .filter(|message| prefs.channel_filter.is_empty() || message.channel_id == prefs.channel_filter)
        .cloned()
        .collect::<Vec<_>>();
    match prefs.sort_order {
        SortOrder::Newest => {}
        SortOrder::Oldest => {
            arranged.sort_by(|left, right| left.unix_ts.total_cmp(&right.unix_ts));
        }
        SortOrder::Unresponded => arranged.sort_by(|left, right| {
            left.has_team_reply
                .cmp(&right.has_team_reply)
                .then_with(|| right.unix_ts.total_cmp(&left.unix_ts))
        }),
    }
    arranged
}

/// The inbox Home tab: header with the unanswered count, filter and control
/// row, one card per message on the current page, and pagination.
pub fn build_inbox_view(prefs: &UserPreferences, messages: &[InboxMessage]) -> Value {
    let arranged = arrange_messages(prefs, messages);
    let total_messages = arranged.len();
    let total_pages = total_messages.div_ceil(MESSAGES_PER_PAGE).max(1);
    let page = prefs.current_page.min(total_pages - 1);
    let page_messages = arranged
        .iter()
        .skip(page * MESSAGES_PER_PAGE)
        .take(MESSAGES_PER_PAGE.min(MAX_CARDS_PER_VIEW))
        .collect::<Vec<_>>();
    let new_count = arranged
        .iter()
        .filter(|message| !message.has_team_reply)
        .count();

    let title = if new_count > 0 {
        format!("Support Inbox ({new_count} new)")
    } else {
        "Support Inbox".to_string()
    };

    let mut filter_options = vec![option("All Channels", "all")];
    let mut seen_channels = Vec::<&str>::new();
    for message in messages {
        if seen_channels.contains(&message.channel_id.as_str()) {
            continue;
        }
        seen_channels.push(&message.channel_id);
        filter_options.push(option(
            &format!("#{}", latest_channel_name(messages, &message.channel_id)),
            &message.channel_id,
        ));
    }
    let initial_filter = filter_options
        .iter()
        .find(|candidate| {
            !prefs.channel_filter.is_empty() && candidate["value"] == prefs.channel_filter.as_str()
        })
        .unwrap_or(&filter_options[0])
        .clone();

    let monitored = prefs.monitored_channels.len();
    let mut blocks = vec![
        header(&title),
        json!({
            "type": "actions",
            "elements": [
                {
                    "type": "static_select",
                    "placeholder": {"type": "plain_text", "text": "Filter by channel"},
                    "action_id": "channel_filter",
                    "initial_option": initial_filter,
                    "options": filter_options,
                },
                button("Refresh", "refresh_button"),
                button("Settings", "settings_button"),
            ]
        }),
        mrkdwn_context(&format!(
            "Monitoring {monitored} channel{} | {total_messages} messages",
            if monitored == 1 { "" } else { "s" }
        )),
    ];

    if page_messages.is_empty() {
        blocks.push(json!({"type": "divider"}));
        blocks.push(mrkdwn_section(
            "_No messages found. Messages from your monitored channels will appear here._",
        ));
    } else {
        for message in page_messages {
            blocks.extend(build_message_blocks(message));
        }
    }
    blocks.extend(build_pagination_blocks(page, total_pages));

    json!({"type": "home", "blocks": blocks})
}

fn latest_channel_name<'a>(messages: &'a [InboxMessage], channel_id: &'a str) -> &'a str {
    messages
        .iter()
        .rev()
        .find(|message| message.channel_id == channel_id)
        .map(|message| message.channel_name.as_str())
        .unwrap_or(channel_id)
}
