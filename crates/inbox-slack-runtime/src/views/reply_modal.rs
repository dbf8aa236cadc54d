use inbox_core::parse_slack_ts;
use serde_json::{json, Value};

use super::{
    components::{mrkdwn_context, mrkdwn_section, ThreadTarget},
    time_format::{compact_ts, time_ago},
};
use crate::{message::ThreadReply, slack_helpers::truncate_for_slack};

pub const REPLY_MODAL_CALLBACK_ID: &str = "reply_modal_submit";
pub const REPLY_INPUT_BLOCK_ID: &str = "reply_input_block";
pub const REPLY_INPUT_ACTION_ID: &str = "reply_text";

const THREAD_CONTEXT_MESSAGES: usize = 10;
const THREAD_CONTEXT_TEXT_LIMIT: usize = 300;

/// Modal with the latest thread messages, a reply input and a deep link back
/// to the thread. The thread target travels in `private_metadata`.
pub fn build_reply_modal(target: &ThreadTarget, replies: &[ThreadReply]) -> Value {
    let mut blocks = vec![
        mrkdwn_context(&format!("Replying in *#{}*", target.channel_name)),
        json!({"type": "divider"}),
    ];

    if !replies.is_empty() {
        blocks.push(mrkdwn_section("*Thread Context:*"));
        let skip = replies.len().saturating_sub(THREAD_CONTEXT_MESSAGES);
        for reply in &replies[skip..] {
            blocks.push(mrkdwn_context(&format!(
                "*{}* ({}):\n{}",
                reply.display_name,
                time_ago(parse_slack_ts(&reply.ts)),
                truncate_for_slack(&reply.text, THREAD_CONTEXT_TEXT_LIMIT)
            )));
        }
    }

    blocks.push(json!({"type": "divider"}));
    blocks.push(json!({
        "type": "input",
        "block_id": REPLY_INPUT_BLOCK_ID,
        "element": {
            "type": "plain_text_input",
            "action_id": REPLY_INPUT_ACTION_ID,
            "multiline": true,
            "placeholder": {"type": "plain_text", "text": "Type your reply..."},
        },
        "label": {"type": "plain_text", "text": "Your Reply"},
    }));
    blocks.push(mrkdwn_context(&format!(
        "<slack://channel?team=&id={}&message={}|View in Channel>",
        target.channel_id,
        compact_ts(&target.thread_ts)
    )));

    json!({
        "type": "modal",
        "callback_id": REPLY_MODAL_CALLBACK_ID,
        "title": {"type": "plain_text", "text": "Reply to Thread"},
        "submit": {"type": "plain_text", "text": "Send Reply"},
        "close": {"type": "plain_text", "text": "Cancel"},
        "private_metadata": target.to_json_string(),
        "blocks": blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::{build_reply_modal, REPLY_MODAL_CALLBACK_ID};
    use crate::{message::ThreadReply, views::ThreadTarget};

    fn target() -> ThreadTarget {
        ThreadTarget {
            channel_id: "C1".to_string(),
            thread_ts: "1712345678.000200".to_string(),
            channel_name: "help".to_string(),
        }
    }

    fn reply(index: usize, text: &str) -> ThreadReply {
        ThreadReply {
            user_id: format!("U{index}"),
            display_name: format!("user{index}"),
            text: text.to_string(),
            ts: format!("{}.0", 1_700_000_000 + index),
        }
    }

    #[test]
    fn functional_reply_modal_shows_last_ten_messages_and_metadata() {
        let replies = (0..12).map(|index| reply(index, "hello")).collect::<Vec<_>>();
        let modal = build_reply_modal(&target(), &replies);

        assert_eq!(modal["type"], "modal");
        assert_eq!(modal["callback_id"], REPLY_MODAL_CALLBACK_ID);
        let metadata: ThreadTarget =
            serde_json::from_str(modal["private_metadata"].as_str().expect("metadata"))
                .expect("decode metadata");
        assert_eq!(metadata, target());

        let blocks = modal["blocks"].as_array().expect("blocks");
        assert_eq!(blocks[0]["elements"][0]["text"], "Replying in *#help*");
        assert_eq!(blocks[2]["text"]["text"], "*Thread Context:*");
        let first_shown = blocks[3]["elements"][0]["text"].as_str().expect("context");
        assert!(first_shown.starts_with("*user2* ("));
        // context, divider, title, 10 messages, divider, input, link
        assert_eq!(blocks.len(), 3 + 10 + 3);

        let link = blocks.last().expect("link")["elements"][0]["text"]
            .as_str()
            .expect("link text");
        assert_eq!(
            link,
            "<slack://channel?team=&id=C1&message=1712345678000200|View in Channel>"
        );
    }

    #[test]
    fn unit_reply_modal_handles_empty_thread_and_long_text() {
        let modal = build_reply_modal(&target(), &[]);
        let blocks = modal["blocks"].as_array().expect("blocks");
        assert_eq!(blocks.len(), 5);
        assert_eq!(blocks[3]["block_id"], "reply_input_block");

        let long = "y".repeat(320);
        let modal = build_reply_modal(&target(), &[reply(1, &long)]);
        let text = modal["blocks"][3]["elements"][0]["text"]
            .as_str()
            .expect("context")
            .to_string();
        assert!(text.ends_with(&format!("{}...", "y".repeat(300))));
    }
}
