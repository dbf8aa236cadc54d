use inbox_core::parse_slack_ts;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// One user-authored top-level post in a monitored channel.
///
/// `(channel_id, ts)` identifies the message; `reply_count` and
/// `has_team_reply` change in place as thread replies arrive.
pub struct InboxMessage {
    pub channel_id: String,
    pub channel_name: String,
    pub ts: String,
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub unix_ts: f64,
    pub reply_count: u32,
    pub has_team_reply: bool,
    #[serde(default)]
    pub permalink: Option<String>,
}

impl InboxMessage {
    /// Builds a message with `unix_ts` derived from `ts` and no replies.
    pub fn new(
        channel_id: &str,
        channel_name: &str,
        ts: &str,
        user_id: &str,
        display_name: &str,
        text: &str,
    ) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_name: channel_name.to_string(),
            ts: ts.to_string(),
            user_id: user_id.to_string(),
            display_name: display_name.to_string(),
            text: text.to_string(),
            unix_ts: parse_slack_ts(ts),
            reply_count: 0,
            has_team_reply: false,
            permalink: None,
        }
    }

    pub fn with_replies(mut self, reply_count: u32) -> Self {
        self.reply_count = reply_count;
        self.has_team_reply = reply_count > 0;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One message of a thread shown in the reply modal.
pub struct ThreadReply {
    pub user_id: String,
    pub display_name: String,
    pub text: String,
    pub ts: String,
}

/// Orders messages newest-first by `unix_ts`; equal timestamps keep input order.
pub fn sort_newest_first(messages: &mut [InboxMessage]) {
    messages.sort_by(|left, right| right.unix_ts.total_cmp(&left.unix_ts));
}
