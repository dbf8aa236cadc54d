use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
/// Inbox ordering selected in the settings view.
pub enum SortOrder {
    #[default]
    Newest,
    Oldest,
    Unresponded,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Newest => "newest",
            Self::Oldest => "oldest",
            Self::Unresponded => "unresponded",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Newest => "Newest First",
            Self::Oldest => "Oldest First",
            Self::Unresponded => "Unresponded First",
        }
    }

    /// Parses a select-option value; unknown values fall back to `Newest`.
    pub fn parse_or_default(raw: &str) -> Self {
        match raw.trim() {
            "oldest" => Self::Oldest,
            "unresponded" => Self::Unresponded,
            _ => Self::Newest,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
/// Preferences record persisted for one Slack user.
pub struct UserPreferences {
    pub user_id: String,
    #[serde(default)]
    pub monitored_channels: Vec<String>,
    #[serde(default)]
    pub sort_order: SortOrder,
    /// Channel ID the inbox is filtered to; empty means all channels.
    #[serde(default)]
    pub channel_filter: String,
    #[serde(default)]
    pub current_page: usize,
    #[serde(default)]
    pub onboarded: bool,
    /// Last time the user opened the Home tab, in unix milliseconds.
    #[serde(default)]
    pub last_active_ts: u64,
}

impl UserPreferences {
    pub fn new(user_id: &str) -> Self {
        Self {
            user_id: user_id.to_string(),
            monitored_channels: Vec::new(),
            sort_order: SortOrder::default(),
            channel_filter: String::new(),
            current_page: 0,
            onboarded: false,
            last_active_ts: 0,
        }
    }

    pub fn monitors(&self, channel_id: &str) -> bool {
        self.monitored_channels
            .iter()
            .any(|monitored| monitored == channel_id)
    }

    pub fn apply(&mut self, update: PreferencesUpdate) {
        if let Some(monitored_channels) = update.monitored_channels {
            self.monitored_channels = monitored_channels;
        }
        if let Some(sort_order) = update.sort_order {
            self.sort_order = sort_order;
        }
        if let Some(channel_filter) = update.channel_filter {
            self.channel_filter = channel_filter;
        }
        if let Some(current_page) = update.current_page {
            self.current_page = current_page;
        }
        if let Some(onboarded) = update.onboarded {
            self.onboarded = onboarded;
        }
        if let Some(last_active_ts) = update.last_active_ts {
            self.last_active_ts = last_active_ts;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Partial update merged into a `UserPreferences` record.
pub struct PreferencesUpdate {
    pub monitored_channels: Option<Vec<String>>,
    pub sort_order: Option<SortOrder>,
    pub channel_filter: Option<String>,
    pub current_page: Option<usize>,
    pub onboarded: Option<bool>,
    pub last_active_ts: Option<u64>,
}
