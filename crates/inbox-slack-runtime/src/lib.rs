//! Slack runtime for the support inbox.
//!
//! Hosts the Slack Web API client, the message and lookup caches, the message
//! service, the debounced Home-tab publish coordinator, the Block Kit views and
//! the Socket Mode event loop that ties them together.

pub mod debouncer;
pub mod directory;
pub mod event_router;
pub mod lookup_cache;
pub mod message;
pub mod message_cache;
pub mod message_service;
pub mod publish_coordinator;
pub mod slack_api_client;
mod slack_helpers;
pub mod slack_runtime;
pub mod views;

#[cfg(test)]
mod test_support;

pub use debouncer::Debouncer;
pub use directory::{ChannelDirectory, ChannelInfo, UserDirectory, UserInfo};
pub use event_router::{
    normalize_socket_envelope, InboxAction, InboxEvent, InboxEventHandler, SlackSocketEnvelope,
};
pub use lookup_cache::{TtlCache, DEFAULT_LOOKUP_CACHE_TTL};
pub use message::{sort_newest_first, InboxMessage, ThreadReply};
pub use message_cache::{MessageCache, DEFAULT_MESSAGE_CACHE_TTL};
pub use message_service::{
    MessageService, MessageServiceConfig, DEFAULT_HISTORY_FETCH_LIMIT, DEFAULT_THREAD_REPLY_LIMIT,
};
pub use publish_coordinator::{
    HomeViewBuilder, PublishConfig, PublishCoordinator, DEFAULT_ACTIVE_WINDOW_MS,
    DEFAULT_PUBLISH_DEBOUNCE_MS,
};
pub use slack_api_client::{
    SlackApiClient, SlackApiClientConfig, SlackApiError, SlackChannelInfo, SlackHistoryMessage,
    SlackPlatform, SlackPostedMessage, SlackUserProfile,
};
pub use slack_helpers::truncate_for_slack;
pub use slack_runtime::{
    run_support_inbox, InboxTuning, SupportInboxRuntimeConfig, SupportInboxServices,
};
