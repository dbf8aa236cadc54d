use std::{path::Path, sync::Arc, time::Duration};

use httpmock::prelude::*;
use inbox_preferences::{JsonFilePreferencesStore, PreferencesStore};
use inbox_slack_runtime::{
    views::{REPLY_INPUT_ACTION_ID, REPLY_INPUT_BLOCK_ID, REPLY_MODAL_CALLBACK_ID},
    InboxTuning, PublishConfig, SlackApiClient, SlackApiClientConfig, SlackSocketEnvelope,
    SupportInboxServices,
};
use serde_json::{json, Value};

fn slack_client(base_url: String) -> Arc<SlackApiClient> {
    Arc::new(
        SlackApiClient::new(SlackApiClientConfig {
            api_base: base_url,
            app_token: "xapp-test".to_string(),
            bot_token: "xoxb-test".to_string(),
            request_timeout_ms: 2_000,
            retry_max_attempts: 1,
            retry_base_delay_ms: 1,
        })
        .expect("client"),
    )
}

fn fast_tuning() -> InboxTuning {
    InboxTuning {
        publish: PublishConfig {
            debounce_ms: 20,
            ..PublishConfig::default()
        },
        ..InboxTuning::default()
    }
}

fn assemble(server: &MockServer, preferences_path: &Path) -> SupportInboxServices {
    let preferences = Arc::new(JsonFilePreferencesStore::load(
        preferences_path.to_path_buf(),
        Duration::from_secs(60),
    ));
    SupportInboxServices::assemble(slack_client(server.base_url()), preferences, fast_tuning())
}

fn envelope(envelope_type: &str, payload: Value) -> SlackSocketEnvelope {
    SlackSocketEnvelope {
        envelope_id: format!("env-{envelope_type}"),
        envelope_type: envelope_type.to_string(),
        payload,
    }
}

fn home_opened(user_id: &str) -> SlackSocketEnvelope {
    envelope(
        "events_api",
        json!({
            "type": "event_callback",
            "event": {"type": "app_home_opened", "user": user_id, "tab": "home"}
        }),
    )
}

fn channel_select(user_id: &str, channels: &[&str]) -> SlackSocketEnvelope {
    envelope(
        "interactive",
        json!({
            "type": "block_actions",
            "user": {"id": user_id},
            "trigger_id": "trigger-1",
            "actions": [{"action_id": "channel_select", "selected_conversations": channels}]
        }),
    )
}

fn channel_message(channel_id: &str, ts: &str, user_id: &str, text: &str) -> SlackSocketEnvelope {
    envelope(
        "events_api",
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": channel_id,
                "channel_type": "channel",
                "ts": ts,
                "user": user_id,
                "text": text
            }
        }),
    )
}

fn reply_submission(
    user_id: &str,
    channel_id: &str,
    thread_ts: &str,
    text: &str,
) -> SlackSocketEnvelope {
    envelope(
        "interactive",
        json!({
            "type": "view_submission",
            "user": {"id": user_id},
            "view": {
                "callback_id": REPLY_MODAL_CALLBACK_ID,
                "private_metadata": json!({
                    "channelId": channel_id,
                    "threadTs": thread_ts,
                    "channelName": "help"
                }).to_string(),
                "state": {"values": {
                    REPLY_INPUT_BLOCK_ID: {REPLY_INPUT_ACTION_ID: {"value": text}}
                }}
            }
        }),
    )
}

fn mock_directory(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/users.info");
        then.status(200).json_body(json!({
            "ok": true,
            "user": {"id": "U9", "profile": {"display_name": "Grace", "real_name": "Grace Hopper"}}
        }));
    });
    server.mock(|when, then| {
        when.method(GET).path("/conversations.info");
        then.status(200).json_body(json!({
            "ok": true,
            "channel": {"id": "C1", "name": "help"}
        }));
    });
}

async fn wait_for_calls(mock: &httpmock::Mock<'_>, expected: usize) {
    for _ in 0..100 {
        if mock.calls() >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("expected {expected} calls, saw {}", mock.calls());
}

#[tokio::test]
async fn integration_onboarding_message_and_reply_flow_reaches_slack() {
    let server = MockServer::start();
    mock_directory(&server);
    let publish = server.mock(|when, then| {
        when.method(POST)
            .path("/views.publish")
            .header("authorization", "Bearer xoxb-test");
        then.status(200).json_body(json!({"ok": true}));
    });
    let join = server.mock(|when, then| {
        when.method(POST).path("/conversations.join");
        then.status(200).json_body(json!({"ok": true}));
    });
    let history = server.mock(|when, then| {
        when.method(GET)
            .path("/conversations.history")
            .query_param("channel", "C1")
            .query_param("limit", "50");
        then.status(200).json_body(json!({
            "ok": true,
            "messages": [
                {"ts": "20.0", "user": "U9", "text": "printer is on fire"},
                {"ts": "15.0", "user": "U9", "subtype": "channel_join"},
                {"ts": "10.0", "user": "U9", "text": "vpn down", "reply_count": 1}
            ]
        }));
    });
    let post = server.mock(|when, then| {
        when.method(POST).path("/chat.postMessage");
        then.status(200)
            .json_body(json!({"ok": true, "channel": "C1", "ts": "31.0"}));
    });

    let temp = tempfile::tempdir().expect("tempdir");
    let preferences_path = temp.path().join("preferences.json");
    let services = assemble(&server, &preferences_path);

    services
        .dispatch_envelope(&home_opened("U1"))
        .await
        .expect("home opened");
    assert_eq!(publish.calls(), 1);
    assert_eq!(history.calls(), 0);

    services
        .dispatch_envelope(&channel_select("U1", &["C1"]))
        .await
        .expect("channel select");
    join.assert();
    history.assert();
    assert_eq!(publish.calls(), 2);
    assert_eq!(services.message_cache.message_count(), 2);

    services
        .dispatch_envelope(&channel_message("C1", "30.0", "U9", "badge reader broken"))
        .await
        .expect("channel message");
    let cached = services
        .message_cache
        .get_channel("C1")
        .expect("channel stays cached");
    assert_eq!(cached[0].ts, "30.0");
    assert_eq!(cached[0].display_name, "Grace");
    assert_eq!(cached[0].channel_name, "help");
    wait_for_calls(&publish, 3).await;
    assert_eq!(history.calls(), 1);

    services
        .dispatch_envelope(&reply_submission("U1", "C1", "30.0", "on my way"))
        .await
        .expect("reply submitted");
    post.assert();
    let parent = services
        .message_cache
        .get_message("C1", "30.0")
        .expect("parent cached");
    assert_eq!(parent.reply_count, 1);
    assert!(parent.has_team_reply);
    assert_eq!(publish.calls(), 4);

    services.shutdown().expect("shutdown");
}

#[tokio::test]
async fn integration_preferences_survive_restart() {
    let server = MockServer::start();
    mock_directory(&server);
    server.mock(|when, then| {
        when.method(POST).path("/views.publish");
        then.status(200).json_body(json!({"ok": true}));
    });
    server.mock(|when, then| {
        when.method(POST).path("/conversations.join");
        then.status(200).json_body(json!({"ok": true}));
    });
    server.mock(|when, then| {
        when.method(GET).path("/conversations.history");
        then.status(200)
            .json_body(json!({"ok": true, "messages": []}));
    });

    let temp = tempfile::tempdir().expect("tempdir");
    let preferences_path = temp.path().join("preferences.json");

    let first = assemble(&server, &preferences_path);
    first
        .dispatch_envelope(&home_opened("U1"))
        .await
        .expect("home opened");
    first
        .dispatch_envelope(&channel_select("U1", &["C1", "C2"]))
        .await
        .expect("channel select");
    first.shutdown().expect("shutdown");

    let raw = std::fs::read_to_string(&preferences_path).expect("preferences written");
    let persisted = serde_json::from_str::<Value>(&raw).expect("json");
    assert_eq!(persisted[0]["userId"], "U1");
    assert_eq!(persisted[0]["monitoredChannels"], json!(["C1", "C2"]));

    let reloaded = JsonFilePreferencesStore::load(preferences_path, Duration::from_secs(60));
    let prefs = reloaded.get("U1");
    assert!(prefs.onboarded);
    assert_eq!(prefs.monitored_channels, vec!["C1".to_string(), "C2".to_string()]);
    assert_eq!(reloaded.active_users(10 * 60 * 1_000), vec!["U1".to_string()]);
}

#[tokio::test]
async fn regression_bot_and_edited_messages_do_not_trigger_publishes() {
    let server = MockServer::start();
    mock_directory(&server);
    let publish = server.mock(|when, then| {
        when.method(POST).path("/views.publish");
        then.status(200).json_body(json!({"ok": true}));
    });

    let temp = tempfile::tempdir().expect("tempdir");
    let services = assemble(&server, &temp.path().join("preferences.json"));

    let bot_message = envelope(
        "events_api",
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "channel": "C1",
                "channel_type": "channel",
                "ts": "40.0",
                "bot_id": "B1",
                "text": "automated"
            }
        }),
    );
    let edited = envelope(
        "events_api",
        json!({
            "type": "event_callback",
            "event": {
                "type": "message",
                "subtype": "message_changed",
                "channel": "C1",
                "channel_type": "channel",
                "ts": "41.0"
            }
        }),
    );

    assert_eq!(services.dispatch_envelope(&bot_message).await.expect("bot"), 0);
    assert_eq!(services.dispatch_envelope(&edited).await.expect("edit"), 0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(publish.calls(), 0);
    assert_eq!(services.message_cache.channel_count(), 0);
}
