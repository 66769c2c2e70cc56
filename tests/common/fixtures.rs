//! Bot API wire fixtures and mock endpoints for E2E tests

use std::time::Duration;

use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::config::{TEST_CHANNEL_ID, TEST_TOKEN};

/// One `getUpdates` entry wrapping a channel post.
pub fn update(update_id: i64, post: Value) -> Value {
    json!({"update_id": update_id, "channel_post": post})
}

/// Text-only channel post from the relayed channel.
pub fn text_post(message_id: i64, text: &str) -> Value {
    json!({
        "message_id": message_id,
        "chat": {"id": TEST_CHANNEL_ID, "title": "Test Channel"},
        "date": 1700000000,
        "text": text,
    })
}

/// Photo album member, optionally captioned.
pub fn album_photo_post(
    message_id: i64,
    group: &str,
    file_id: &str,
    caption: Option<&str>,
) -> Value {
    let mut post = json!({
        "message_id": message_id,
        "chat": {"id": TEST_CHANNEL_ID, "title": "Test Channel"},
        "date": 1700000000,
        "media_group_id": group,
        "photo": [{"file_id": file_id}],
    });
    if let Some(caption) = caption {
        post["caption"] = json!(caption);
    }
    post
}

/// Mount a `getMe` endpoint answering with a fixed bot identity.
pub async fn mount_bot_profile(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{TEST_TOKEN}/getMe")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"id": 7, "first_name": "Relay", "username": "relay_bot"}
        })))
        .mount(server)
        .await;
}

/// Mount a `getUpdates` endpoint that hands out `updates` exactly once.
///
/// Mount this before [`mount_idle_updates`]; the first matching mock wins.
pub async fn mount_updates_once(server: &MockServer, updates: &[Value]) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{TEST_TOKEN}/getUpdates")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": updates})),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
}

/// Mount a catch-all `getUpdates` endpoint that parks briefly and returns
/// nothing, keeping the poll loop quiet for the rest of the test.
pub async fn mount_idle_updates(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{TEST_TOKEN}/getUpdates")))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true, "result": []}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(server)
        .await;
}

/// Mount the `getFile` resolution and the file download for one attachment.
pub async fn mount_file(server: &MockServer, file_id: &str, file_path: &str, bytes: &[u8]) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{TEST_TOKEN}/getFile")))
        .and(query_param("file_id", file_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {"file_path": file_path}
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/file/bot{TEST_TOKEN}/{file_path}")))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(bytes.to_vec()))
        .mount(server)
        .await;
}

/// Mount a `getFile` endpoint refusing one attachment.
pub async fn mount_file_refusal(server: &MockServer, file_id: &str, description: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/bot{TEST_TOKEN}/getFile")))
        .and(query_param("file_id", file_id))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": false,
            "description": description
        })))
        .mount(server)
        .await;
}

/// Mount the webhook endpoint answering every POST with `status`.
pub async fn mount_webhook(server: &MockServer, status: u16) {
    Mock::given(method("POST"))
        .and(path("/webhook"))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}
