//! Event-stream helpers and webhook body assertions for E2E tests

use std::time::Duration;

use tg_discord_relay::Event;
use tokio::sync::broadcast;
use wiremock::MockServer;

/// Wait for an event matching `predicate`, consuming others.
///
/// Subscribe before starting the flow under test; events sent before the
/// subscription existed are not replayed.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<Event>,
    timeout: Duration,
    predicate: F,
) -> Option<Event>
where
    F: Fn(&Event) -> bool,
{
    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(event) if predicate(&event) => return Some(event),
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    })
    .await;

    result.ok().flatten()
}

/// Bodies of every request the webhook mock recorded, as lossy strings.
///
/// The Discord mock server only ever receives webhook POSTs, so no
/// filtering is needed.
pub async fn webhook_bodies(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .expect("webhook mock should be recording")
        .iter()
        .map(|request| String::from_utf8_lossy(&request.body).into_owned())
        .collect()
}

/// Count the `files[i]` parts in a multipart webhook body.
pub fn count_file_parts(body: &str) -> usize {
    body.matches("name=\"files[").count()
}

/// Assert the multipart body carries a file part with the given filename.
pub fn assert_has_file(body: &str, filename: &str) {
    assert!(
        body.contains(&format!("filename=\"{filename}\"")),
        "expected a file part named {filename:?} in webhook body: {body}"
    );
}
