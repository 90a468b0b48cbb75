//! Decoding of webhook delivery bodies.

use log::debug;
use serde::Deserialize;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct WebhookBody {
    #[serde(default)]
    events: Vec<WebhookEvent>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookEvent {
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    reply_token: Option<String>,
    #[serde(default)]
    source: Option<EventSource>,
    #[serde(default)]
    message: Option<EventMessage>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventSource {
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventMessage {
    #[serde(rename = "type")]
    message_type: String,
    #[serde(default)]
    text: Option<String>,
}

/// A text message event that can be replied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextEvent {
    pub reply_token: String,
    pub text: String,
    pub user_id: Option<String>,
}

/// Extract the repliable text message events from a webhook body.
///
/// Other event and message types are skipped. An empty event list is valid.
pub fn parse_text_events(body: &[u8]) -> Result<Vec<TextEvent>> {
    let body: WebhookBody = serde_json::from_slice(body)?;
    let total = body.events.len();

    let events: Vec<TextEvent> = body
        .events
        .into_iter()
        .filter_map(|event| {
            if event.event_type != "message" {
                debug!("Skipping '{}' event", event.event_type);
                return None;
            }
            let message = event.message?;
            if message.message_type != "text" {
                debug!("Skipping '{}' message", message.message_type);
                return None;
            }
            Some(TextEvent {
                reply_token: event.reply_token?,
                text: message.text?,
                user_id: event.source.and_then(|s| s.user_id),
            })
        })
        .collect();

    debug!("Webhook carried {total} events, {} text", events.len());
    Ok(events)
}
