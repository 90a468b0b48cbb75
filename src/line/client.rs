//! Reply API client.

use async_trait::async_trait;
use log::{debug, info};
use serde::Serialize;

use crate::error::{BotError, Result};
use crate::types::OutboundReply;

const LINE_REPLY_URL: &str = "https://api.line.me/v2/bot/message/reply";

// LINE rejects text messages longer than 5000 characters
const MAX_TEXT_CHARS: usize = 5000;

/// Sends a reply into the conversation a reply token belongs to.
#[async_trait]
pub trait ReplySender: Send + Sync {
    async fn reply(&self, reply_token: &str, reply: &OutboundReply) -> Result<()>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReplyRequest<'a> {
    reply_token: &'a str,
    messages: Vec<SendMessage<'a>>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "camelCase")]
enum SendMessage<'a> {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        original_content_url: &'a str,
        preview_image_url: &'a str,
    },
}

impl<'a> From<&'a OutboundReply> for SendMessage<'a> {
    fn from(reply: &'a OutboundReply) -> Self {
        match reply {
            OutboundReply::Text(text) => SendMessage::Text {
                text: truncate_chars(text, MAX_TEXT_CHARS),
            },
            OutboundReply::Image {
                original_url,
                preview_url,
            } => SendMessage::Image {
                original_content_url: original_url,
                preview_image_url: preview_url,
            },
        }
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

pub struct LineClient {
    access_token: String,
    client: reqwest::Client,
}

impl LineClient {
    pub fn new(client: reqwest::Client, access_token: String) -> Self {
        Self {
            access_token,
            client,
        }
    }
}

#[async_trait]
impl ReplySender for LineClient {
    async fn reply(&self, reply_token: &str, reply: &OutboundReply) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(BotError::ConfigMissing("LINE_CHANNEL_ACCESS_TOKEN"));
        }

        let request = ReplyRequest {
            reply_token,
            messages: vec![SendMessage::from(reply)],
        };

        debug!("Sending reply to LINE");
        let response = self
            .client
            .post(LINE_REPLY_URL)
            .bearer_auth(&self.access_token)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::LineApi { status, message });
        }

        match reply {
            OutboundReply::Text(text) => {
                info!("Replied with text ({} characters)", text.chars().count());
            }
            OutboundReply::Image { original_url, .. } => {
                info!("Replied with image {original_url}");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn text_reply_wire_format() {
        let reply = OutboundReply::text("你好");
        let request = ReplyRequest {
            reply_token: "token",
            messages: vec![SendMessage::from(&reply)],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "replyToken": "token",
                "messages": [{"type": "text", "text": "你好"}]
            })
        );
    }

    #[test]
    fn image_reply_wire_format() {
        let reply = OutboundReply::image("https://relay.example.com/static/a.png");
        assert_eq!(
            serde_json::to_value(SendMessage::from(&reply)).unwrap(),
            json!({
                "type": "image",
                "originalContentUrl": "https://relay.example.com/static/a.png",
                "previewImageUrl": "https://relay.example.com/static/a.png"
            })
        );
    }

    #[test]
    fn long_text_is_truncated_on_char_boundary() {
        let reply = OutboundReply::text("貓".repeat(MAX_TEXT_CHARS + 10));
        let SendMessage::Text { text } = SendMessage::from(&reply) else {
            panic!("expected text message");
        };
        assert_eq!(text.chars().count(), MAX_TEXT_CHARS);
    }

    #[tokio::test]
    async fn missing_token_fails_before_any_request() {
        let client = LineClient::new(reqwest::Client::new(), String::new());
        let result = client.reply("token", &OutboundReply::text("hi")).await;
        assert!(matches!(
            result,
            Err(BotError::ConfigMissing("LINE_CHANNEL_ACCESS_TOKEN"))
        ));
    }
}
