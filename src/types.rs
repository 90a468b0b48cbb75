//! Common types used throughout the relay.

/// A decoded text message from the messaging platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Single-use token authorizing exactly one reply into the originating conversation
    pub reply_token: String,
    /// Raw message text as sent by the user
    pub text: String,
    /// Base URL under which `static/` is publicly reachable
    pub host_url: String,
}

/// The single message sent back for a triggering event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundReply {
    /// Plain text message
    Text(String),
    /// Image reference; LINE fetches both URLs itself
    Image {
        original_url: String,
        preview_url: String,
    },
}

impl OutboundReply {
    pub fn text(content: impl Into<String>) -> Self {
        OutboundReply::Text(content.into())
    }

    /// Image reply whose preview is the original image.
    pub fn image(url: impl Into<String>) -> Self {
        let url = url.into();
        OutboundReply::Image {
            original_url: url.clone(),
            preview_url: url,
        }
    }
}
