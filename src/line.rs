//! LINE Messaging API: webhook verification, event decoding and replies.

mod client;
mod signature;
mod webhook;

pub use client::{LineClient, ReplySender};
pub use signature::{SIGNATURE_HEADER, sign_body, verify_signature};
pub use webhook::{TextEvent, parse_text_events};
