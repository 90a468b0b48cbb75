//! HMAC-SHA256 webhook signatures as sent in `X-Line-Signature`.

use base64::{Engine, engine::general_purpose::STANDARD};
use hmac::{Hmac, Mac};
use log::debug;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-line-signature";

fn mac_for(channel_secret: &str, body: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length, so this never fails
    let mut mac = HmacSha256::new_from_slice(channel_secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC can take key of any size"));
    mac.update(body);
    mac
}

/// Base64-encoded signature of a webhook body.
pub fn sign_body(channel_secret: &str, body: &[u8]) -> String {
    STANDARD.encode(mac_for(channel_secret, body).finalize().into_bytes())
}

/// Check a webhook body against its signature header in constant time.
pub fn verify_signature(channel_secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = STANDARD.decode(signature.trim()) else {
        debug!("Signature header is not valid base64");
        return false;
    };
    mac_for(channel_secret, body).verify_slice(&expected).is_ok()
}
