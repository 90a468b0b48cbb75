//! HTTP surface: health check, webhook callback and generated image hosting.

use std::sync::Arc;

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    routing::{get, post},
};
use log::{debug, error, info, warn};
use tower_http::services::ServeDir;

use crate::assets::STATIC_ROUTE;
use crate::error::{BotError, Result};
use crate::line::{ReplySender, SIGNATURE_HEADER, parse_text_events, verify_signature};
use crate::router::MessageRouter;
use crate::types::InboundEvent;

/// Shared state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub router: MessageRouter,
    pub replies: Arc<dyn ReplySender>,
    pub channel_secret: Arc<str>,
    pub public_base_url: Option<Arc<str>>,
}

pub fn build_router(state: AppState, static_dir: &std::path::Path) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/callback", post(callback))
        .nest_service(&format!("/{STATIC_ROUTE}"), ServeDir::new(static_dir))
        .with_state(state)
}

async fn home() -> &'static str {
    "Agent is running!"
}

async fn callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<&'static str> {
    debug!("Webhook delivery received: {} bytes", body.len());

    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| {
            warn!("Webhook delivery without {SIGNATURE_HEADER} header");
            BotError::SignatureInvalid
        })?;

    // An empty key is public knowledge, so nothing signed with it can be trusted
    if state.channel_secret.is_empty() {
        error!("Rejected webhook delivery: LINE_CHANNEL_SECRET is not configured");
        return Err(BotError::ConfigMissing("LINE_CHANNEL_SECRET"));
    }

    if !verify_signature(&state.channel_secret, &body, signature) {
        warn!("Rejected webhook delivery with invalid signature");
        return Err(BotError::SignatureInvalid);
    }

    let events = parse_text_events(&body).inspect_err(|e| {
        error!("Failed to decode webhook body: {e}");
    })?;

    let host_url = host_url(&state, &headers);

    for text_event in events {
        info!(
            "Received message from {}: {}",
            text_event.user_id.as_deref().unwrap_or("unknown"),
            text_event.text
        );

        let event = InboundEvent {
            reply_token: text_event.reply_token,
            text: text_event.text,
            host_url: host_url.clone(),
        };

        let Some(reply) = state.router.route(&event).await else {
            continue;
        };

        state
            .replies
            .reply(&event.reply_token, &reply)
            .await
            .inspect_err(|e| error!("Failed to deliver reply: {e}"))?;
    }

    Ok("OK")
}

/// Base URL generated assets are linked under.
///
/// The configured public URL wins; otherwise it is rebuilt from the request the way a
/// reverse proxy forwarded it.
fn host_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.public_base_url {
        return base.to_string();
    }

    let scheme = first_forwarded(headers, "x-forwarded-proto").unwrap_or("http");
    let host = first_forwarded(headers, "x-forwarded-host")
        .or_else(|| {
            headers
                .get(header::HOST)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        })
        .unwrap_or("localhost");

    format!("{scheme}://{host}/")
}

/// Value set by the proxy closest to the client in a comma-separated forwarding header.
fn first_forwarded<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}
