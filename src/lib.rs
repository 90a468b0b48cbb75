pub mod assets;
pub mod config;
pub mod error;
pub mod gemini;
pub mod line;
pub mod router;
pub mod server;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};

use assets::AssetStore;
use config::Config;
use error::Result;
use gemini::GeminiClient;
use line::LineClient;
use router::MessageRouter;
use server::{AppState, build_router};

/// Upper bound on how often the expired-image sweep runs.
const MAX_SWEEP_INTERVAL: Duration = Duration::from_secs(600);

/// Run the webhook relay until Ctrl-C.
pub async fn run() -> Result<()> {
    info!("Initializing relay");
    let config = Config::from_env()?;
    config.report_missing_secrets();

    let assets = AssetStore::new(&config.static_dir);
    assets.ensure_dir().await?;

    debug!("Building HTTP client");
    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;

    let generator = GeminiClient::new(
        http.clone(),
        config.gemini_api_key.clone(),
        config.gemini_text_model.clone(),
        config.gemini_image_model.clone(),
    );
    let replies = LineClient::new(http, config.line_channel_access_token.clone());

    let sweeper = config.image_ttl.map(|ttl| {
        let interval = ttl.min(MAX_SWEEP_INTERVAL).max(Duration::from_secs(1));
        assets.spawn_sweeper(ttl, interval)
    });

    let state = AppState {
        router: MessageRouter::new(Arc::new(generator), assets),
        replies: Arc::new(replies),
        channel_secret: config.line_channel_secret.as_str().into(),
        public_base_url: config.public_base_url.as_deref().map(Into::into),
    };
    let app = build_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    info!("Listening on {}", config.listen_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            info!("Shutdown signal received, shutting down...");
        })
        .await?;

    if let Some(handle) = sweeper {
        handle.abort();
    }

    Ok(())
}
