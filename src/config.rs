use std::env;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use log::{debug, info, warn};

use crate::error::{BotError, Result};

const DEFAULT_TEXT_MODEL: &str = "gemini-1.5-flash";
const DEFAULT_IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_STATIC_DIR: &str = "static";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;

/// Secrets the relay cannot work without, paired with their environment names.
const REQUIRED_SECRETS: [&str; 3] = [
    "LINE_CHANNEL_ACCESS_TOKEN",
    "LINE_CHANNEL_SECRET",
    "GEMINI_API_KEY",
];

#[derive(Debug, Clone)]
pub struct Config {
    pub line_channel_access_token: String,
    pub line_channel_secret: String,
    pub gemini_api_key: String,
    pub gemini_text_model: String,
    pub gemini_image_model: String,
    pub listen_addr: SocketAddr,
    pub static_dir: PathBuf,
    /// Overrides the host URL derived from each webhook request.
    pub public_base_url: Option<String>,
    /// When set, generated images older than this are swept periodically.
    pub image_ttl: Option<Duration>,
    pub http_timeout: Duration,
}

impl Config {
    /// Load configuration from the process environment (and `.env` if present).
    ///
    /// Missing secrets are not an error here; see [`Config::missing_secrets`].
    pub fn from_env() -> Result<Self> {
        debug!("Loading configuration from environment");
        dotenvy::dotenv().ok();

        let line_channel_access_token = secret_var("LINE_CHANNEL_ACCESS_TOKEN");
        let line_channel_secret = secret_var("LINE_CHANNEL_SECRET");
        let gemini_api_key = secret_var("GEMINI_API_KEY");

        let gemini_text_model = var_or("GEMINI_TEXT_MODEL", DEFAULT_TEXT_MODEL);
        let gemini_image_model = var_or("GEMINI_IMAGE_MODEL", DEFAULT_IMAGE_MODEL);

        let bind: IpAddr = var_or("BIND_ADDR", DEFAULT_BIND_ADDR).parse()?;
        let port = parse_var("PORT")?.unwrap_or(DEFAULT_PORT);
        let static_dir = PathBuf::from(var_or("STATIC_DIR", DEFAULT_STATIC_DIR));
        let public_base_url = env::var("PUBLIC_BASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let image_ttl = parse_var::<u64>("IMAGE_TTL_SECS")?.map(Duration::from_secs);
        let http_timeout = Duration::from_secs(
            parse_var("HTTP_TIMEOUT_SECS")?.unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
        );

        let config = Self {
            line_channel_access_token,
            line_channel_secret,
            gemini_api_key,
            gemini_text_model,
            gemini_image_model,
            listen_addr: SocketAddr::new(bind, port),
            static_dir,
            public_base_url,
            image_ttl,
            http_timeout,
        };

        info!("Configuration loaded successfully");
        debug!(
            "LINE access token length: {} characters",
            config.line_channel_access_token.len()
        );
        debug!(
            "LINE channel secret length: {} characters",
            config.line_channel_secret.len()
        );
        debug!(
            "Gemini API key length: {} characters",
            config.gemini_api_key.len()
        );
        debug!(
            "Gemini models: text={}, image={}",
            config.gemini_text_model, config.gemini_image_model
        );
        debug!("Static directory: {}", config.static_dir.display());

        Ok(config)
    }

    /// Names of the required secrets that are absent or blank.
    pub fn missing_secrets(&self) -> Vec<&'static str> {
        let values = [
            &self.line_channel_access_token,
            &self.line_channel_secret,
            &self.gemini_api_key,
        ];
        REQUIRED_SECRETS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.is_empty())
            .map(|(name, _)| *name)
            .collect()
    }

    /// Emit the startup diagnostic for missing secrets.
    ///
    /// The process keeps running; the first call needing a missing secret fails instead.
    pub fn report_missing_secrets(&self) {
        let missing = self.missing_secrets();
        if !missing.is_empty() {
            warn!(
                "Missing required secrets: [{}]; the relay will start but calls needing them will fail",
                missing.join(", ")
            );
        }
    }
}

fn secret_var(name: &str) -> String {
    env::var(name)
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

fn var_or(name: &str, default: &str) -> String {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BotError::Config(format!("{name} has an invalid value: '{raw}'"))),
        _ => Ok(None),
    }
}
