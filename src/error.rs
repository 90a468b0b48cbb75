use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Reply sent when image generation fails for any reason.
pub const IMAGE_FALLBACK_MESSAGE: &str = "畫圖失敗了... 原因可能是涉及敏感內容或模型太忙碌。";

/// Reply sent when text generation fails for any reason.
pub const TEXT_FALLBACK_MESSAGE: &str = "大腦暫時短路了，請稍後再試。";

#[derive(Error, Debug)]
pub enum BotError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing required configuration: {0}")]
    ConfigMissing(&'static str),

    #[error("Invalid listen address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("Webhook signature is missing or invalid")]
    SignatureInvalid,

    #[error("Malformed webhook payload: {0}")]
    WebhookPayload(#[from] serde_json::Error),

    #[error("Gemini API error ({status}): {message}")]
    GeminiApi {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("Generation returned no usable content: {0}")]
    GenerationEmpty(String),

    #[error("LINE API error ({status}): {message}")]
    LineApi {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which generation path produced an error, used to pick the fallback reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationKind {
    Text,
    Image,
}

impl GenerationKind {
    /// Returns the fixed user-facing message for a failed generation.
    ///
    /// The cause is never shown to the user; it only ends up in the logs.
    pub fn user_message(self) -> &'static str {
        match self {
            GenerationKind::Text => TEXT_FALLBACK_MESSAGE,
            GenerationKind::Image => IMAGE_FALLBACK_MESSAGE,
        }
    }
}

impl BotError {
    /// HTTP status reported back to the platform when a webhook delivery fails.
    pub fn status_code(&self) -> StatusCode {
        match self {
            BotError::SignatureInvalid | BotError::WebhookPayload(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for BotError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = match self {
            BotError::SignatureInvalid => "Invalid signature",
            BotError::ConfigMissing(_) => "Webhook is not configured",
            BotError::WebhookPayload(_) => "Invalid payload",
            _ => "Internal server error",
        };
        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_map_to_bad_request() {
        assert_eq!(
            BotError::SignatureInvalid.status_code(),
            StatusCode::BAD_REQUEST
        );
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(
            BotError::WebhookPayload(json_err).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn delivery_failures_map_to_server_error() {
        let err = BotError::LineApi {
            status: reqwest::StatusCode::BAD_REQUEST,
            message: "Invalid reply token".to_string(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn each_generation_path_has_its_own_fallback() {
        assert_eq!(GenerationKind::Image.user_message(), IMAGE_FALLBACK_MESSAGE);
        assert_eq!(GenerationKind::Text.user_message(), TEXT_FALLBACK_MESSAGE);
    }
}
