//! Trigger resolution and reply composition for inbound text messages.

use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, error, info};

use crate::assets::{AssetStore, public_url};
use crate::error::{GenerationKind, Result};
use crate::types::{InboundEvent, OutboundReply};

/// Prefix that turns a message into an image request.
pub const IMAGE_COMMAND: &str = "/畫圖";

/// Keyword that turns a message into a question for the assistant.
pub const ASSISTANT_KEYWORD: &str = "助手";

/// Generative model backing the relay.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Answer a prompt with generated text.
    async fn generate_text(&self, prompt: &str) -> Result<String>;

    /// Render a prompt into raw PNG bytes.
    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>>;
}

/// What a message asks the relay to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Trigger {
    Image(String),
    Assistant(String),
}

impl Trigger {
    /// Resolve the trigger for a message, image command first.
    ///
    /// Returns `None` when nothing matches or when the matched trigger leaves an
    /// empty prompt. A message starting with the image command is never treated as
    /// an assistant request, even if it also contains the keyword.
    pub fn parse(text: &str) -> Option<Trigger> {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix(IMAGE_COMMAND) {
            let prompt = rest.trim();
            return (!prompt.is_empty()).then(|| Trigger::Image(prompt.to_string()));
        }

        if text.contains(ASSISTANT_KEYWORD) {
            let prompt = text.replacen(ASSISTANT_KEYWORD, "", 1);
            let prompt = prompt.trim();
            return (!prompt.is_empty()).then(|| Trigger::Assistant(prompt.to_string()));
        }

        None
    }
}

#[derive(Clone)]
pub struct MessageRouter {
    generator: Arc<dyn Generator>,
    assets: AssetStore,
}

impl MessageRouter {
    pub fn new(generator: Arc<dyn Generator>, assets: AssetStore) -> Self {
        Self { generator, assets }
    }

    /// Produce at most one reply for an inbound message.
    ///
    /// Generation failures never escape: they are logged and replaced by the fixed
    /// fallback text for the branch that was taken.
    pub async fn route(&self, event: &InboundEvent) -> Option<OutboundReply> {
        let Some(trigger) = Trigger::parse(&event.text) else {
            debug!("No trigger in message, ignoring");
            return None;
        };

        let reply = match trigger {
            Trigger::Image(prompt) => {
                info!("Image request: '{prompt}'");
                self.draw(&prompt, &event.host_url)
                    .await
                    .unwrap_or_else(|e| {
                        error!("Image generation failed for '{prompt}': {e}");
                        OutboundReply::text(GenerationKind::Image.user_message())
                    })
            }
            Trigger::Assistant(prompt) => {
                info!("Assistant request: '{prompt}'");
                match self.generator.generate_text(&prompt).await {
                    Ok(text) => OutboundReply::Text(text),
                    Err(e) => {
                        error!("Text generation failed for '{prompt}': {e}");
                        OutboundReply::text(GenerationKind::Text.user_message())
                    }
                }
            }
        };

        Some(reply)
    }

    async fn draw(&self, prompt: &str, host_url: &str) -> Result<OutboundReply> {
        let bytes = self.generator.generate_image(prompt).await?;
        let asset = self.assets.save_png(&bytes).await?;
        let url = public_url(host_url, &asset.filename)?;
        debug!("Generated image available at {url}");
        Ok(OutboundReply::image(url))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::error::{BotError, IMAGE_FALLBACK_MESSAGE, TEXT_FALLBACK_MESSAGE};

    const HOST_URL: &str = "https://relay.example.com/";

    /// Records prompts and answers with canned results.
    #[derive(Default)]
    struct FakeGenerator {
        text: Option<String>,
        image: Option<Vec<u8>>,
        text_prompts: Mutex<Vec<String>>,
        image_prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for FakeGenerator {
        async fn generate_text(&self, prompt: &str) -> Result<String> {
            self.text_prompts.lock().unwrap().push(prompt.to_string());
            self.text.clone().ok_or_else(|| BotError::GeminiApi {
                status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
                message: "overloaded".to_string(),
            })
        }

        async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
            self.image_prompts.lock().unwrap().push(prompt.to_string());
            self.image
                .clone()
                .ok_or_else(|| BotError::GenerationEmpty("no image".to_string()))
        }
    }

    fn event(text: &str) -> InboundEvent {
        InboundEvent {
            reply_token: "reply-token".to_string(),
            text: text.to_string(),
            host_url: HOST_URL.to_string(),
        }
    }

    fn router(generator: Arc<FakeGenerator>, dir: &std::path::Path) -> MessageRouter {
        MessageRouter::new(generator, AssetStore::new(dir))
    }

    #[test]
    fn parse_ignores_plain_chatter() {
        assert_eq!(Trigger::parse("今天天氣很好"), None);
        assert_eq!(Trigger::parse(""), None);
        assert_eq!(Trigger::parse("畫圖 一隻貓"), None);
    }

    #[test]
    fn parse_requires_command_at_start() {
        assert_eq!(Trigger::parse("請 /畫圖 一隻貓"), None);
    }

    #[test]
    fn parse_empty_prompts_are_ignored() {
        assert_eq!(Trigger::parse("/畫圖  "), None);
        assert_eq!(Trigger::parse("助手"), None);
        assert_eq!(Trigger::parse("  助手  "), None);
    }

    #[test]
    fn parse_image_command() {
        assert_eq!(
            Trigger::parse("/畫圖 一隻貓在太空"),
            Some(Trigger::Image("一隻貓在太空".to_string()))
        );
    }

    #[test]
    fn parse_assistant_removes_first_keyword_only() {
        assert_eq!(
            Trigger::parse("助手 畫一隻貓的故事"),
            Some(Trigger::Assistant("畫一隻貓的故事".to_string()))
        );
        assert_eq!(
            Trigger::parse("助手 什麼是助手"),
            Some(Trigger::Assistant("什麼是助手".to_string()))
        );
    }

    #[test]
    fn parse_image_command_wins_over_keyword() {
        assert_eq!(
            Trigger::parse("/畫圖 助手的自畫像"),
            Some(Trigger::Image("助手的自畫像".to_string()))
        );
        assert_eq!(Trigger::parse("/畫圖 "), None);
        assert_eq!(Trigger::parse("/畫圖助手"), Some(Trigger::Image("助手".to_string())));
    }

    #[tokio::test]
    async fn unmatched_message_calls_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator::default());
        let reply = router(generator.clone(), dir.path())
            .route(&event("hello"))
            .await;

        assert_eq!(reply, None);
        assert!(generator.text_prompts.lock().unwrap().is_empty());
        assert!(generator.image_prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn assistant_reply_is_generated_text() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator {
            text: Some("從前從前有一隻貓".to_string()),
            ..Default::default()
        });
        let reply = router(generator.clone(), dir.path())
            .route(&event("助手 畫一隻貓的故事"))
            .await;

        assert_eq!(reply, Some(OutboundReply::text("從前從前有一隻貓")));
        assert_eq!(
            *generator.text_prompts.lock().unwrap(),
            vec!["畫一隻貓的故事".to_string()]
        );
    }

    #[tokio::test]
    async fn assistant_failure_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator::default());
        let reply = router(generator, dir.path())
            .route(&event("助手 你好"))
            .await;

        assert_eq!(reply, Some(OutboundReply::text(TEXT_FALLBACK_MESSAGE)));
    }

    #[tokio::test]
    async fn image_reply_points_at_stored_file() {
        let dir = tempfile::tempdir().unwrap();
        let png = b"\x89PNG\r\n\x1a\ncat".to_vec();
        let generator = Arc::new(FakeGenerator {
            image: Some(png.clone()),
            ..Default::default()
        });
        let reply = router(generator.clone(), dir.path())
            .route(&event("/畫圖 一隻貓在太空"))
            .await;

        let (original_url, preview_url) = match reply {
            Some(OutboundReply::Image {
                original_url,
                preview_url,
            }) => (original_url, preview_url),
            other => panic!("expected image reply, got {other:?}"),
        };
        assert_eq!(original_url, preview_url);

        let filename = original_url
            .strip_prefix("https://relay.example.com/static/")
            .expect("url under static/");
        assert!(filename.ends_with(".png"));
        assert_eq!(std::fs::read(dir.path().join(filename)).unwrap(), png);
        assert_eq!(
            *generator.image_prompts.lock().unwrap(),
            vec!["一隻貓在太空".to_string()]
        );
        assert!(generator.text_prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_image_payload_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator::default());
        let reply = router(generator, dir.path())
            .route(&event("/畫圖 一隻貓在太空"))
            .await;

        assert_eq!(reply, Some(OutboundReply::text(IMAGE_FALLBACK_MESSAGE)));
    }

    #[tokio::test]
    async fn unwritable_static_dir_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator {
            image: Some(b"png".to_vec()),
            ..Default::default()
        });
        let reply = router(generator, &dir.path().join("missing"))
            .route(&event("/畫圖 一隻貓"))
            .await;

        assert_eq!(reply, Some(OutboundReply::text(IMAGE_FALLBACK_MESSAGE)));
    }

    #[tokio::test]
    async fn image_command_does_not_fall_through() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(FakeGenerator {
            text: Some("should not be used".to_string()),
            ..Default::default()
        });
        let reply = router(generator.clone(), dir.path())
            .route(&event("/畫圖 助手"))
            .await;

        assert_eq!(reply, Some(OutboundReply::text(IMAGE_FALLBACK_MESSAGE)));
        assert!(generator.text_prompts.lock().unwrap().is_empty());
    }
}
