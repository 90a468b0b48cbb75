//! Text and image generation through the Gemini `generateContent` REST API.

use async_trait::async_trait;
use base64::{Engine, engine::general_purpose::STANDARD};
use log::debug;
use mime::Mime;
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};
use crate::router::Generator;

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// How much of a refusal text is kept in the error for logging.
const REFUSAL_PREVIEW_CHARS: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

/// Base64 payload returned for generated media
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateContentRequest {
    fn prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
            }],
            generation_config: None,
        }
    }

    fn image_prompt(prompt: &str) -> Self {
        Self {
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            }),
            ..Self::prompt(prompt)
        }
    }
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| content.parts.as_slice())
            .unwrap_or_default()
    }

    /// Why the response carries nothing usable, for the error log.
    fn empty_reason(&self) -> String {
        if let Some(reason) = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return format!("prompt blocked: {reason}");
        }
        match self.candidates.first() {
            None => "no candidates in response".to_string(),
            Some(candidate) => match candidate.finish_reason.as_deref() {
                Some(reason) => format!("no content (finish reason: {reason})"),
                None => "no content".to_string(),
            },
        }
    }
}

/// Concatenate every text part of the first candidate.
fn extract_text(response: &GenerateContentResponse) -> Result<String> {
    let text = response
        .first_parts()
        .iter()
        .filter_map(|part| part.text.as_deref())
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(BotError::GenerationEmpty(response.empty_reason()));
    }
    Ok(text)
}

/// Decode the first image part of the first candidate.
fn extract_image(response: &GenerateContentResponse) -> Result<Vec<u8>> {
    let parts = response.first_parts();

    let image = parts
        .iter()
        .filter_map(|part| part.inline_data.as_ref())
        .find(|data| is_image_mime(&data.mime_type));

    let Some(image) = image else {
        let refusal = parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        if refusal.trim().is_empty() {
            return Err(BotError::GenerationEmpty(response.empty_reason()));
        }
        return Err(BotError::GenerationEmpty(format!(
            "model returned text instead of image: {}",
            refusal.chars().take(REFUSAL_PREVIEW_CHARS).collect::<String>()
        )));
    };

    let bytes = STANDARD.decode(image.data.as_bytes())?;
    if bytes.is_empty() {
        return Err(BotError::GenerationEmpty("image payload is empty".to_string()));
    }
    debug!("Decoded {} image: {} bytes", image.mime_type, bytes.len());
    Ok(bytes)
}

fn is_image_mime(mime_type: &str) -> bool {
    mime_type
        .parse::<Mime>()
        .is_ok_and(|mime| matches!(mime.type_(), mime::IMAGE))
}

pub struct GeminiClient {
    api_key: String,
    client: reqwest::Client,
    text_model: String,
    image_model: String,
}

impl GeminiClient {
    pub fn new(
        client: reqwest::Client,
        api_key: String,
        text_model: String,
        image_model: String,
    ) -> Self {
        Self {
            api_key,
            client,
            text_model,
            image_model,
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> Result<GenerateContentResponse> {
        if self.api_key.is_empty() {
            return Err(BotError::ConfigMissing("GEMINI_API_KEY"));
        }

        debug!("Sending generateContent request to Gemini model {model}");
        let response = self
            .client
            .post(format!("{GEMINI_API_BASE}/{model}:generateContent"))
            .header("x-goog-api-key", &self.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response
                .text()
                .await
                .unwrap_or_else(|e| format!("Failed to read error response: {e}"));
            return Err(BotError::GeminiApi { status, message });
        }

        Ok(response.json().await?)
    }
}

#[async_trait]
impl Generator for GeminiClient {
    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateContentRequest::prompt(prompt);
        let response = self.generate_content(&self.text_model, &request).await?;
        let text = extract_text(&response)?;
        debug!("Received {} characters from Gemini", text.chars().count());
        Ok(text)
    }

    async fn generate_image(&self, prompt: &str) -> Result<Vec<u8>> {
        let request = GenerateContentRequest::image_prompt(prompt);
        let response = self.generate_content(&self.image_model, &request).await?;
        extract_image(&response)
    }
}
