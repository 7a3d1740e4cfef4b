use crate::error::{AppError, AppResult};
use crate::services::prompts::{detailed_summary_prompt, short_summary_prompt};
use log::{error, info, warn};
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const SHORT_SUMMARY_MAX_TOKENS: u32 = 2048;
const DETAILED_SUMMARY_MAX_TOKENS: u32 = 20000;

/// A language model that turns a prompt into text.
#[rocket::async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> AppResult<String>;
}

pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> AppResult<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::GenerationApi(format!("failed to build HTTP client: {e}")))?;
        Ok(GeminiClient {
            http_client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }
}

#[rocket::async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str, max_output_tokens: u32) -> AppResult<String> {
        let url = format!("{GEMINI_BASE_URL}/{}:generateContent", self.model);
        let body = json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": 0.7,
                "maxOutputTokens": max_output_tokens,
            }
        });

        info!(
            "Sending prompt of {} characters to {}",
            prompt.len(),
            self.model
        );
        let res = self
            .http_client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::GenerationApi("Gemini request timed out".to_string())
                } else {
                    AppError::GenerationApi(format!("Gemini request failed: {}", e.without_url()))
                }
            })?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!("Gemini quota exceeded");
            return Err(AppError::GenerationApi(
                "Gemini API quota exceeded".to_string(),
            ));
        }
        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            error!("Gemini API error ({status}): {error_text}");
            return Err(AppError::GenerationApi(format!(
                "Gemini API returned {status}"
            )));
        }

        let response: Value = res
            .json()
            .await
            .map_err(|e| AppError::GenerationApi(format!("invalid Gemini response: {e}")))?;
        extract_text(&response)
    }
}

/// Pull the generated text out of a `generateContent` response body.
pub fn extract_text(response: &Value) -> AppResult<String> {
    if let Some(reason) = response["promptFeedback"]["blockReason"].as_str() {
        return Err(AppError::GenerationApi(format!(
            "content was blocked by Gemini: {reason}"
        )));
    }

    let candidate = &response["candidates"][0];
    if candidate["finishReason"].as_str() == Some("MAX_TOKENS") {
        warn!("Gemini response was truncated at the output token limit");
    }

    let text: String = candidate["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part["text"].as_str())
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(AppError::GenerationApi(
            "no summary could be generated, the response was empty".to_string(),
        ));
    }
    Ok(text.trim().to_string())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summaries {
    pub short: String,
    pub detailed: String,
}

#[derive(Clone)]
pub struct Summarizer {
    generator: Arc<dyn TextGenerator>,
}

impl Summarizer {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Summarizer { generator }
    }

    pub async fn short_summary(&self, caption_text: &str, language: &str) -> AppResult<String> {
        let prompt = short_summary_prompt(caption_text, language);
        self.generator
            .generate(&prompt, SHORT_SUMMARY_MAX_TOKENS)
            .await
    }

    pub async fn detailed_summary(&self, caption_text: &str, language: &str) -> AppResult<String> {
        let prompt = detailed_summary_prompt(caption_text, language);
        self.generator
            .generate(&prompt, DETAILED_SUMMARY_MAX_TOKENS)
            .await
    }

    /// Generate both summaries; fails if either one does.
    pub async fn summarize(&self, caption_text: &str, language: &str) -> AppResult<Summaries> {
        if caption_text.trim().is_empty() {
            return Err(AppError::Validation(
                "caption text must not be empty".to_string(),
            ));
        }

        let short = self.short_summary(caption_text, language).await?;
        info!("Generated short summary ({} characters)", short.len());
        let detailed = self.detailed_summary(caption_text, language).await?;
        info!("Generated detailed summary ({} characters)", detailed.len());

        Ok(Summaries { short, detailed })
    }
}
