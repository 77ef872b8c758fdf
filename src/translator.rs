//! External translation capability.
//!
//! The rest of the crate only sees the [`Translator`] trait: text in, text
//! out, may fail. [`OpenAiTranslator`] implements it against an
//! OpenAI-compatible chat completions endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::error::TranslationError;
use crate::retry::{with_retry_if, RetryPolicy};

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` from `source_language` (may be `"auto"`) into
    /// `target_language`.
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

fn build_system_prompt(source_language: &str, target_language: &str) -> String {
    let source = if source_language == crate::language::AUTO_DETECT {
        "the detected source language".to_string()
    } else {
        format!("language code '{}'", source_language)
    };
    format!(
        r#"You are a professional translator for a film catalog. Translate the user's text from {} into the language with code '{}'.

Rules:
- Reply with the translation only, no preface or explanation
- Keep names of people, films and places as they are
- Preserve punctuation, line breaks and tone
- If the text is already in the target language, return it unchanged"#,
        source, target_language
    )
}

/// Client for an OpenAI-compatible chat completions endpoint
#[derive(Clone)]
pub struct OpenAiTranslator {
    client: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    retry: RetryPolicy,
}

impl OpenAiTranslator {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, TranslationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TranslationError::Request(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_url: api_url.into(),
            api_key: api_key.into(),
            model: model.into(),
            retry: RetryPolicy::translator(),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, TranslationError> {
        Self::new(
            &config.translator_api_url,
            &config.translator_api_key,
            &config.translator_model,
            config.translator_timeout,
        )
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send_once(&self, request: &ChatRequest) -> Result<String, TranslationError> {
        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| TranslationError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
            return Err(TranslationError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::Parse(e.to_string()))?;

        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content.trim().to_string())
            .ok_or(TranslationError::EmptyResponse)
    }
}

#[async_trait]
impl Translator for OpenAiTranslator {
    async fn translate(
        &self,
        text: &str,
        source_language: &str,
        target_language: &str,
    ) -> Result<String, TranslationError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                Message {
                    role: "system".to_string(),
                    content: build_system_prompt(source_language, target_language),
                },
                Message {
                    role: "user".to_string(),
                    content: text.to_string(),
                },
            ],
            temperature: 0.2,
        };

        debug!(
            "Translating {} chars {} -> {}",
            text.len(),
            source_language,
            target_language
        );

        with_retry_if(
            &self.retry,
            &format!("Translation to {}", target_language),
            || self.send_once(&request),
            TranslationError::is_retryable,
        )
        .await
    }
}
