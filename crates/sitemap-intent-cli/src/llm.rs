//! Enrichment through an OpenAI-compatible chat-completions endpoint.

use crate::config::LlmConfig;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sitemap_intent::classifier::TextClassifier;
use sitemap_intent::{Error, Field, Result, UNKNOWN};
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Asks a chat model to name one unresolved field from slug tokens alone.
pub struct OpenAiClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

impl OpenAiClassifier {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.to_string(),
            api_key,
        })
    }

    /// Classifier for `config`, or `None` when enrichment is off.
    pub fn from_config(config: &LlmConfig) -> anyhow::Result<Option<Self>> {
        let Some(model) = config.active_model() else {
            return Ok(None);
        };
        Self::new(config.base_url(), model, config.resolve_api_key()).map(Some)
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn messages(field: Field, tokens: &[String]) -> Vec<ChatMessage> {
        let system = format!(
            "You label sitemap URLs. Reply with one lowercase word: the {field} the slug \
             tokens name. Use only the tokens. If they do not name one, reply \"{UNKNOWN}\"."
        );
        vec![
            ChatMessage {
                role: "system".into(),
                content: system,
            },
            ChatMessage {
                role: "user".into(),
                content: tokens.join(" "),
            },
        ]
    }
}

/// Reduce a model reply to a tag, or `None` for `unknown` and anything that
/// is not a single slug-like word.
pub fn parse_answer(answer: &str) -> Option<String> {
    let word = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.' || c == '`')
        .to_lowercase();
    let valid = !word.is_empty()
        && word != UNKNOWN
        && word.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    valid.then_some(word)
}

#[async_trait]
impl TextClassifier for OpenAiClassifier {
    async fn classify_unknown(&self, field: Field, tokens: &[String]) -> Result<Option<String>> {
        if tokens.is_empty() {
            return Ok(None);
        }
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: Self::messages(field, tokens),
        };
        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Enrichment(e.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Enrichment(format!("{} returned HTTP {status}", self.endpoint)));
        }
        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Enrichment(format!("unreadable completion: {e}")))?;

        let answer = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        let tag = parse_answer(&answer);
        debug!(%field, tokens = %tokens.join(" "), ?tag, "model answered");
        Ok(tag)
    }
}
