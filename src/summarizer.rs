//! Article summarization through the Gemini `generateContent` API.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::config::Config;
use crate::error::{IngestionError, Result};
use crate::http_client::{ServiceClient, SharedHttpClient};

/// Produces a condensed summary of one article
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Fails with `SummarizationFailed` on upstream errors and on empty or
    /// unusable responses.
    async fn summarize(&self, title: &str, text: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Deserialize)]
struct ResponseCandidate {
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Cuts `text` to at most `max_chars` characters without splitting one
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Prompt asking for a short, article-grounded market summary
pub fn build_prompt(title: &str, text: &str, max_chars: usize) -> String {
    format!(
        "Based ONLY on the following article content, provide a concise 3-4 sentence summary \
of the key financial developments and market implications.

Article Title: {title}

Article Content:
{content}

Provide your summary focusing on:
1. The main financial news or development
2. Key numbers or statistics mentioned
3. Market impact or implications

Summary:",
        title = title.trim(),
        content = truncate_chars(text, max_chars),
    )
}

/// Accepts a model response only if it is a real reduction of the article
pub fn validate_summary(summary: &str, article_text: &str, min_chars: usize) -> Result<String> {
    let summary = summary.trim();
    let chars = summary.chars().count();

    if summary.is_empty() {
        return Err(IngestionError::SummarizationFailed("empty summary".to_string()));
    }
    if chars < min_chars {
        return Err(IngestionError::SummarizationFailed(format!(
            "summary too short ({} chars, need {})",
            chars, min_chars
        )));
    }
    if summary == article_text.trim() {
        return Err(IngestionError::SummarizationFailed(
            "summary repeats the article text".to_string(),
        ));
    }

    Ok(summary.to_string())
}

/// Gemini REST client
pub struct GeminiSummarizer {
    client: ServiceClient,
    api_key: String,
    endpoint: String,
    min_summary_chars: usize,
    max_prompt_chars: usize,
}

impl GeminiSummarizer {
    pub fn new(
        http_client: Arc<SharedHttpClient>,
        api_key: String,
        base_url: &str,
        model: &str,
        rate_limit_rpm: u32,
    ) -> Self {
        let endpoint = format!(
            "{}/v1beta/models/{}:generateContent",
            base_url.trim_end_matches('/'),
            model
        );

        Self {
            client: ServiceClient::new(http_client, "gemini", rate_limit_rpm),
            api_key,
            endpoint,
            min_summary_chars: 50,
            max_prompt_chars: 8000,
        }
    }

    pub fn from_config(http_client: Arc<SharedHttpClient>, config: &Config) -> Result<Self> {
        let api_key = config
            .gemini_api_key
            .clone()
            .ok_or_else(|| IngestionError::SourceNotConfigured("gemini (GEMINI_API_KEY)".to_string()))?;

        Ok(Self::new(
            http_client,
            api_key,
            &config.gemini_api_url,
            &config.gemini_model,
            config.llm_rate_limit_rpm,
        )
        .with_limits(config.min_summary_chars, config.max_prompt_chars))
    }

    pub fn with_limits(mut self, min_summary_chars: usize, max_prompt_chars: usize) -> Self {
        self.min_summary_chars = min_summary_chars;
        self.max_prompt_chars = max_prompt_chars;
        self
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let request = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);

        let response = self.client.send(request).await?;
        let parsed: GenerateResponse = response.json().await?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| IngestionError::SummarizationFailed("no candidates in response".to_string()))?;

        let text: String = candidate
            .content
            .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(IngestionError::SummarizationFailed(format!(
                "empty response (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }

        Ok(text)
    }
}

#[async_trait]
impl Summarizer for GeminiSummarizer {
    #[instrument(skip(self, text), fields(chars = text.len()))]
    async fn summarize(&self, title: &str, text: &str) -> Result<String> {
        let prompt = build_prompt(title, text, self.max_prompt_chars);
        debug!(prompt_chars = prompt.len(), "Requesting summary");

        let raw = self.generate(&prompt).await.map_err(|e| match e {
            IngestionError::SummarizationFailed(_) => e,
            other => IngestionError::SummarizationFailed(other.to_string()),
        })?;

        let summary = validate_summary(&raw, text, self.min_summary_chars)?;
        info!(summary_chars = summary.len(), "Article summarized");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("short", 100), "short");
        assert_eq!(truncate_chars("€€€", 2), "€€");
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt(" Fed holds rates ", &"x".repeat(20), 10);
        assert!(prompt.contains("Article Title: Fed holds rates\n"));
        assert!(prompt.contains(&format!("Article Content:\n{}\n", "x".repeat(10))));
        assert!(!prompt.contains(&"x".repeat(11)));
        assert!(prompt.ends_with("Summary:"));
    }

    #[test]
    fn test_validate_summary() {
        let article = "Stocks rose. ".repeat(50);
        let good = "The S&P 500 gained 1.2% after the Fed held rates, lifting rate-sensitive sectors.";

        assert_eq!(validate_summary(&format!("  {}\n", good), &article, 50).unwrap(), good);
        assert!(validate_summary("   ", &article, 50).is_err());
        assert!(validate_summary("Too short.", &article, 50).is_err());
        assert!(validate_summary(&article, &article, 50).is_err());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [{"text": "Part one. "}, {"text": "Part two."}]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"promptTokenCount": 900}
        }"#;

        let parsed: GenerateResponse = serde_json::from_str(json).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .unwrap()
            .parts
            .iter()
            .filter_map(|p| p.text.clone())
            .collect();
        assert_eq!(text, "Part one. Part two.");
    }

    #[test]
    fn test_request_shape() {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart { text: "hi" }],
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["contents"][0]["role"], "user");
    }
}
