//! Client for an Ollama-compatible `/api/generate` endpoint.
//!
//! One non-streaming request per review, no retries. Every failure is turned
//! into a [`ReviewError`] whose message is fit to show to the submitter.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::ReviewerConfig;

/// Returned in place of a review when the endpoint answers without one.
pub const EMPTY_REVIEW: &str = "No analysis generated for the given code.";

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Error: Analysis timed out. Please try again.")]
    Timeout,

    /// Connection failures, non-2xx answers and undecodable bodies.
    #[error("Error analyzing code: {0}")]
    Request(String),
}

/// Produces natural-language review prose for a code snippet.
#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, code: &str, language: &str) -> Result<String, ReviewError>;
}

/// Flattens a review into text: the review itself or the error message.
pub async fn review_text(reviewer: &dyn Reviewer, code: &str, language: &str) -> String {
    match reviewer.review(code, language).await {
        Ok(text) => text,
        Err(e) => e.to_string(),
    }
}

#[must_use]
pub fn build_prompt(code: &str, language: &str) -> String {
    format!(
        "You are an expert code reviewer and a creative problem solver with a deep understanding of {language} development. Your task is to analyze the following code and provide:

1. A detailed breakdown of any bugs or errors, including their root causes and potential fixes.
2. Identification of security vulnerabilities, with recommendations for mitigation.
3. Suggestions for improving performance, with explanations of why these changes are beneficial.
4. Insights into code style and adherence to best practices, with examples of how to improve readability and maintainability.
5. Creative ideas for enhancing the functionality or design of the code, where applicable.

Be thorough, professional, and imaginative in your feedback. Provide line-by-line analysis where relevant, and ensure your suggestions are actionable and well-explained.

Code to analyze:
```{language}
{code}
```

Provide your comprehensive analysis:"
    )
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

pub struct OllamaReviewer {
    endpoint: Url,

    model: String,

    http_client: Client,

    timeout: Duration,
}

impl OllamaReviewer {
    pub fn from_config(config: &ReviewerConfig) -> Result<Self> {
        Self::with_timeout(
            &config.url,
            &config.model,
            Duration::from_secs(config.timeout_seconds),
        )
    }

    pub fn with_timeout(endpoint: &str, model: &str, timeout: Duration) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("Invalid reviewer URL: {endpoint}"))?;

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("Lintara/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build reviewer HTTP client")?;

        Ok(Self {
            endpoint,
            model: model.to_string(),
            http_client,
            timeout,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn map_transport_error(&self, e: &reqwest::Error) -> ReviewError {
        if e.is_timeout() {
            warn!("Reviewer request timed out after {:?}", self.timeout);
            ReviewError::Timeout
        } else {
            warn!("Reviewer request failed: {}", e);
            ReviewError::Request(e.to_string())
        }
    }
}

#[async_trait]
impl Reviewer for OllamaReviewer {
    async fn review(&self, code: &str, language: &str) -> Result<String, ReviewError> {
        let request = GenerateRequest {
            model: &self.model,
            prompt: build_prompt(code, language),
            stream: false,
        };

        debug!(
            model = %self.model,
            prompt_length = request.prompt.len(),
            "Sending review request"
        );

        let start = Instant::now();

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!("Reviewer returned error status {}: {}", status, body);
            return Err(ReviewError::Request(format!("HTTP {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| self.map_transport_error(&e))?;

        info!(
            "Review generated in {:.2}s (model={})",
            start.elapsed().as_secs_f64(),
            self.model
        );

        Ok(body.response.unwrap_or_else(|| EMPTY_REVIEW.to_string()))
    }
}
