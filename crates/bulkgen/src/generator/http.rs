//! OpenAI-compatible chat-completions provider.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;

use crate::config::ProviderConfig;
use crate::error::BulkgenError;
use crate::sanitize::{sanitize_for_prompt, truncate_for_log, MAX_REASON_LEN};
use crate::secrets::resolve_secret_optional;
use crate::spreadsheet::RowSpec;

use super::{ContentGenerator, GeneratedArticle, GenerationError};

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChatMessage>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Generates articles through `POST {api_base}/chat/completions`.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    api_key: Option<SecretString>,
}

impl HttpGenerator {
    /// Builds a provider client, resolving the API key from config.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, BulkgenError> {
        let api_key = resolve_secret_optional(
            config.api_key.as_deref(),
            config.api_key_file.as_deref(),
            config.api_key_env_var.as_deref(),
        )?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenerationError::Unavailable(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.api_base.trim_end_matches('/')),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            api_key,
        })
    }

    fn headers(&self) -> Result<HeaderMap, GenerationError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {}", key.expose_secret()))
                .map_err(|_| GenerationError::Unauthorized("API key is not a valid header value".into()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    fn payload(&self, spec: &RowSpec) -> serde_json::Value {
        let (system, user) = build_prompt(spec);
        json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        })
    }
}

#[async_trait]
impl ContentGenerator for HttpGenerator {
    async fn generate(&self, spec: &RowSpec) -> Result<GeneratedArticle, GenerationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .headers(self.headers()?)
            .json(&self.payload(spec))
            .send()
            .await
            .map_err(classify_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            debug!("Provider returned {} for '{}'", status, spec.title);
            return Err(classify_status(status, retry_after, &body));
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                GenerationError::Timeout
            } else {
                GenerationError::InvalidResponse(e.to_string())
            }
        })?;
        interpret_response(&spec.title, parsed)
    }
}

/// System and user messages for one row.
fn build_prompt(spec: &RowSpec) -> (String, String) {
    let system = format!(
        "You are an experienced content writer. Write in a {} tone, in {}. \
         Reply in Markdown: start with a single '# ' title line, then an \
         introduction paragraph, then each section under a '## ' heading. \
         Do not add commentary outside the article.",
        spec.tone,
        spec.language.name(),
    );

    let mut user = format!("Write an article titled \"{}\".", sanitize_for_prompt(&spec.title));
    if spec.sub_headings.is_empty() {
        user.push_str("\nChoose 3 to 6 section headings yourself.");
    } else {
        user.push_str("\nUse exactly these section headings, in this order:");
        for heading in &spec.sub_headings {
            user.push_str("\n- ");
            user.push_str(&sanitize_for_prompt(heading));
        }
    }
    if !spec.keywords.is_empty() {
        let keywords: Vec<String> = spec.keywords.iter().map(|k| sanitize_for_prompt(k)).collect();
        user.push_str("\nWork these keywords in naturally: ");
        user.push_str(&keywords.join(", "));
    }

    (system, user)
}

fn interpret_response(
    fallback_title: &str,
    response: ChatResponse,
) -> Result<GeneratedArticle, GenerationError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::InvalidResponse("response has no choices".into()))?;

    if choice.finish_reason.as_deref() == Some("content_filter") {
        return Err(GenerationError::ContentPolicy(
            "provider filtered the generated content".into(),
        ));
    }

    let content = choice
        .message
        .and_then(|m| m.content)
        .unwrap_or_default();
    let article = GeneratedArticle::from_markdown(fallback_title, &content);
    if article.is_empty() {
        return Err(GenerationError::Unavailable("provider returned empty content".into()));
    }
    Ok(article)
}

fn classify_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() || e.is_request() {
        GenerationError::Unavailable(e.to_string())
    } else {
        GenerationError::InvalidInput(e.to_string())
    }
}

fn classify_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> GenerationError {
    let detail = format!("HTTP {}: {}", status.as_u16(), truncate_for_log(body, MAX_REASON_LEN));
    match status.as_u16() {
        408 => GenerationError::Timeout,
        429 => GenerationError::RateLimited { retry_after },
        500 | 502 | 503 | 504 => GenerationError::Unavailable(detail),
        401 | 403 => GenerationError::Unauthorized(detail),
        400 if body.contains("content_policy") || body.contains("content_filter") => {
            GenerationError::ContentPolicy(detail)
        }
        _ => GenerationError::InvalidInput(detail),
    }
}

/// Longest wait a `Retry-After` header can request. The retry policy caps
/// it further.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(60 * 60);

/// Parses a `Retry-After` value given either as delta-seconds or an HTTP date.
fn parse_retry_after(value: &str) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<f64>() {
        if !secs.is_finite() || secs < 0.0 {
            return None;
        }
        if secs >= MAX_RETRY_AFTER.as_secs_f64() {
            return Some(MAX_RETRY_AFTER);
        }
        return Duration::try_from_secs_f64(secs).ok();
    }
    let at = chrono::DateTime::parse_from_rfc2822(value).ok()?;
    let wait = at.with_timezone(&chrono::Utc) - chrono::Utc::now();
    wait.to_std().ok().map(|wait| wait.min(MAX_RETRY_AFTER))
}
