//! Chat-completion provider boundary.
//!
//! Raw provider error codes are translated into [`ProviderErrorKind`] here and
//! nowhere else; handlers only ever see the closed enum.

use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ProviderConfig;
use crate::metrics::{PROVIDER_ERRORS, PROVIDER_LATENCY};
use crate::models::Usage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    QuotaExceeded,
    RateLimited,
    InvalidRequest,
    ContextTooLong,
    ContentFiltered,
    Unknown,
}

impl ProviderErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "insufficient_quota" => Self::QuotaExceeded,
            "rate_limit_exceeded" => Self::RateLimited,
            "invalid_request_error" => Self::InvalidRequest,
            "context_length_exceeded" => Self::ContextTooLong,
            "content_filter" => Self::ContentFiltered,
            _ => Self::Unknown,
        }
    }

    // Providers put the specific reason in `code` and a broader one in `type`
    fn translate(code: Option<&str>, error_type: Option<&str>) -> Self {
        match code.map(Self::from_code) {
            Some(kind) if kind != Self::Unknown => kind,
            _ => error_type.map(Self::from_code).unwrap_or(Self::Unknown),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::QuotaExceeded => "quota_exceeded",
            Self::RateLimited => "rate_limited",
            Self::InvalidRequest => "invalid_request",
            Self::ContextTooLong => "context_too_long",
            Self::ContentFiltered => "content_filtered",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Error)]
#[error("provider error ({}): {detail}", .kind.label())]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    // Raw code/message from the provider, logged but never returned
    pub detail: String,
}

impl ProviderError {
    fn new(kind: ProviderErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}

/// What the caller is told about a provider failure.
#[derive(Debug, Clone)]
pub struct ProviderFailure {
    pub user_message: &'static str,
    pub status: StatusCode,
    pub error_id: Uuid,
}

/// Map a provider failure to a safe message and status. Total over all kinds.
pub fn classify(kind: ProviderErrorKind) -> ProviderFailure {
    let (user_message, status) = match kind {
        ProviderErrorKind::QuotaExceeded => (
            "AI service is temporarily unavailable. Please try again later.",
            StatusCode::SERVICE_UNAVAILABLE,
        ),
        ProviderErrorKind::RateLimited => (
            "AI service is busy. Please try again in a moment.",
            StatusCode::TOO_MANY_REQUESTS,
        ),
        ProviderErrorKind::InvalidRequest => (
            "Invalid request. Please check your message and try again.",
            StatusCode::BAD_REQUEST,
        ),
        ProviderErrorKind::ContextTooLong => (
            "Your message is too long to process. Please simplify your message.",
            StatusCode::BAD_REQUEST,
        ),
        ProviderErrorKind::ContentFiltered => (
            "Your message was blocked by the content filter. Please rephrase it.",
            StatusCode::BAD_REQUEST,
        ),
        ProviderErrorKind::Unknown => (
            "An unexpected error occurred. Please try again later.",
            StatusCode::INTERNAL_SERVER_ERROR,
        ),
    };

    ProviderFailure {
        user_message,
        status,
        error_id: Uuid::new_v4(),
    }
}

// OpenAI-compatible wire format
#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: WireError,
}

#[derive(Deserialize)]
struct WireError {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    error_type: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub content: String,
    pub model: String,
    pub usage: Option<Usage>,
}

pub struct ChatClient {
    http: reqwest::Client,
    config: ProviderConfig,
}

impl ChatClient {
    pub fn new(config: ProviderConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub async fn complete(&self, message: &str) -> Result<Completion, ProviderError> {
        let started = Instant::now();
        let result = self.send(message).await;
        PROVIDER_LATENCY.observe(started.elapsed().as_secs_f64());

        if let Err(e) = &result {
            PROVIDER_ERRORS.with_label_values(&[e.kind.label()]).inc();
        }
        result
    }

    async fn send(&self, message: &str) -> Result<Completion, ProviderError> {
        let body = CompletionRequest {
            model: &self.config.model,
            messages: [
                WireMessage {
                    role: "system",
                    content: &self.config.system_prompt,
                },
                WireMessage {
                    role: "user",
                    content: message,
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let res = self
            .http
            .post(format!("{}/chat/completions", self.config.base_url))
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Unknown, format!("request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(error_from_response(status, &text));
        }

        let parsed: CompletionResponse = res
            .json()
            .await
            .map_err(|e| ProviderError::new(ProviderErrorKind::Unknown, format!("parse error: {e}")))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::new(ProviderErrorKind::Unknown, "response had no choices"))?;

        match choice.message.content {
            Some(content) if !content.is_empty() => Ok(Completion {
                content,
                model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
                usage: parsed.usage,
            }),
            _ if choice.finish_reason.as_deref() == Some("content_filter") => Err(
                ProviderError::new(ProviderErrorKind::ContentFiltered, "completion was filtered"),
            ),
            _ => Err(ProviderError::new(
                ProviderErrorKind::Unknown,
                "completion had no content",
            )),
        }
    }
}

fn error_from_response(status: reqwest::StatusCode, text: &str) -> ProviderError {
    match serde_json::from_str::<ErrorEnvelope>(text) {
        Ok(envelope) => {
            let err = envelope.error;
            let kind = ProviderErrorKind::translate(err.code.as_deref(), err.error_type.as_deref());
            ProviderError::new(
                kind,
                format!(
                    "HTTP {}: code={} type={} message={}",
                    status.as_u16(),
                    err.code.as_deref().unwrap_or("-"),
                    err.error_type.as_deref().unwrap_or("-"),
                    err.message.as_deref().unwrap_or("-"),
                ),
            )
        }
        Err(_) => {
            let kind = if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                ProviderErrorKind::RateLimited
            } else {
                ProviderErrorKind::Unknown
            };
            ProviderError::new(kind, format!("HTTP {}: {}", status.as_u16(), text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, http::HeaderMap, routing::post};
    use std::time::Duration;
    use tokio::net::TcpListener;

    fn test_config(base_url: String) -> ProviderConfig {
        ProviderConfig {
            api_key: "sk-test".to_string(),
            base_url,
            model: "test-model".to_string(),
            max_tokens: 64,
            temperature: 0.2,
            timeout: Duration::from_secs(2),
            system_prompt: "be brief".to_string(),
        }
    }

    async fn spawn_upstream(app: Router) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), handle)
    }

    fn failing_upstream(status: StatusCode, body: &'static str) -> Router {
        Router::new().route(
            "/chat/completions",
            post(move || async move { (status, body) }),
        )
    }

    #[test]
    fn codes_map_to_kinds() {
        let cases = [
            ("insufficient_quota", ProviderErrorKind::QuotaExceeded),
            ("rate_limit_exceeded", ProviderErrorKind::RateLimited),
            ("invalid_request_error", ProviderErrorKind::InvalidRequest),
            ("context_length_exceeded", ProviderErrorKind::ContextTooLong),
            ("content_filter", ProviderErrorKind::ContentFiltered),
            ("server_on_fire", ProviderErrorKind::Unknown),
        ];
        for (code, kind) in cases {
            assert_eq!(ProviderErrorKind::from_code(code), kind, "{code}");
        }
    }

    #[test]
    fn type_is_used_when_code_is_unknown() {
        assert_eq!(
            ProviderErrorKind::translate(Some("invalid_api_key"), Some("invalid_request_error")),
            ProviderErrorKind::InvalidRequest
        );
        assert_eq!(
            ProviderErrorKind::translate(None, Some("insufficient_quota")),
            ProviderErrorKind::QuotaExceeded
        );
        assert_eq!(ProviderErrorKind::translate(None, None), ProviderErrorKind::Unknown);
    }

    #[test]
    fn classification_statuses() {
        assert_eq!(classify(ProviderErrorKind::QuotaExceeded).status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(classify(ProviderErrorKind::RateLimited).status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(classify(ProviderErrorKind::InvalidRequest).status, StatusCode::BAD_REQUEST);
        assert_eq!(classify(ProviderErrorKind::ContentFiltered).status, StatusCode::BAD_REQUEST);
        assert_eq!(classify(ProviderErrorKind::Unknown).status, StatusCode::INTERNAL_SERVER_ERROR);

        let context = classify(ProviderErrorKind::ContextTooLong);
        assert_eq!(context.status, StatusCode::BAD_REQUEST);
        assert!(context.user_message.contains("simplify your message"));
    }

    #[test]
    fn every_classification_gets_a_fresh_id() {
        let a = classify(ProviderErrorKind::Unknown);
        let b = classify(ProviderErrorKind::Unknown);
        assert_ne!(a.error_id, b.error_id);
    }

    #[tokio::test]
    async fn successful_completion_is_returned() {
        let upstream = Router::new().route(
            "/chat/completions",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
                assert_eq!(body["model"], "test-model");
                assert_eq!(body["messages"][0]["role"], "system");
                assert_eq!(body["messages"][1]["content"], "hello");
                Json(serde_json::json!({
                    "model": "test-model-0125",
                    "choices": [{"message": {"role": "assistant", "content": "hi!"}, "finish_reason": "stop"}],
                    "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
                }))
            }),
        );
        let (base_url, handle) = spawn_upstream(upstream).await;

        let client = ChatClient::new(test_config(base_url)).unwrap();
        let completion = client.complete("hello").await.unwrap();
        assert_eq!(completion.content, "hi!");
        assert_eq!(completion.model, "test-model-0125");
        assert_eq!(completion.usage.map(|u| u.total_tokens), Some(7));

        handle.abort();
    }

    #[tokio::test]
    async fn provider_error_codes_are_translated() {
        let upstream = failing_upstream(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"message":"too many tokens","type":"invalid_request_error","code":"context_length_exceeded"}}"#,
        );
        let (base_url, handle) = spawn_upstream(upstream).await;

        let client = ChatClient::new(test_config(base_url)).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ContextTooLong);
        assert!(err.detail.contains("too many tokens"));

        handle.abort();
    }

    #[tokio::test]
    async fn quota_error_without_code_uses_type() {
        let upstream = failing_upstream(
            StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"out of credit","type":"insufficient_quota","code":null}}"#,
        );
        let (base_url, handle) = spawn_upstream(upstream).await;

        let client = ChatClient::new(test_config(base_url)).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::QuotaExceeded);

        handle.abort();
    }

    #[tokio::test]
    async fn bare_429_is_rate_limited() {
        let upstream = failing_upstream(StatusCode::TOO_MANY_REQUESTS, "slow down");
        let (base_url, handle) = spawn_upstream(upstream).await;

        let client = ChatClient::new(test_config(base_url)).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::RateLimited);

        handle.abort();
    }

    #[tokio::test]
    async fn filtered_completion_is_content_filtered() {
        let upstream = Router::new().route(
            "/chat/completions",
            post(|| async {
                Json(serde_json::json!({
                    "choices": [{"message": {"role": "assistant", "content": null}, "finish_reason": "content_filter"}]
                }))
            }),
        );
        let (base_url, handle) = spawn_upstream(upstream).await;

        let client = ChatClient::new(test_config(base_url)).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::ContentFiltered);

        handle.abort();
    }

    #[tokio::test]
    async fn unreachable_provider_is_unknown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = ChatClient::new(test_config(format!("http://{addr}"))).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::Unknown);
    }
}
