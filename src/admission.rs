//! Request admission for the chat endpoint.
//!
//! Order of checks: input validation, then the per-client rate window, then
//! the content denylist. Validation failures never touch the rate store; a
//! request that passes the rate window has consumed its slot even if the
//! content screen rejects it afterwards.

use axum::http::StatusCode;
use std::sync::Arc;
use thiserror::Error;

use crate::config::AdmissionConfig;
use crate::models::ErrorBody;
use crate::rate_limit::{RateLimitStore, SlidingWindowLimiter, WindowDecision};

/// Keywords that mark a message as an attempt to misuse the assistant.
pub const DENYLIST: [&str; 5] = ["hack", "exploit", "attack", "bypass", "injection"];

/// Why a chat request was turned away before reaching the provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("message must be a non-empty string")]
    InvalidInput,

    #[error("message is {current_length} characters, limit is {max_length}")]
    MessageTooLong {
        current_length: usize,
        max_length: usize,
    },

    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("message matched the content denylist")]
    SuspiciousContent,
}

impl Rejection {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Rejection::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Rejection::InvalidInput
            | Rejection::MessageTooLong { .. }
            | Rejection::SuspiciousContent => StatusCode::BAD_REQUEST,
        }
    }

    /// Short label used for metrics and logs.
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::InvalidInput => "invalid_input",
            Rejection::MessageTooLong { .. } => "message_too_long",
            Rejection::RateLimited { .. } => "rate_limited",
            Rejection::SuspiciousContent => "suspicious_content",
        }
    }

    /// JSON body returned to the caller, with an actionable hint.
    pub fn body(&self) -> ErrorBody {
        match self {
            Rejection::InvalidInput => ErrorBody::new("Message is required")
                .with_hint("Please enter a message before sending."),
            Rejection::MessageTooLong {
                current_length,
                max_length,
            } => ErrorBody {
                current_length: Some(*current_length),
                max_length: Some(*max_length),
                ..ErrorBody::new("Message too long")
                    .with_hint(format!("Please keep your message under {max_length} characters."))
            },
            Rejection::RateLimited { retry_after_secs } => ErrorBody {
                retry_after: Some(*retry_after_secs),
                ..ErrorBody::new("Too many requests. Please wait a moment before trying again.")
            },
            Rejection::SuspiciousContent => {
                ErrorBody::new("Your message contains content that cannot be processed")
                    .with_hint("Please rephrase your message and try again.")
            }
        }
    }
}

pub struct AdmissionController {
    limiter: Arc<SlidingWindowLimiter>,
    max_message_length: usize,
}

impl AdmissionController {
    pub fn new(store: Arc<dyn RateLimitStore>, config: &AdmissionConfig) -> Self {
        Self {
            limiter: Arc::new(SlidingWindowLimiter::new(store, config)),
            max_message_length: config.max_message_length,
        }
    }

    /// Decide whether `message` from `client_key` may go to the provider.
    pub fn check(&self, client_key: &str, message: &str, now_ms: i64) -> Result<(), Rejection> {
        let trimmed = validate_message(message, self.max_message_length)?;

        match self.limiter.check(client_key, now_ms) {
            WindowDecision::Limited { retry_after_secs } => {
                return Err(Rejection::RateLimited { retry_after_secs });
            }
            WindowDecision::Allowed { remaining } => {
                tracing::trace!(remaining, "Rate window slot taken");
            }
        }

        if is_suspicious(trimmed) {
            return Err(Rejection::SuspiciousContent);
        }

        Ok(())
    }

    pub fn limiter(&self) -> &Arc<SlidingWindowLimiter> {
        &self.limiter
    }
}

/// Returns the trimmed message if it is non-empty and within `max_length` characters.
pub fn validate_message(message: &str, max_length: usize) -> Result<&str, Rejection> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(Rejection::InvalidInput);
    }

    let current_length = trimmed.chars().count();
    if current_length > max_length {
        return Err(Rejection::MessageTooLong {
            current_length,
            max_length,
        });
    }

    Ok(trimmed)
}

pub fn is_suspicious(message: &str) -> bool {
    let lowered = message.trim().to_lowercase();
    DENYLIST.iter().any(|word| lowered.contains(word))
}
