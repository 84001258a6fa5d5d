//! Handler error type.
//!
//! Every failure path renders a JSON body; provider internals are logged
//! with a correlation id and never returned to the caller.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::admission::Rejection;
use crate::metrics::ADMISSION_REJECTIONS;
use crate::models::{Envelope, ErrorBody};
use crate::provider::{ProviderError, classify};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request rejected: {rejection}")]
    Rejected { rejection: Rejection, client: String },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Pricing tier not found")]
    TierNotFound(String),

    #[error("metrics encoding failed: {0}")]
    Metrics(String),
}

impl ApiError {
    pub fn rejected(rejection: Rejection, client: &str) -> Self {
        ApiError::Rejected {
            rejection,
            client: client.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Rejected { rejection, client } => {
                ADMISSION_REJECTIONS
                    .with_label_values(&[rejection.reason()])
                    .inc();
                tracing::warn!(client = %client, reason = rejection.reason(), "Chat request rejected");

                let status = rejection.status_code();
                let mut res = (status, Json(rejection.body())).into_response();
                if let Rejection::RateLimited { retry_after_secs } = rejection {
                    res.headers_mut()
                        .insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                }
                res
            }
            ApiError::Provider(err) => {
                let failure = classify(err.kind);
                tracing::error!(
                    error_id = %failure.error_id,
                    kind = err.kind.label(),
                    detail = %err.detail,
                    "Chat completion failed"
                );

                let body = ErrorBody {
                    error_id: Some(failure.error_id.to_string()),
                    ..ErrorBody::new(failure.user_message)
                };
                (failure.status, Json(body)).into_response()
            }
            ApiError::TierNotFound(id) => {
                tracing::debug!(tier = %id, "Pricing tier not found");
                (
                    StatusCode::NOT_FOUND,
                    Json(Envelope::failure("Pricing tier not found")),
                )
                    .into_response()
            }
            ApiError::Metrics(msg) => {
                tracing::error!(message = %msg, "Metrics encoding failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new("Failed to encode metrics")),
                )
                    .into_response()
            }
        }
    }
}
