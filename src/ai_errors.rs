//! # AI Error Types Module
//!
//! This module defines the error kinds surfaced by the generative AI client.
//! HTTP failures are classified by status code; successful responses that do not
//! carry the expected payload get their own kinds so callers never mistake a
//! malformed response for an empty result.

use thiserror::Error;

/// Failure kinds for generative AI calls
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AiError {
    /// HTTP 429
    #[error("RATE_LIMIT: rate limit reached")]
    RateLimit,
    /// HTTP 400
    #[error("BAD_REQUEST: the request was rejected as invalid")]
    BadRequest,
    /// HTTP 401 or 403
    #[error("UNAUTHORIZED: API key is invalid or lacks permission (HTTP {status})")]
    Unauthorized { status: u16 },
    /// HTTP 5xx
    #[error("SERVER_ERROR: the AI service failed (HTTP {status})")]
    ServerError { status: u16 },
    /// Any other non-2xx status
    #[error("API_ERROR: HTTP status {status}")]
    Api { status: u16 },
    /// Response carried no candidates
    #[error("EMPTY_RESPONSE: the response contained no candidates")]
    EmptyResponse,
    /// First candidate carried no content parts
    #[error("EMPTY_CONTENT: the response candidate had no content")]
    EmptyContent,
    /// Image response without an inline image payload
    #[error("NO_IMAGE_DATA: the response contained no image data")]
    NoImageData,
    /// Connection, TLS or timeout failure before a status was received
    #[error("TRANSPORT: {0}")]
    Transport(String),
    /// 2xx response whose body was not the expected JSON document
    #[error("INVALID_BODY: {0}")]
    InvalidBody(String),
}

impl AiError {
    /// Classify a non-success HTTP status
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => AiError::RateLimit,
            400 => AiError::BadRequest,
            401 | 403 => AiError::Unauthorized { status },
            s if s >= 500 => AiError::ServerError { status },
            _ => AiError::Api { status },
        }
    }

    /// Stable upper-case code, matching the message prefix
    pub fn code(&self) -> &'static str {
        match self {
            AiError::RateLimit => "RATE_LIMIT",
            AiError::BadRequest => "BAD_REQUEST",
            AiError::Unauthorized { .. } => "UNAUTHORIZED",
            AiError::ServerError { .. } => "SERVER_ERROR",
            AiError::Api { .. } => "API_ERROR",
            AiError::EmptyResponse => "EMPTY_RESPONSE",
            AiError::EmptyContent => "EMPTY_CONTENT",
            AiError::NoImageData => "NO_IMAGE_DATA",
            AiError::Transport(_) => "TRANSPORT",
            AiError::InvalidBody(_) => "INVALID_BODY",
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Bad requests and credential failures fail identically on every attempt,
    /// so they are returned immediately instead of consuming the retry budget.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, AiError::BadRequest | AiError::Unauthorized { .. })
    }

    /// Whether the upstream answered but with an unusable payload
    pub fn is_malformed_response(&self) -> bool {
        matches!(
            self,
            AiError::EmptyResponse
                | AiError::EmptyContent
                | AiError::NoImageData
                | AiError::InvalidBody(_)
        )
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Transport(format!("request timed out: {err}"))
        } else if err.is_decode() {
            AiError::InvalidBody(err.to_string())
        } else {
            AiError::Transport(err.to_string())
        }
    }
}
