//! HTTP seam between panel logic and the REST backend.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// JSON transport used for directory loads, hydration, seeding and
/// submissions. Implementations are single-threaded; nothing here is `Send`.
#[async_trait(?Send)]
pub trait ConsoleTransport {
    async fn get_json(&self, endpoint: &str) -> Result<Value, TransportError>;

    /// `csrf_token` is attached as `X-CSRF-TOKEN` only when present.
    async fn post_json(
        &self,
        endpoint: &str,
        body: &Value,
        csrf_token: Option<&str>,
    ) -> Result<Value, TransportError>;
}

pub const CSRF_HEADER: &str = "X-CSRF-TOKEN";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransportError {
    #[error("console_request_failed: {message}")]
    Network { message: String },
    #[error("console_http_status_{status}")]
    Http { status: u16, body: Option<Value> },
    #[error("console_response_decode_failed: {message}")]
    Decode { message: String },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }

    pub fn body(&self) -> Option<&Value> {
        match self {
            Self::Http { body, .. } => body.as_ref(),
            Self::Network { .. } | Self::Decode { .. } => None,
        }
    }

    pub fn is_client_error(&self) -> bool {
        self.status().is_some_and(|status| (400..500).contains(&status))
    }
}
