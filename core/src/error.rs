use thiserror::Error;

/// Failure of a single chat-completion attempt.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("empty response body")]
    EmptyBody,

    #[error("{0}")]
    Stream(String),
}

impl TransportError {
    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Status {
            status,
            body: body.into(),
        }
    }
}
