use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out: {0}")]
    Timeout(#[source] reqwest::Error),

    #[error("connection failed: {0}")]
    Connect(#[source] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("malformed record at index {index}: {reason}")]
    MalformedPayload { index: usize, reason: String },

    #[error("provider configuration error: {0}")]
    Config(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout(err)
        } else if err.is_connect() {
            FetchError::Connect(err)
        } else if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Http(err)
        }
    }
}

impl FetchError {
    /// Short stable label used as the `cause` field of log events.
    pub fn cause(&self) -> &'static str {
        match self {
            FetchError::Timeout(_) => "timeout",
            FetchError::Connect(_) => "connection",
            FetchError::Http(_) => "http",
            FetchError::Status { .. } => "http_status",
            FetchError::Decode(_) => "decode",
            FetchError::MalformedPayload { .. } => "malformed_payload",
            FetchError::Config(_) => "config",
        }
    }

    /// True for failures of the request itself rather than of its content.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            FetchError::Timeout(_)
                | FetchError::Connect(_)
                | FetchError::Http(_)
                | FetchError::Status { .. }
        )
    }
}
