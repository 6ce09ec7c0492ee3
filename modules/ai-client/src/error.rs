use thiserror::Error;

pub type Result<T> = std::result::Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Rate limited (429): {0}")]
    RateLimited(String),

    #[error("Server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timed out or connection failed: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Empty completion from model")]
    Empty,
}

impl AiError {
    /// Whether a caller's retry schedule should apply. Auth and other 4xx
    /// failures are permanent; everything transient is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::RateLimited(_) | AiError::Server { .. } | AiError::Network(_)
        )
    }
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        AiError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for AiError {
    fn from(err: serde_json::Error) -> Self {
        AiError::Parse(err.to_string())
    }
}
