use async_trait::async_trait;
use thiserror::Error;

/// How a caller should treat a failed summarization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    RateLimit,
    Transient,
    Fatal,
}

#[derive(Debug, Error)]
pub enum SummarizeError {
    #[error("provider rate limit exceeded: {0}")]
    RateLimited(String),
    #[error("provider unreachable or temporarily failing: {0}")]
    Transient(String),
    #[error("provider rejected the request ({status}): {detail}")]
    Provider { status: u16, detail: String },
    #[error("provider request could not be built: {0}")]
    InvalidRequest(String),
    #[error("provider response could not be decoded: {0}")]
    InvalidResponse(String),
    #[error("provider returned an empty completion")]
    EmptyCompletion,
}

impl SummarizeError {
    pub fn class(&self) -> FailureClass {
        match self {
            Self::RateLimited(_) => FailureClass::RateLimit,
            Self::Transient(_) => FailureClass::Transient,
            Self::Provider { .. }
            | Self::InvalidRequest(_)
            | Self::InvalidResponse(_)
            | Self::EmptyCompletion => FailureClass::Fatal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.class() != FailureClass::Fatal
    }
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Returns the trimmed summary of `text`.
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError>;
}
