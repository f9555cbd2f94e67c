use crate::config::ProviderSettings;
use crate::summarizer::{SummarizeError, Summarizer};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;

/// Chat-completion client for OpenAI-compatible providers.
pub struct OpenAiSummarizer {
    http: Client,
    settings: ProviderSettings,
}

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

impl OpenAiSummarizer {
    pub fn new(settings: ProviderSettings) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { http, settings })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.settings.base_url)
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(&self, text: &str) -> Result<String, SummarizeError> {
        let body = json!({
            "model": self.settings.model,
            "messages": [
                {"role": "system", "content": self.settings.system_prompt},
                {"role": "user", "content": text}
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        });

        let res = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = res.status();
        if !status.is_success() {
            let detail = res.text().await.unwrap_or_default();
            return Err(classify_status(status, detail));
        }

        // A body that stalls or drops mid-read is a transport failure, not a bad payload.
        let bytes = res.bytes().await.map_err(classify_transport)?;
        let completion: Completion = serde_json::from_slice(&bytes)
            .map_err(|e| SummarizeError::InvalidResponse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(SummarizeError::EmptyCompletion)
    }
}

fn classify_transport(e: reqwest::Error) -> SummarizeError {
    if e.is_builder() {
        SummarizeError::InvalidRequest(e.to_string())
    } else {
        SummarizeError::Transient(e.to_string())
    }
}

fn classify_status(status: StatusCode, detail: String) -> SummarizeError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        SummarizeError::RateLimited(detail)
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        SummarizeError::Transient(format!("{status}: {detail}"))
    } else {
        SummarizeError::Provider { status: status.as_u16(), detail }
    }
}
