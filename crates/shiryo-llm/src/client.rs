//! OpenAI-compatible chat-completions client.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Errors from the chat backend.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Request failed with an HTTP error status after retries.
    #[error("chat API returned status {0}")]
    Status(u16),

    /// Transport failure after retries.
    #[error("chat API network error: {0}")]
    Network(String),

    /// The response body did not carry a completion.
    #[error("malformed chat API response: {0}")]
    Malformed(String),
}

/// Connection settings for the chat endpoint.
#[derive(Clone, Debug)]
pub struct ChatConfig {
    /// API root, e.g. `https://ark.cn-beijing.volces.com/api/v3`.
    pub base_url: String,
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    pub temperature: f32,
    /// Whole-request budget.
    pub timeout: Duration,
    /// Attempts per call, including the first.
    pub max_retries: u8,
}

impl ChatConfig {
    /// Endpoint and model the original deployment ran against.
    pub const DEFAULT_BASE_URL: &'static str = "https://ark.cn-beijing.volces.com/api/v3";
    pub const DEFAULT_MODEL: &'static str = "doubao-seed-1-6-lite-251015";

    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: Self::DEFAULT_MODEL.to_string(),
            temperature: 0.3,
            timeout: Duration::from_secs(120),
            max_retries: 3,
        }
    }
}

/// A backend that can complete a single-turn prompt.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send one user prompt and return the assistant text.
    async fn complete(&self, prompt: &str) -> Result<String, ChatError>;

    /// The model identifier answers are attributed to.
    fn model(&self) -> &str;
}

/// Production backend over `reqwest` with retry on transient failures.
pub struct ChatClient {
    client: reqwest::Client,
    config: ChatConfig,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Build a client from the configuration.
    ///
    /// # Errors
    ///
    /// Fails if the HTTP client cannot be constructed.
    pub fn new(config: ChatConfig) -> Result<Self, ChatError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ChatError::Network(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

#[async_trait]
impl ChatBackend for ChatClient {
    async fn complete(&self, prompt: &str) -> Result<String, ChatError> {
        let body = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.config.temperature,
        });

        let mut last_error: Option<ChatError> = None;
        for attempt in 0..self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(500) * u32::from(attempt)).await;
            }
            let result = self
                .client
                .post(self.endpoint())
                .header("Authorization", format!("Bearer {}", self.config.api_key))
                .json(&body)
                .send()
                .await;
            match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed: ChatResponse = response
                            .json()
                            .await
                            .map_err(|e| ChatError::Malformed(e.to_string()))?;
                        let content = parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .ok_or_else(|| {
                                ChatError::Malformed("response carried no choices".to_string())
                            })?;
                        return Ok(content);
                    }
                    // 5xx and 429 are worth retrying; other statuses are not
                    let code = status.as_u16();
                    if (status.is_server_error() || code == 429)
                        && attempt + 1 < self.config.max_retries
                    {
                        tracing::warn!(status = code, attempt, "chat API error, retrying");
                        last_error = Some(ChatError::Status(code));
                        continue;
                    }
                    return Err(ChatError::Status(code));
                }
                Err(e) => {
                    last_error = Some(ChatError::Network(e.to_string()));
                }
            }
        }
        Err(last_error.unwrap_or_else(|| ChatError::Network("retries exhausted".into())))
    }

    fn model(&self) -> &str {
        &self.config.model
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// A backend that replays canned responses, for tests.
    pub struct CannedBackend {
        responses: Mutex<VecDeque<Result<String, ChatError>>>,
        model: String,
    }

    impl CannedBackend {
        pub fn new(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(
                    responses.into_iter().map(|r| Ok(r.to_string())).collect(),
                ),
                model: "canned-model".to_string(),
            }
        }

        /// A backend whose every call fails.
        pub fn failing() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                model: "canned-model".to_string(),
            }
        }
    }

    #[async_trait]
    impl ChatBackend for CannedBackend {
        async fn complete(&self, _prompt: &str) -> Result<String, ChatError> {
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Network("no canned response".into())))
        }

        fn model(&self) -> &str {
            &self.model
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_joins_without_double_slash() {
        let client = ChatClient::new(ChatConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            ..ChatConfig::new("key")
        })
        .unwrap();
        assert_eq!(client.endpoint(), "https://api.example.com/v1/chat/completions");
    }

    #[test]
    fn chat_response_parses() {
        let parsed: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("hello"));
    }

    #[tokio::test]
    async fn canned_backend_replays_in_order() {
        use testing::CannedBackend;
        let backend = CannedBackend::new(vec!["one", "two"]);
        assert_eq!(backend.complete("x").await.unwrap(), "one");
        assert_eq!(backend.complete("x").await.unwrap(), "two");
        assert!(backend.complete("x").await.is_err());
    }
}
