use std::time::Duration;

use async_trait::async_trait;

use crate::errors::{TrigWatchError, TrigWatchResult};
use crate::llm::provider::LlmProvider;
use crate::llm::types::{CallConfig, ChatMessage, LlmResponse};

pub struct OpenAiCompatibleProvider {
    id: String,
    api_base: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(id: String, api_base: String, api_key: String, timeout: Duration) -> TrigWatchResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            id,
            api_base,
            api_key,
            client,
        })
    }
}

#[async_trait]
impl LlmProvider for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        &self.id
    }

    async fn chat(&self, messages: Vec<ChatMessage>, cfg: &CallConfig) -> TrigWatchResult<LlmResponse> {
        let mut body = serde_json::json!({
            "model": cfg.model,
            "messages": &messages,
            "stream": false,
            "temperature": cfg.temperature,
        });
        if cfg.json_mode {
            body["response_format"] = serde_json::json!({ "type": "json_object" });
        }

        tracing::debug!(
            provider = %self.id,
            model = %cfg.model,
            messages = messages.len(),
            "sending LLM request"
        );

        let mut request = self.client.post(&self.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(TrigWatchError::LlmProvider(format!("{}: {}", status, err_body)));
        }

        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| TrigWatchError::MalformedResponse("response has no message content".into()))?
            .to_string();

        tracing::debug!(provider = %self.id, content_len = content.len(), "LLM JSON response received");

        Ok(LlmResponse { content })
    }
}
