//! OpenAI-compatible provider.
//!
//! Works against api.openai.com or any server that speaks the same
//! `/v1/chat/completions` and `/v1/embeddings` shapes.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use super::provider::LlmProvider;
use super::types::ChatRequest;
use crate::core::errors::ApiError;

#[derive(Clone)]
pub struct OpenAiProvider {
    base_url: String,
    api_key: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client: Client::new(),
        }
    }
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<bool, ApiError> {
        let url = format!("{}/v1/models", self.base_url);
        let res = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .send()
            .await;
        match res {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn chat(&self, request: ChatRequest, model_id: &str) -> Result<String, ApiError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let mut body = json!({
            "model": model_id,
            "messages": request.messages,
            "stream": false,
        });

        if let Some(obj) = body.as_object_mut() {
            if let Some(t) = request.temperature {
                obj.insert("temperature".to_string(), json!(t));
            }
            if let Some(m) = request.max_tokens {
                obj.insert("max_tokens".to_string(), json!(m));
            }
        }

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ApiError::internal)?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Internal(format!("chat completion error: {}", text)));
        }

        let payload: Value = res.json().await.map_err(ApiError::internal)?;
        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(content)
    }

    async fn embed(&self, inputs: &[String], model_id: &str) -> Result<Vec<Vec<f32>>, ApiError> {
        let url = format!("{}/v1/embeddings", self.base_url);

        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": model_id,
                "input": inputs,
            }))
            .send()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        if !res.status().is_success() {
            let text = res.text().await.unwrap_or_default();
            return Err(ApiError::Embedding(format!("embeddings error: {}", text)));
        }

        let payload: EmbeddingsResponse = res
            .json()
            .await
            .map_err(|e| ApiError::Embedding(e.to_string()))?;

        if payload.data.len() != inputs.len() {
            return Err(ApiError::Embedding(format!(
                "expected {} embeddings, got {}",
                inputs.len(),
                payload.data.len()
            )));
        }

        Ok(payload.data.into_iter().map(|d| d.embedding).collect())
    }
}
