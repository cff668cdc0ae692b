use async_trait::async_trait;
use log::info;
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::error::Error as StdError;

use super::{ ChatClient, CompletionResponse };
use crate::error::ChatError;
use crate::llm::{ LlmConfig, LlmType };

pub struct OllamaChatClient {
    http: HttpClient,
    base_url: String,
    completion_model: String,
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaChatClient {
    pub fn new(base_url: Option<String>, completion_model: Option<String>) -> Self {
        let model = completion_model.unwrap_or_else(|| "cogito:3b".to_string());
        let url = base_url.unwrap_or_else(|| "http://localhost:11434".into());

        Self {
            http: HttpClient::new(),
            base_url: url,
            completion_model: model,
        }
    }

    pub fn from_config(config: &LlmConfig) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        if config.llm_type != LlmType::Ollama {
            return Err("Invalid config type for OllamaChatClient".into());
        }

        Ok(Self::new(config.base_url.clone(), config.completion_model.clone()))
    }
}

#[async_trait]
impl ChatClient for OllamaChatClient {
    async fn complete(&self, prompt: &str) -> Result<CompletionResponse, ChatError> {
        let url = format!("{}/api/generate", self.base_url);
        let req = GenerateRequest {
            model: self.completion_model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };
        info!("OllamaChatClient::complete() → model={} url={}", self.completion_model, url);

        let resp = self.http
            .post(&url)
            .json(&req)
            .send().await
            .and_then(|r| r.error_for_status())
            .map_err(|e| ChatError::Provider(Box::new(e)))?;
        let data = resp
            .json::<GenerateResponse>().await
            .map_err(|e| ChatError::Provider(Box::new(e)))?;

        if data.response.is_empty() {
            return Err(ChatError::provider("empty completion from Ollama"));
        }
        Ok(CompletionResponse { response: data.response })
    }
}
