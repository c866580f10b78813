//! Relevance classifier backed by the Anthropic Messages API.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use poag_core::home::API_KEY_ENV;
use poag_core::prompts::relevance_prompt;
use poag_core::{ClassifierError, PoagConfig, RelevanceClassifier, RelevanceRequest};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::reply::parse_object;

const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 2048;

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub struct AnthropicClassifier {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl AnthropicClassifier {
    pub fn from_config(config: &PoagConfig) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("poag/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.classifier_timeout_secs))
            .build()?;
        Ok(Self {
            client,
            endpoint: config.classifier_endpoint.clone(),
            model: config.classifier_model.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

#[async_trait]
impl RelevanceClassifier for AnthropicClassifier {
    async fn classify(
        &self,
        request: RelevanceRequest,
    ) -> Result<BTreeMap<String, String>, ClassifierError> {
        let Some(api_key) = &self.api_key else {
            return Err(ClassifierError::ConfigurationMissing(format!(
                "{API_KEY_ENV} is not set"
            )));
        };

        let body = MessagesRequest {
            model: &self.model,
            max_tokens: MAX_TOKENS,
            messages: [Message {
                role: "user",
                content: relevance_prompt(&request),
            }],
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClassifierError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Unavailable(format!("HTTP {status}: {detail}")));
        }

        let response: MessagesResponse = response
            .json()
            .await
            .map_err(|e| ClassifierError::MalformedResponse(e.to_string()))?;
        let text = response_text(&response);
        debug!(event = "classifier.reply", chars = text.len());
        parse_routing(&text)
    }
}

fn response_text(response: &MessagesResponse) -> String {
    response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_routing(text: &str) -> Result<BTreeMap<String, String>, ClassifierError> {
    parse_object(text).map_err(ClassifierError::MalformedResponse)
}
