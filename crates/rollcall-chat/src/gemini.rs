//! Gemini `generateContent` client.

use crate::config::{ChatConfig, GenerationConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use crate::session::{ChatProvider, ProviderError, Role, Turn};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn from_turn(turn: &Turn) -> Self {
        let role = match turn.role {
            Role::User => "user",
            Role::Model => "model",
        };
        Self {
            role: Some(role.to_string()),
            parts: vec![Part {
                text: turn.text.clone(),
            }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    system_instruction: Content,
    generation_config: GenerationConfig,
}

impl GenerateRequest {
    fn build(config: &ChatConfig, history: &[Turn], turn: &str) -> Self {
        let mut contents: Vec<Content> = history.iter().map(Content::from_turn).collect();
        contents.push(Content::from_turn(&Turn::user(turn)));
        Self {
            contents,
            system_instruction: Content {
                role: None,
                parts: vec![Part {
                    text: config.system_instruction.clone(),
                }],
            },
            generation_config: config.generation.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn into_text(self) -> Result<String, ProviderError> {
        let Some(first) = self.candidates.into_iter().next() else {
            return Err(ProviderError::EmptyReply(None));
        };
        let text: String = first
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::EmptyReply(first.finish_reason));
        }
        Ok(text)
    }
}

#[derive(Clone)]
pub struct GeminiProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ProviderError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }
}

impl std::fmt::Debug for GeminiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiProvider")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl ChatProvider for GeminiProvider {
    fn generate(
        &self,
        config: &ChatConfig,
        history: &[Turn],
        turn: &str,
    ) -> impl Future<Output = Result<String, ProviderError>> + Send {
        let request = GenerateRequest::build(config, history, turn);
        let client = self.client.clone();
        let url = self.endpoint();
        let key = self.api_key.clone();

        async move {
            debug!(url = %url, turns = request.contents.len(), "sending chat request");
            let response = client
                .post(&url)
                .query(&[("key", key.as_str())])
                .json(&request)
                .send()
                .await
                .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ProviderError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            let parsed: GenerateResponse = response
                .json()
                .await
                .map_err(|e| ProviderError::Transport(e.without_url().to_string()))?;
            parsed.into_text()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let history = vec![Turn::user("What is Ashwagandha?"), Turn::model("An herb.")];
        let request = GenerateRequest::build(&ChatConfig::default(), &history, "Dosage?");
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["contents"].as_array().unwrap().len(), 3);
        assert_eq!(value["contents"][1]["role"], "model");
        assert_eq!(value["contents"][2]["parts"][0]["text"], "Dosage?");
        assert!(value["systemInstruction"].get("role").is_none());
        assert!(value["systemInstruction"]["parts"][0]["text"]
            .as_str()
            .unwrap()
            .contains("Aushadi Veda"));
        assert_eq!(value["generationConfig"]["temperature"], 1.0);
    }

    #[test]
    fn test_response_joins_first_candidate_parts() {
        let body = json!({
            "candidates": [
                {"content": {"role": "model", "parts": [{"text": "Tulsi "}, {"text": "is holy basil."}]}},
                {"content": {"role": "model", "parts": [{"text": "ignored"}]}}
            ]
        });
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "Tulsi is holy basil.");
    }

    #[test]
    fn test_blocked_response_is_empty_reply() {
        let body = json!({"candidates": [{"finishReason": "SAFETY"}]});
        let parsed: GenerateResponse = serde_json::from_value(body).unwrap();
        match parsed.into_text() {
            Err(ProviderError::EmptyReply(Some(reason))) => assert_eq!(reason, "SAFETY"),
            other => panic!("unexpected: {other:?}"),
        }

        let parsed: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(matches!(parsed.into_text(), Err(ProviderError::EmptyReply(None))));
    }

    #[test]
    fn test_provider_requires_key() {
        assert!(matches!(GeminiProvider::new("  "), Err(ProviderError::MissingApiKey)));
        let provider = GeminiProvider::new("k")
            .unwrap()
            .with_base_url("http://localhost:8080/")
            .with_model("gemini-test");
        assert_eq!(
            provider.endpoint(),
            "http://localhost:8080/v1beta/models/gemini-test:generateContent"
        );
        assert!(!format!("{provider:?}").contains("\"k\""));
    }
}
