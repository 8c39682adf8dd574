use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use url::Url;

use crate::config::AppConfig;
use crate::constants::API_VERSION;
use crate::core::{Embedding, Generation, ModelClient, ModelInput, Part, TokenUsage};
use crate::error::RemoteError;

/// Gemini REST handle. Built once by the composition root and shared
/// read-only between requests.
pub struct GeminiClient {
    api_key: Option<String>,
    generation_model: String,
    embedding_model: String,
    endpoint: Url,
    http: Client,
}

impl GeminiClient {
    pub fn new(
        api_key: Option<String>,
        generation_model: String,
        embedding_model: String,
        endpoint: Url,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            api_key,
            generation_model,
            embedding_model,
            endpoint,
            http,
        })
    }

    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Self::new(
            cfg.api_key.clone(),
            cfg.generation_model.clone(),
            cfg.embedding_model.clone(),
            cfg.endpoint.clone(),
            Duration::from_secs(cfg.request_timeout_secs),
        )
    }

    fn method_url(&self, model: &str, method: &str) -> Result<Url, RemoteError> {
        self.endpoint
            .join(&format!("{API_VERSION}/models/{model}:{method}"))
            .map_err(|err| RemoteError::new(format!("invalid endpoint for {method}: {err}")))
    }

    async fn post(&self, model: &str, method: &str, body: &Value) -> Result<Value, RemoteError> {
        let url = self.method_url(model, method)?;
        let key = self.api_key.as_deref().unwrap_or_default();
        let resp = self
            .http
            .post(url)
            .query(&[("key", key)])
            .json(body)
            .send()
            .await
            .map_err(|err| RemoteError::new(format!("calling {method}: {err}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RemoteError::with_status(
                status.as_u16(),
                format!("{method} failed with status {status}: {text}"),
            ));
        }
        resp.json()
            .await
            .map_err(|err| RemoteError::new(format!("parsing {method} response: {err}")))
    }
}

#[async_trait]
impl ModelClient for GeminiClient {
    fn has_credential(&self) -> bool {
        self.api_key.as_deref().is_some_and(|key| !key.is_empty())
    }

    fn generation_model(&self) -> &str {
        &self.generation_model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    async fn generate_content(&self, input: &ModelInput) -> Result<Generation, RemoteError> {
        let request = generate_request(input);
        let payload = self
            .post(&self.generation_model, "generateContent", &request)
            .await?;
        let text = extract_text(&payload).ok_or_else(|| {
            let reason = payload
                .pointer("/promptFeedback/blockReason")
                .and_then(|v| v.as_str())
                .unwrap_or("no candidate text");
            RemoteError::new(format!("generateContent returned no text: {reason}"))
        })?;
        Ok(Generation {
            text,
            usage: extract_usage(payload.get("usageMetadata")),
        })
    }

    async fn embed_content(&self, text: &str) -> Result<Embedding, RemoteError> {
        let request = json!({
            "model": format!("models/{}", self.embedding_model),
            "content": { "parts": [{ "text": text }] },
        });
        let payload = self
            .post(&self.embedding_model, "embedContent", &request)
            .await?;
        Ok(Embedding {
            values: extract_embedding(&payload)?,
        })
    }
}

fn extract_embedding(payload: &Value) -> Result<Vec<f32>, RemoteError> {
    payload
        .pointer("/embedding/values")
        .and_then(|v| v.as_array())
        .ok_or_else(|| RemoteError::new("embedContent response missing embedding.values"))?
        .iter()
        .enumerate()
        .map(|(idx, v)| {
            v.as_f64()
                .map(|v| v as f32)
                .ok_or_else(|| RemoteError::new(format!("embedContent value {idx} is not a number: {v}")))
        })
        .collect()
}

fn part_json(part: &Part) -> Value {
    match part {
        Part::Text(text) => json!({ "text": text }),
        Part::Binary { data, mime_type } => json!({
            "inline_data": {
                "mime_type": mime_type,
                "data": BASE64.encode(data),
            }
        }),
    }
}

fn generate_request(input: &ModelInput) -> Value {
    let parts: Vec<Value> = input.parts().iter().map(part_json).collect();
    json!({
        "contents": [
            {
                "role": "user",
                "parts": parts,
            }
        ]
    })
}

fn extract_text(payload: &Value) -> Option<String> {
    let parts = payload
        .get("candidates")?
        .as_array()?
        .first()?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let pieces: Vec<&str> = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();
    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join(""))
    }
}

fn extract_usage(usage: Option<&Value>) -> TokenUsage {
    let Some(usage) = usage else {
        return TokenUsage::default();
    };
    let field = |name: &str| {
        usage
            .get(name)
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    };
    TokenUsage {
        input_tokens: field("promptTokenCount"),
        output_tokens: field("candidatesTokenCount"),
        total_tokens: field("totalTokenCount"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn embedding_values_must_all_be_numbers() {
        let ok = json!({ "embedding": { "values": [0.25, -1, 3.5] } });
        assert_eq!(extract_embedding(&ok).unwrap(), vec![0.25, -1.0, 3.5]);

        let bad = json!({ "embedding": { "values": [0.25, "NaN", 3.5] } });
        let err = extract_embedding(&bad).unwrap_err();
        assert!(err.message.contains("value 1"));

        let missing = json!({ "embedding": {} });
        assert!(extract_embedding(&missing).is_err());
    }

    #[test]
    fn binary_parts_are_base64_encoded_once() {
        let input = ModelInput::Parts(vec![
            Part::text("SYSTEM"),
            Part::text("Analyze this audio file."),
            Part::Binary {
                data: Bytes::from_static(b"hello"),
                mime_type: "audio/mpeg".into(),
            },
        ]);
        let request = generate_request(&input);
        let parts = request["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["text"], "SYSTEM");
        assert_eq!(parts[2]["inline_data"]["mime_type"], "audio/mpeg");
        assert_eq!(parts[2]["inline_data"]["data"], "aGVsbG8=");
        assert_eq!(request["contents"][0]["role"], "user");
    }

    #[test]
    fn bare_prompt_becomes_single_text_part() {
        let request = generate_request(&ModelInput::from("Explain osmosis"));
        assert_eq!(
            request["contents"][0]["parts"],
            json!([{ "text": "Explain osmosis" }])
        );
    }

    #[test]
    fn candidate_text_parts_are_concatenated() {
        let payload = json!({
            "candidates": [{
                "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] }
            }],
            "usageMetadata": {
                "promptTokenCount": 12,
                "candidatesTokenCount": 4,
                "totalTokenCount": 16
            }
        });
        assert_eq!(extract_text(&payload).as_deref(), Some("{\"a\":1}"));
        let usage = extract_usage(payload.get("usageMetadata"));
        assert_eq!(usage.input_tokens, Some(12));
        assert_eq!(usage.total_tokens, Some(16));
    }

    #[test]
    fn missing_candidates_yield_none() {
        assert!(extract_text(&json!({ "promptFeedback": { "blockReason": "SAFETY" } })).is_none());
        assert_eq!(extract_usage(None), TokenUsage::default());
    }

    #[test]
    fn method_urls_join_onto_endpoint() {
        let client = GeminiClient::new(
            None,
            "gemini-2.5-flash".into(),
            "embedding-001".into(),
            Url::parse("https://generativelanguage.googleapis.com").unwrap(),
            Duration::from_secs(5),
        )
        .unwrap();
        assert!(!client.has_credential());
        assert_eq!(
            client
                .method_url("embedding-001", "embedContent")
                .unwrap()
                .as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/embedding-001:embedContent"
        );
    }
}
