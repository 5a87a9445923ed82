use crate::{errors::EndpointError, providers::ai::Generator};
use async_trait::async_trait;
use reqwest::Client as ReqwestClient;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434/api/generate";
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3.1:8b";

// --- Ollama `/api/generate` request and response structures ---

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "str::is_empty")]
    system: &'a str,
    stream: bool,
}

/// One line of the newline-delimited response body.
#[derive(Deserialize, Debug)]
struct OllamaChunk {
    #[serde(default)]
    response: String,
    #[serde(default)]
    done: bool,
}

/// A generator for Ollama's `/api/generate` endpoint.
///
/// The endpoint streams newline-delimited JSON objects; their `response`
/// fields are concatenated until one reports `done`.
#[derive(Clone, Debug)]
pub struct OllamaGenerator {
    client: ReqwestClient,
    api_url: String,
    model: String,
}

impl OllamaGenerator {
    pub fn new(api_url: String, model: String, timeout: Duration) -> Result<Self, EndpointError> {
        let client = ReqwestClient::builder()
            .timeout(timeout)
            .build()
            .map_err(EndpointError::ClientBuild)?;
        Ok(Self {
            client,
            api_url,
            model,
        })
    }
}

/// Concatenates the `response` fields of an NDJSON body, stopping at `done`.
/// Lines that fail to parse are skipped.
pub(crate) fn collect_ndjson_response(body: &str) -> Result<String, EndpointError> {
    let mut full_response = String::new();
    let mut parsed_any = false;
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        match serde_json::from_str::<OllamaChunk>(line) {
            Ok(chunk) => {
                parsed_any = true;
                full_response.push_str(&chunk.response);
                if chunk.done {
                    break;
                }
            }
            Err(e) => warn!("Skipping undecodable generation line: {e}"),
        }
    }
    if !parsed_any {
        return Err(EndpointError::Deserialize(
            "response body contained no JSON lines".to_string(),
        ));
    }
    Ok(full_response)
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, EndpointError> {
        let request_body = OllamaRequest {
            model: &self.model,
            prompt: user_prompt,
            system: system_prompt,
            stream: true,
        };

        let response = self
            .client
            .post(&self.api_url)
            .json(&request_body)
            .send()
            .await
            .map_err(EndpointError::Request)?;

        let status = response.status();
        debug!(status = %status, "Generation endpoint responded");
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(EndpointError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await.map_err(EndpointError::Request)?;
        collect_ndjson_response(&body)
    }
}
