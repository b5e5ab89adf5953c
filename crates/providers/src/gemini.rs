//! Google Gemini provider (`generateContent`).
//!
//! Sends the conversation as `contents` with `user`/`model` roles and the
//! tool schemas as `functionDeclarations`. Function calls come back as
//! `functionCall` parts with object arguments.

use async_trait::async_trait;
use postclaw_core::error::ProviderError;
use postclaw_core::provider::{GenerationRequest, GenerationResponse, GenerationService, Part, Usage};
use postclaw_core::tool::{ToolCall, ToolSchema};
use postclaw_core::turn::{Role, Turn};
use serde::Deserialize;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiProvider {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Point the provider at a different endpoint (proxies, test servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Build the `generateContent` JSON body.
    pub fn build_body(request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "contents": Self::to_contents(&request.turns),
            "generationConfig": {
                "temperature": request.temperature,
            },
        });

        if let Some(max_tokens) = request.max_tokens {
            body["generationConfig"]["maxOutputTokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!([{
                "functionDeclarations": Self::to_declarations(&request.tools),
            }]);
        }

        body
    }

    fn to_contents(turns: &[Turn]) -> Vec<serde_json::Value> {
        turns
            .iter()
            .map(|t| {
                let role = match t.role {
                    Role::User => "user",
                    Role::Model => "model",
                };
                let parts: Vec<_> = t
                    .parts
                    .iter()
                    .map(|p| serde_json::json!({ "text": p.text }))
                    .collect();
                serde_json::json!({ "role": role, "parts": parts })
            })
            .collect()
    }

    /// Gemini accepts only a subset of JSON Schema, so declarations carry the
    /// `type`, `properties`, and `required` keys and nothing else.
    fn to_declarations(tools: &[ToolSchema]) -> Vec<serde_json::Value> {
        tools
            .iter()
            .map(|t| {
                let mut parameters = serde_json::json!({
                    "type": t.parameters.get("type").cloned().unwrap_or_else(|| "object".into()),
                    "properties": t.parameters.get("properties").cloned().unwrap_or_else(|| serde_json::json!({})),
                });
                if let Some(required) = t.parameters.get("required") {
                    parameters["required"] = required.clone();
                }
                serde_json::json!({
                    "name": t.name,
                    "description": t.description,
                    "parameters": parameters,
                })
            })
            .collect()
    }

    /// Convert a decoded `generateContent` response.
    pub fn parse_response(
        api: ApiResponse,
        requested_model: &str,
    ) -> Result<GenerationResponse, ProviderError> {
        let candidate = api
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".into()))?;

        let parts = candidate
            .content
            .map(|c| c.parts)
            .unwrap_or_default()
            .into_iter()
            .filter_map(|p| match (p.function_call, p.text) {
                (Some(fc), _) => Some(Part::FunctionCall(ToolCall::new(fc.name, fc.args))),
                (None, Some(text)) => Some(Part::Text(text)),
                (None, None) => None,
            })
            .collect();

        let usage = api.usage_metadata.map(|u| Usage {
            prompt_tokens: u.prompt_token_count,
            completion_tokens: u.candidates_token_count,
            total_tokens: u.total_token_count,
        });

        Ok(GenerationResponse {
            parts,
            model: api.model_version.unwrap_or_else(|| requested_model.to_string()),
            usage,
        })
    }
}

#[async_trait]
impl GenerationService for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NotConfigured("Gemini API key is not set".into()));
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, request.model);
        let body = Self::build_body(&request);

        debug!(
            model = %request.model,
            turns = request.turns.len(),
            tools = request.tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let retry_after = crate::retry_after_secs(response.headers());
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Gemini returned error");
            return Err(crate::status_error(status, retry_after, error_body));
        }

        let api: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::parse_response(api, &request.model)
    }
}

// ── Gemini API wire types ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    usage_metadata: Option<ApiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    parts: Vec<ApiPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<ApiFunctionCall>,
}

#[derive(Debug, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
    #[serde(default)]
    total_token_count: u32,
}
