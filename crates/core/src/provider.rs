//! GenerationService trait: the abstraction over LLM backends.
//!
//! A generation service receives the full conversation plus the available
//! tool schemas and answers with content parts: natural-language text, a
//! structured function call, or both.
//!
//! Implementations: Gemini `generateContent`, OpenAI-compatible endpoints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;
use crate::tool::{ToolCall, ToolSchema};
use crate::turn::Turn;

/// One request to a generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// The model to use (e.g., "gemini-2.0-flash")
    pub model: String,

    /// The conversation so far, in order
    pub turns: Vec<Turn>,

    /// Tools the model may call
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<ToolSchema>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

/// A content part returned by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Part {
    Text(String),
    FunctionCall(ToolCall),
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// A complete response from a generation service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Content parts in the order the model produced them
    pub parts: Vec<Part>,

    /// Which model actually responded
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl GenerationResponse {
    /// A response holding a single text part.
    pub fn text(model: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            parts: vec![Part::Text(text.into())],
            model: model.into(),
            usage: None,
        }
    }

    /// A response holding a single function call.
    pub fn call(model: impl Into<String>, call: ToolCall) -> Self {
        Self {
            parts: vec![Part::FunctionCall(call)],
            model: model.into(),
            usage: None,
        }
    }

    /// The one part the loop acts on this round.
    ///
    /// A function call wins over text; otherwise the first non-empty text
    /// part. Returns `None` when the model produced nothing usable.
    pub fn first_actionable(&self) -> Option<&Part> {
        self.parts
            .iter()
            .find(|p| matches!(p, Part::FunctionCall(_)))
            .or_else(|| {
                self.parts
                    .iter()
                    .find(|p| matches!(p, Part::Text(t) if !t.trim().is_empty()))
            })
    }
}

/// The generation service trait.
///
/// The orchestration loop calls `generate()` without knowing which backend is
/// in use.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// A human-readable name for this service (e.g., "gemini").
    fn name(&self) -> &str;

    /// Send the conversation and tool schemas, get the model's parts back.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;
}
