//! `createPost`: Publishes a status update to the social platform.
//!
//! The HTTP side sits behind [`SocialClient`] so the tool's error mapping can
//! be exercised without a network. Endpoint refusals come back as typed
//! `ToolError`s: 429 becomes `RateLimited` and 403 becomes
//! `PermissionDenied`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use postclaw_config::SocialConfig;
use postclaw_core::error::ToolError;
use postclaw_core::tool::{Tool, ToolResult};
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Receipt for a published post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostReceipt {
    pub id: String,
}

/// Failures reported by the posting endpoint.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PostError {
    #[error("Request failed with code 429: rate limit exceeded")]
    RateLimited { retry_after_secs: Option<u64> },

    #[error("Request failed with code 403: {0}")]
    Forbidden(String),

    #[error("Request failed with code {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("No bearer token configured")]
    NotConfigured,
}

/// A client for the posting endpoint.
#[async_trait]
pub trait SocialClient: Send + Sync {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError>;
}

/// `POST {base}/2/tweets` with a bearer token.
pub struct HttpSocialClient {
    base_url: String,
    bearer_token: Option<String>,
    client: reqwest::Client,
}

impl HttpSocialClient {
    pub fn new(base_url: impl Into<String>, bearer_token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token,
            client,
        }
    }

    pub fn from_config(social: &SocialConfig) -> Self {
        Self::new(
            &social.base_url,
            social.bearer_token.clone(),
            Duration::from_secs(social.request_timeout_secs),
        )
    }
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[async_trait]
impl SocialClient for HttpSocialClient {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError> {
        let token = self
            .bearer_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(PostError::NotConfigured)?;

        let url = format!("{}/2/tweets", self.base_url);
        debug!(url = %url, chars = text.chars().count(), "Publishing post");

        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| PostError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        match status {
            200 | 201 => {
                let body: CreateTweetResponse = response
                    .json()
                    .await
                    .map_err(|e| PostError::Api {
                        status,
                        message: format!("Unreadable response: {e}"),
                    })?;
                Ok(PostReceipt { id: body.data.id })
            }
            429 => {
                let retry_after_secs = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok());
                Err(PostError::RateLimited { retry_after_secs })
            }
            403 => Err(PostError::Forbidden(response.text().await.unwrap_or_default())),
            _ => Err(PostError::Api {
                status,
                message: response.text().await.unwrap_or_default(),
            }),
        }
    }
}

/// The posting tool exposed to the model.
pub struct CreatePostTool {
    name: String,
    client: Arc<dyn SocialClient>,
    char_limit: usize,
}

impl CreatePostTool {
    pub fn new(name: impl Into<String>, client: Arc<dyn SocialClient>, char_limit: usize) -> Self {
        Self {
            name: name.into(),
            client,
            char_limit,
        }
    }

    fn map_error(&self, err: PostError) -> ToolError {
        match err {
            PostError::RateLimited { retry_after_secs } => ToolError::RateLimited {
                tool_name: self.name.clone(),
                retry_after_secs,
                reason: err.to_string(),
            },
            PostError::Forbidden(_) => ToolError::PermissionDenied {
                tool_name: self.name.clone(),
                reason: format!("{err}. Check the app's write permissions and credentials"),
            },
            other => ToolError::ExecutionFailed {
                tool_name: self.name.clone(),
                reason: format!("Error posting to Twitter: {other}"),
            },
        }
    }
}

#[async_trait]
impl Tool for CreatePostTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Create a post on X formally known as Twitter"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The text of the post"
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let status = arguments["status"]
            .as_str()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;

        let chars = status.chars().count();
        if chars > self.char_limit {
            return Err(ToolError::InvalidArguments(format!(
                "Status is {chars} characters; the limit is {}",
                self.char_limit
            )));
        }

        match self.client.post(status).await {
            Ok(receipt) => {
                info!(tool = %self.name, id = %receipt.id, "Post published");
                Ok(ToolResult {
                    success: true,
                    output: format!("Tweeted: {status}"),
                    data: Some(serde_json::json!({ "id": receipt.id })),
                })
            }
            Err(e) => {
                warn!(tool = %self.name, error = %e, "Posting failed");
                Err(self.map_error(e))
            }
        }
    }
}
