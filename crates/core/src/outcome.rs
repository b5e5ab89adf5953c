//! Tagged outcome of a tool dispatch.
//!
//! Typed `ToolError`s map straight onto a variant. A result the tool marked
//! as failed is scanned for the error signatures a remote tool server reports
//! ("Error ...", "429", "rate limit", "403"), so a tool that only speaks text
//! is classified the same way. Successful results are never scanned: a post
//! may legitimately mention "429".

use serde::{Deserialize, Serialize};
use crate::error::ToolError;
use crate::tool::ToolResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// The tool ran and reported this text.
    Success(String),
    /// The endpoint refused because of rate limiting.
    RateLimited {
        retry_after_secs: Option<u64>,
        message: String,
    },
    /// The endpoint refused the credentials; retrying cannot help.
    PermissionDenied(String),
    /// Any other failure.
    Failed(String),
}

impl ToolOutcome {
    /// Classify the raw result of `ToolRegistry::call`.
    pub fn from_result(result: Result<ToolResult, ToolError>) -> Self {
        match result {
            Ok(r) if r.success => Self::Success(r.output),
            Ok(r) => Self::from_text(&r.output).unwrap_or(Self::Failed(r.output)),
            Err(e @ ToolError::RateLimited { retry_after_secs, .. }) => Self::RateLimited {
                retry_after_secs,
                message: e.to_string(),
            },
            Err(e @ ToolError::PermissionDenied { .. }) => Self::PermissionDenied(e.to_string()),
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// Classify a textual result by its error signature.
    ///
    /// Returns `None` when the text carries no error signature.
    pub fn from_text(text: &str) -> Option<Self> {
        if !(text.contains("Error") || text.contains("error")) {
            return None;
        }

        let lower = text.to_lowercase();
        if lower.contains("rate limit") || text.contains("429") {
            Some(Self::RateLimited {
                retry_after_secs: None,
                message: text.to_string(),
            })
        } else if text.contains("403") {
            Some(Self::PermissionDenied(text.to_string()))
        } else {
            Some(Self::Failed(text.to_string()))
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// The human-readable text carried by this outcome.
    pub fn message(&self) -> &str {
        match self {
            Self::Success(m) | Self::PermissionDenied(m) | Self::Failed(m) => m,
            Self::RateLimited { message, .. } => message,
        }
    }
}
