//! Built-in tool implementations for PostClaw.
//!
//! The registry carries the social posting tool, which is the one
//! side-effecting capability the agent loop guards with backoff, plus a small
//! arithmetic tool that exercises the pass-through argument path.

pub mod add_numbers;
pub mod create_post;

use std::sync::Arc;
use postclaw_config::SocialConfig;
use postclaw_core::tool::ToolRegistry;

pub use add_numbers::AddTwoNumbersTool;
pub use create_post::{CreatePostTool, HttpSocialClient, PostError, PostReceipt, SocialClient};

/// Create the default tool registry.
///
/// Registration order is the order the model sees the schemas in.
pub fn default_registry(social: &SocialConfig) -> ToolRegistry {
    let client = Arc::new(HttpSocialClient::from_config(social));
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(AddTwoNumbersTool));
    registry.register(Box::new(CreatePostTool::new(
        &social.posting_tool,
        client,
        social.char_limit,
    )));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_lists_both_tools_in_order() {
        let registry = default_registry(&SocialConfig::default());
        assert_eq!(registry.names(), vec!["addTwoNumbers", "createPost"]);
    }

    #[test]
    fn posting_tool_name_follows_config() {
        let social = SocialConfig {
            posting_tool: "postToX".into(),
            ..SocialConfig::default()
        };
        let registry = default_registry(&social);
        assert!(registry.get("postToX").is_some());
        assert!(registry.get("createPost").is_none());
    }
}
