//! Implicit-intent classifier.
//!
//! Models do not always emit a function call when asked to post. When the
//! reply is plain text, this decides whether it should be posted anyway, or
//! whether the user's own message answers an earlier "what should I post?"
//! question and should be posted instead.
//!
//! Checks run in this order:
//! 1. an empty reply never yields a call, not even a clarification answer
//! 2. a recorded rate limit suppresses every implicit call
//! 3. the latest user turn must be typed input, not a tool report
//! 4. clarification answer: the user's text is the payload
//! 5. the user asked to post on a platform and did not ask a question
//! 6. a reply asking for more information is not posted, unless the user
//!    asked the model to write the content

use postclaw_core::tool::ToolCall;
use postclaw_core::turn::{Conversation, TurnIntent};
use tracing::debug;

use crate::sanitize::clean_payload;

const POSTING_VERBS: [&str; 3] = ["post", "tweet", "share"];
const PLATFORM_TERMS: [&str; 3] = ["twitter", "tweet", "social media"];
const QUESTION_MARKERS: [&str; 4] = ["?", "guide", "help", "explain"];
const AUTHORING_VERBS: [&str; 6] = ["write", "generate", "create", "compose", "draft", "make"];

const PROMPTING_PHRASES: [&str; 11] = [
    "what would you like to post",
    "what would you like to tweet",
    "what would you like to share",
    "what would you like the post",
    "what would you like the tweet",
    "what should the post say",
    "what should the tweet say",
    "what do you want to post",
    "what do you want to tweet",
    "let me know what you'd like",
    "let me know what you would like",
];

/// Decides when a free-text reply becomes a posting call.
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    posting_tool: String,
    canonical_key: String,
}

impl IntentClassifier {
    pub fn new(posting_tool: impl Into<String>, canonical_key: impl Into<String>) -> Self {
        Self {
            posting_tool: posting_tool.into(),
            canonical_key: canonical_key.into(),
        }
    }

    /// Classify `model_text`, which has not been appended to `conversation`
    /// yet. Returns the call to dispatch, if any.
    pub fn classify(&self, conversation: &Conversation, model_text: &str) -> Option<ToolCall> {
        if model_text.trim().is_empty() {
            return None;
        }

        if conversation.has_rate_limit_flag() {
            debug!("Implicit call suppressed: rate limit recorded");
            return None;
        }

        let user_turn = conversation.last_user_turn()?;
        if user_turn.intent != TurnIntent::Input {
            return None;
        }
        let user_text = user_turn.text();
        let user_lower = user_text.to_lowercase();

        if let Some(question) = conversation.model_turn_before_last_user() {
            if asks_for_content(&question.text().to_lowercase()) {
                debug!("User answered a request for post content");
                return self.call_with(&user_text);
            }
        }

        if !is_posting_request(&user_lower) {
            return None;
        }

        if is_prompting(&model_text.to_lowercase()) && !has_authoring_verb(&user_lower) {
            debug!("Implicit call suppressed: reply asks for more information");
            return None;
        }

        self.call_with(model_text)
    }

    fn call_with(&self, text: &str) -> Option<ToolCall> {
        let payload = clean_payload(text);
        if payload.is_empty() {
            return None;
        }

        let mut args = serde_json::Map::new();
        args.insert(self.canonical_key.clone(), serde_json::Value::String(payload));
        Some(ToolCall::new(&self.posting_tool, serde_json::Value::Object(args)))
    }
}

/// A posting verb, a platform reference, and no question or help marker.
pub fn is_posting_request(lower: &str) -> bool {
    let has_verb = POSTING_VERBS.iter().any(|v| lower.contains(v));
    let has_platform = PLATFORM_TERMS.iter().any(|p| lower.contains(p)) || has_word(lower, "x");
    let is_question =
        QUESTION_MARKERS.iter().any(|q| lower.contains(q)) || has_word(lower, "how");

    has_verb && has_platform && !is_question
}

/// Whether a model turn asked the user for post content.
fn asks_for_content(lower: &str) -> bool {
    (lower.contains("provide") && lower.contains("content"))
        || (lower.contains("what")
            && lower.contains("like")
            && (lower.contains("post") || lower.contains("tweet")))
}

/// Whether model text reads as a request for more information.
fn is_prompting(lower: &str) -> bool {
    (lower.contains("please provide") && lower.contains("content"))
        || PROMPTING_PHRASES.iter().any(|p| lower.contains(p))
}

fn has_authoring_verb(lower: &str) -> bool {
    AUTHORING_VERBS.iter().any(|v| lower.contains(v))
}

fn has_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|w| w == word)
}
