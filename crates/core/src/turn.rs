//! Turn and Conversation domain types.
//!
//! A conversation is the append-only history the orchestration loop replays
//! to the generation service on every call: user input → model reply or tool
//! call → tool result → model reply.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user, and anything the loop reports back on the user's side
    /// (tool results, tool errors).
    User,
    /// The language model.
    Model,
}

/// Why a turn was appended.
///
/// The classifier and the retry guard read this tag instead of scanning turn
/// text for error words or marker tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnIntent {
    /// Text typed by the user.
    Input,
    /// Ordinary model text.
    Reply,
    /// Synthetic "calling tool X" announcement.
    ToolCall,
    /// A successful tool result.
    ToolResult,
    /// A failed tool call that was not rate-limited.
    ToolError,
    /// The posting endpoint is rate-limited (denied locally or answered 429).
    RateLimited,
    /// The generation service failed; the turn carries a fallback message.
    GenerationError,
}

/// A single text part of a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextPart {
    pub text: String,
}

/// One role-tagged entry in the conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    pub role: Role,

    /// Ordered content parts (this system only produces text parts)
    pub parts: Vec<TextPart>,

    pub intent: TurnIntent,

    pub timestamp: DateTime<Utc>,
}

impl Turn {
    /// Create a turn with a single text part.
    pub fn new(role: Role, intent: TurnIntent, text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            parts: vec![TextPart { text: text.into() }],
            intent,
            timestamp: Utc::now(),
        }
    }

    /// A line typed by the user.
    pub fn user_input(text: impl Into<String>) -> Self {
        Self::new(Role::User, TurnIntent::Input, text)
    }

    /// Ordinary model text.
    pub fn model_reply(text: impl Into<String>) -> Self {
        Self::new(Role::Model, TurnIntent::Reply, text)
    }

    /// The synthetic model turn announcing a tool call.
    pub fn calling_tool(tool_name: &str) -> Self {
        Self::new(Role::Model, TurnIntent::ToolCall, format!("calling tool {tool_name}"))
    }

    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        match self.parts.as_slice() {
            [single] => single.text.clone(),
            parts => parts
                .iter()
                .map(|p| p.text.as_str())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// An append-only, ordered conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: ConversationId,

    turns: Vec<Turn>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn. Turns are never edited or removed afterwards.
    pub fn push(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// All turns in insertion order.
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Position and value of the most recent user-role turn.
    fn last_user_index(&self) -> Option<usize> {
        self.turns.iter().rposition(|t| t.role == Role::User)
    }

    /// The most recent user-role turn (typed input or a reported tool result).
    pub fn last_user_turn(&self) -> Option<&Turn> {
        self.last_user_index().map(|i| &self.turns[i])
    }

    /// The model turn immediately before the most recent user turn, if the
    /// turn in that slot is a model turn.
    pub fn model_turn_before_last_user(&self) -> Option<&Turn> {
        let idx = self.last_user_index()?;
        let prev = self.turns.get(idx.checked_sub(1)?)?;
        (prev.role == Role::Model).then_some(prev)
    }

    /// Whether any user-side turn recorded a rate-limited posting attempt.
    pub fn has_rate_limit_flag(&self) -> bool {
        self.turns
            .iter()
            .any(|t| t.role == Role::User && t.intent == TurnIntent::RateLimited)
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}
