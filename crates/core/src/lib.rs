//! # PostClaw Core
//!
//! Domain types, traits, and error definitions for the PostClaw agent.
//! This crate has **no transport dependencies**; it defines the domain model
//! that the provider, tool, and agent crates implement against.
//!
//! ## Design Philosophy
//!
//! The two external collaborators of the agent loop (the generation service
//! and the tool registry) are defined here. Implementations live in their
//! respective crates, so the orchestration loop can be tested against scripted
//! stand-ins without touching the network.

pub mod error;
pub mod event;
pub mod outcome;
pub mod provider;
pub mod tool;
pub mod turn;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use event::{DomainEvent, EventBus};
pub use outcome::ToolOutcome;
pub use provider::{GenerationRequest, GenerationResponse, GenerationService, Part};
pub use tool::{Tool, ToolCall, ToolRegistry, ToolResult, ToolSchema};
pub use turn::{Conversation, ConversationId, Role, Turn, TurnIntent};

/// Token appended to history text when the posting endpoint is rate-limited.
pub const RATE_LIMIT_MARKER: &str = "RATE_LIMITED";
