//! The orchestration loop implementation.

use std::sync::Arc;
use std::time::Duration;
use postclaw_config::AppConfig;
use postclaw_core::event::{DomainEvent, EventBus};
use postclaw_core::outcome::ToolOutcome;
use postclaw_core::provider::{GenerationRequest, GenerationService, Part};
use postclaw_core::tool::{ToolCall, ToolRegistry, ToolSchema};
use postclaw_core::turn::{Conversation, Role, Turn, TurnIntent};
use postclaw_core::RATE_LIMIT_MARKER;
use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::backoff::{BackoffTracker, Decision, RateLimitState};
use crate::intent::IntentClassifier;
use crate::normalize::normalize_arguments;
use crate::sanitize::sanitize;

/// Reply used when the generation service fails.
pub const FALLBACK_REPLY: &str = "Sorry, I encountered an error. Please try again.";

/// Reply used when a round hits the iteration cap.
pub const ITERATION_CAP_REPLY: &str =
    "I've reached the maximum number of tool call iterations. Please provide further guidance.";

/// Argument key the posting tool reads its text from.
const CANONICAL_KEY: &str = "status";

/// The loop that drives generation and tool dispatch for one session.
pub struct AgentLoop {
    /// The generation backend
    provider: Arc<dyn GenerationService>,

    /// The model to use
    model: String,

    temperature: f32,

    max_tokens: Option<u32>,

    /// Tool registry
    tools: Arc<ToolRegistry>,

    /// Schemas fetched once at construction
    schemas: Vec<ToolSchema>,

    /// Name of the side-effecting tool guarded by the backoff tracker
    posting_tool: String,

    /// Character limit for posted text
    char_limit: usize,

    /// Maximum generation calls per round
    max_iterations: u32,

    classifier: IntentClassifier,

    backoff: BackoffTracker,

    /// Session history
    conversation: Conversation,

    /// Event bus for domain events
    event_bus: Arc<EventBus>,
}

impl AgentLoop {
    /// Create a new loop. Tool schemas are read from the registry here and
    /// never again.
    pub fn new(
        provider: Arc<dyn GenerationService>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        let schemas = tools.schemas();
        let posting_tool = String::from("createPost");
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
            tools,
            schemas,
            classifier: IntentClassifier::new(&posting_tool, CANONICAL_KEY),
            posting_tool,
            char_limit: 280,
            max_iterations: 10,
            backoff: BackoffTracker::default(),
            conversation: Conversation::new(),
            event_bus,
        }
    }

    /// Create a loop with every setting taken from configuration.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn GenerationService>,
        tools: Arc<ToolRegistry>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self::new(provider, &config.default_model, tools, event_bus)
            .with_temperature(config.default_temperature)
            .with_max_tokens(config.default_max_tokens)
            .with_max_iterations(config.agent.max_iterations)
            .with_posting_tool(&config.social.posting_tool)
            .with_char_limit(config.social.char_limit)
            .with_backoff(BackoffTracker::from_config(&config.backoff))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the max tokens per generation.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of generation calls per round.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Set which tool is the rate-limited posting tool.
    pub fn with_posting_tool(mut self, name: impl Into<String>) -> Self {
        self.posting_tool = name.into();
        self.classifier = IntentClassifier::new(&self.posting_tool, CANONICAL_KEY);
        self
    }

    pub fn with_char_limit(mut self, limit: usize) -> Self {
        self.char_limit = limit;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffTracker) -> Self {
        self.backoff = backoff;
        self
    }

    /// The session history so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Tool schemas offered to the model.
    pub fn schemas(&self) -> &[ToolSchema] {
        &self.schemas
    }

    /// Current rate-limit state of the posting tool.
    pub fn backoff_state(&self) -> RateLimitState {
        self.backoff.snapshot()
    }

    /// Process one line of user input and return the reply shown to the user.
    ///
    /// A round keeps calling the generation service while it yields tool
    /// calls (explicit or implicit), up to `max_iterations`. Nothing here is
    /// fatal: failures become turns in the history.
    pub async fn process(&mut self, input: &str) -> String {
        self.conversation.push(Turn::user_input(input));
        info!(
            conversation_id = %self.conversation.id,
            turns = self.conversation.len(),
            "Processing user input"
        );

        let mut iteration = 0;

        loop {
            iteration += 1;

            if iteration > self.max_iterations {
                warn!(
                    conversation_id = %self.conversation.id,
                    iterations = iteration - 1,
                    "Max tool iterations reached, ending round"
                );
                self.conversation.push(Turn::model_reply(ITERATION_CAP_REPLY));
                return ITERATION_CAP_REPLY.into();
            }

            debug!(iteration, "Agent loop iteration");

            let request = GenerationRequest {
                model: self.model.clone(),
                turns: self.conversation.turns().to_vec(),
                tools: self.schemas.clone(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };

            let response = match self.provider.generate(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(provider = %self.provider.name(), error = %e, "Generation failed");
                    self.event_bus.publish(DomainEvent::ErrorOccurred {
                        context: "generation".into(),
                        error_message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                    self.conversation.push(Turn::new(
                        Role::Model,
                        TurnIntent::GenerationError,
                        format!("{FALLBACK_REPLY} ({e})"),
                    ));
                    return FALLBACK_REPLY.into();
                }
            };

            self.event_bus.publish(DomainEvent::ResponseGenerated {
                conversation_id: self.conversation.id.to_string(),
                model: response.model.clone(),
                tokens_used: response.usage.as_ref().map(|u| u.total_tokens),
                timestamp: Utc::now(),
            });

            let call = match response.first_actionable() {
                Some(Part::FunctionCall(call)) => {
                    debug!(tool = %call.name, "Function call received");
                    call.clone()
                }
                Some(Part::Text(text)) => match self.classifier.classify(&self.conversation, text) {
                    Some(call) => {
                        info!(tool = %call.name, "No function call emitted, synthesizing one");
                        self.event_bus.publish(DomainEvent::ImplicitCallSynthesized {
                            tool_name: call.name.clone(),
                            payload_preview: preview(&call),
                            timestamp: Utc::now(),
                        });
                        call
                    }
                    None => {
                        let text = text.clone();
                        self.conversation.push(Turn::model_reply(&text));
                        return text;
                    }
                },
                None => {
                    debug!("Model returned no usable content");
                    return String::new();
                }
            };

            self.dispatch(call).await;
            // Loop back: the model sees the tool report and decides what to do next
        }
    }

    /// Run one tool call and append its report to the history.
    async fn dispatch(&mut self, call: ToolCall) {
        info!(tool = %call.name, "Dispatching tool call");
        self.conversation.push(Turn::calling_tool(&call.name));

        let is_posting = call.name == self.posting_tool;
        let mut args = normalize_arguments(&call, &self.posting_tool, CANONICAL_KEY);

        if is_posting {
            if let Decision::Deny { wait_secs } = self.backoff.check_and_wait().await {
                warn!(tool = %call.name, wait_secs, "Posting denied by rate-limit backoff");
                self.event_bus.publish(DomainEvent::RateLimitDenied {
                    tool_name: call.name.clone(),
                    wait_secs,
                    timestamp: Utc::now(),
                });
                self.conversation.push(Turn::new(
                    Role::User,
                    TurnIntent::RateLimited,
                    format!(
                        "Tool error: Twitter rate limit in effect. Please try again in {wait_secs} seconds. ({RATE_LIMIT_MARKER})"
                    ),
                ));
                return;
            }

            let cleaned = sanitize(args[CANONICAL_KEY].as_str().unwrap_or_default(), self.char_limit);
            args[CANONICAL_KEY] = serde_json::Value::String(cleaned);
        }

        debug!(tool = %call.name, args = %args, "Tool arguments");

        let start = std::time::Instant::now();
        let result = self.tools.call(&ToolCall::new(call.name.clone(), args)).await;
        let duration_ms = start.elapsed().as_millis() as u64;
        let outcome = ToolOutcome::from_result(result);

        self.event_bus.publish(DomainEvent::ToolExecuted {
            tool_name: call.name.clone(),
            success: outcome.is_success(),
            duration_ms,
            timestamp: Utc::now(),
        });

        if is_posting {
            match &outcome {
                ToolOutcome::Success(_) => self.backoff.record_success(),
                ToolOutcome::RateLimited { retry_after_secs, .. } => self.backoff.record_failure_at(
                    true,
                    retry_after_secs.map(Duration::from_secs),
                    tokio::time::Instant::now(),
                ),
                _ => self.backoff.record_failure(false),
            }
        }

        let turn = match &outcome {
            ToolOutcome::Success(text) => {
                Turn::new(Role::User, TurnIntent::ToolResult, format!("Tool result: {text}"))
            }
            ToolOutcome::RateLimited { message, .. } if is_posting => {
                warn!(tool = %call.name, "Posting endpoint rate-limited");
                Turn::new(
                    Role::User,
                    TurnIntent::RateLimited,
                    format!("Tool error: {message} ({RATE_LIMIT_MARKER})"),
                )
            }
            ToolOutcome::PermissionDenied(message) => {
                warn!(tool = %call.name, error = %message, "Tool permission denied");
                Turn::new(
                    Role::User,
                    TurnIntent::ToolError,
                    format!(
                        "Tool error: {message}. This is a configuration problem and retrying will not help."
                    ),
                )
            }
            other => {
                warn!(tool = %call.name, error = %other.message(), "Tool execution failed");
                Turn::new(
                    Role::User,
                    TurnIntent::ToolError,
                    format!("Tool error: {}", other.message()),
                )
            }
        };
        self.conversation.push(turn);
    }

    /// Drive `process` from a stream of user lines until the sender closes.
    ///
    /// Blank lines are skipped. Stops early if the reply receiver is gone.
    pub async fn run(&mut self, mut inputs: mpsc::Receiver<String>, replies: mpsc::Sender<String>) {
        while let Some(line) = inputs.recv().await {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let reply = self.process(line).await;
            if replies.send(reply).await.is_err() {
                debug!("Reply channel closed, stopping");
                break;
            }
        }
    }
}

/// A short prefix of a synthesized call's payload, for events.
fn preview(call: &ToolCall) -> String {
    let text = call.args[CANONICAL_KEY].as_str().unwrap_or_default();
    text.chars().take(60).collect()
}
