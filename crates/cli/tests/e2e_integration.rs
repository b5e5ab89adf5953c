//! End-to-end integration tests for the PostClaw agent.
//!
//! These tests exercise the full pipeline from user input to a published post:
//! generation, implicit-intent classification, argument normalization,
//! backoff gating, sanitizing, and the real posting tool over a mock endpoint.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use postclaw_agent::AgentLoop;
use postclaw_config::AppConfig;
use postclaw_core::error::ProviderError;
use postclaw_core::event::{DomainEvent, EventBus};
use postclaw_core::provider::{GenerationRequest, GenerationResponse, GenerationService};
use postclaw_core::tool::{ToolCall, ToolRegistry};
use postclaw_core::turn::TurnIntent;
use postclaw_tools::{AddTwoNumbersTool, CreatePostTool, PostError, PostReceipt, SocialClient};
use serde_json::json;

// ── Mock Provider ────────────────────────────────────────────────────────

/// A mock provider that returns scripted responses in sequence.
struct ScriptedProvider {
    responses: Mutex<VecDeque<Result<GenerationResponse, ProviderError>>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedProvider {
    fn new(responses: Vec<Result<GenerationResponse, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl GenerationService for ScriptedProvider {
    fn name(&self) -> &str {
        "e2e_mock"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, ProviderError> {
        self.requests.lock().unwrap().push(request);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(GenerationResponse::text("e2e-model", "Anything else?")))
    }
}

fn text(t: &str) -> Result<GenerationResponse, ProviderError> {
    Ok(GenerationResponse::text("e2e-model", t))
}

fn call(name: &str, args: serde_json::Value) -> Result<GenerationResponse, ProviderError> {
    Ok(GenerationResponse::call("e2e-model", ToolCall::new(name, args)))
}

// ── Mock Social Endpoint ─────────────────────────────────────────────────

/// Records every post and answers from a script, succeeding by default.
#[derive(Default)]
struct MockEndpoint {
    posts: Mutex<Vec<String>>,
    script: Mutex<VecDeque<Result<PostReceipt, PostError>>>,
}

impl MockEndpoint {
    fn scripted(script: Vec<Result<PostReceipt, PostError>>) -> Arc<Self> {
        Arc::new(Self {
            posts: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        })
    }

    fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl SocialClient for MockEndpoint {
    async fn post(&self, text: &str) -> Result<PostReceipt, PostError> {
        let mut posts = self.posts.lock().unwrap();
        posts.push(text.to_string());
        let id = posts.len().to_string();
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PostReceipt { id }))
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn build_agent(provider: Arc<ScriptedProvider>, endpoint: Arc<MockEndpoint>) -> (AgentLoop, Arc<EventBus>) {
    let config = AppConfig::default();
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(AddTwoNumbersTool));
    registry.register(Box::new(CreatePostTool::new(
        &config.social.posting_tool,
        endpoint,
        config.social.char_limit,
    )));

    let event_bus = Arc::new(EventBus::default());
    let agent = AgentLoop::from_config(&config, provider, Arc::new(registry), event_bus.clone());
    (agent, event_bus)
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_explicit_call_with_alternate_key_is_posted_clean() {
    let provider = ScriptedProvider::new(vec![
        call("createPost", json!({"content": "Sure, here's a tweet: **Ferris** says hi"})),
        text("Done! Your tweet is up."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, _) = build_agent(provider.clone(), endpoint.clone());

    let reply = agent.process("Post a hello from Ferris on Twitter").await;

    assert_eq!(reply, "Done! Your tweet is up.");
    assert_eq!(endpoint.posts(), vec!["Ferris says hi"]);
    assert_eq!(provider.calls(), 2);

    let report = &agent.conversation().turns()[2];
    assert_eq!(report.intent, TurnIntent::ToolResult);
    assert_eq!(report.text(), "Tool result: Tweeted: Ferris says hi");
}

#[tokio::test]
async fn e2e_implicit_post_from_plain_text() {
    let provider = ScriptedProvider::new(vec![
        text("Here's a post for X: Async Rust got a lot nicer this year."),
        text("Posted!"),
    ]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, bus) = build_agent(provider, endpoint.clone());
    let mut events = bus.subscribe();

    let reply = agent.process("Write a post about async Rust and share it on X").await;

    assert_eq!(reply, "Posted!");
    assert_eq!(endpoint.posts(), vec!["Async Rust got a lot nicer this year."]);

    let mut implicit = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event.as_ref(), DomainEvent::ImplicitCallSynthesized { .. }) {
            implicit += 1;
        }
    }
    assert_eq!(implicit, 1);
}

#[tokio::test]
async fn e2e_how_to_question_is_not_posted() {
    let provider = ScriptedProvider::new(vec![text("Open the app, tap the compose button, and post.")]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, _) = build_agent(provider, endpoint.clone());

    let reply = agent.process("How do I post on Twitter?").await;

    assert!(reply.starts_with("Open the app"));
    assert!(endpoint.posts().is_empty());
}

#[tokio::test]
async fn e2e_clarification_answer_is_posted() {
    let provider = ScriptedProvider::new(vec![
        text("What would you like the post to say?"),
        text("Great, posting that now."),
        text("It's live."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, _) = build_agent(provider, endpoint.clone());

    let first = agent.process("Post something on twitter").await;
    assert_eq!(first, "What would you like the post to say?");
    assert!(endpoint.posts().is_empty());

    let second = agent.process("\"We shipped postclaw 0.1\"").await;
    assert_eq!(second, "It's live.");
    assert_eq!(endpoint.posts(), vec!["We shipped postclaw 0.1"]);
}

#[tokio::test(start_paused = true)]
async fn e2e_rate_limit_backs_off_and_blocks_retries() {
    let provider = ScriptedProvider::new(vec![
        call("createPost", json!({"status": "first try"})),
        text("Twitter says slow down."),
        call("createPost", json!({"status": "second try"})),
        text("Still limited, I'll wait."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![Err(PostError::RateLimited {
        retry_after_secs: Some(5),
    })]);
    let (mut agent, bus) = build_agent(provider, endpoint.clone());
    let mut events = bus.subscribe();

    agent.process("Post 'first try' on twitter").await;
    let state = agent.backoff_state();
    assert!(state.is_limited);
    assert_eq!(state.retry_count, 1);

    let reply = agent.process("Post 'second try' on twitter").await;
    assert_eq!(reply, "Still limited, I'll wait.");

    // Only the first attempt reached the endpoint
    assert_eq!(endpoint.posts(), vec!["first try"]);

    let denied: Vec<u64> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e.as_ref() {
            DomainEvent::RateLimitDenied { wait_secs, .. } => Some(*wait_secs),
            _ => None,
        })
        .collect();
    assert_eq!(denied, vec![5]);

    let flagged = agent
        .conversation()
        .turns()
        .iter()
        .filter(|t| t.intent == TurnIntent::RateLimited)
        .count();
    assert_eq!(flagged, 2);
}

#[tokio::test(start_paused = true)]
async fn e2e_posting_resumes_after_window() {
    let provider = ScriptedProvider::new(vec![
        call("createPost", json!({"status": "first"})),
        text("Rate limited."),
        call("createPost", json!({"status": "second"})),
        text("Posted."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![Err(PostError::RateLimited { retry_after_secs: None })]);
    let (mut agent, _) = build_agent(provider, endpoint.clone());

    agent.process("Post first on twitter").await;
    tokio::time::advance(Duration::from_secs(2)).await;
    let reply = agent.process("Post second on twitter").await;

    assert_eq!(reply, "Posted.");
    assert_eq!(endpoint.posts(), vec!["first", "second"]);
    assert!(!agent.backoff_state().is_limited);
}

#[tokio::test]
async fn e2e_forbidden_is_reported_without_backoff() {
    let provider = ScriptedProvider::new(vec![
        call("createPost", json!({"status": "hello"})),
        text("Your app lacks write permission."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![Err(PostError::Forbidden("Forbidden".into()))]);
    let (mut agent, _) = build_agent(provider, endpoint);

    let reply = agent.process("Post hello on twitter").await;

    assert_eq!(reply, "Your app lacks write permission.");
    let state = agent.backoff_state();
    assert!(!state.is_limited);
    assert_eq!(state.retry_count, 0);
    let report = &agent.conversation().turns()[2];
    assert_eq!(report.intent, TurnIntent::ToolError);
    assert!(report.text().contains("403"));
}

#[tokio::test]
async fn e2e_add_numbers_then_answer() {
    let provider = ScriptedProvider::new(vec![
        call("addTwoNumbers", json!({"a": 19, "b": 23})),
        text("19 + 23 = 42"),
    ]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, _) = build_agent(provider.clone(), endpoint.clone());

    let reply = agent.process("What is 19 plus 23?").await;

    assert_eq!(reply, "19 + 23 = 42");
    assert!(endpoint.posts().is_empty());
    assert_eq!(
        agent.conversation().turns()[2].text(),
        "Tool result: The sum of 19 and 23 is 42"
    );

    // Tool schemas went out with every request, in registration order
    let requests = provider.requests.lock().unwrap();
    for request in requests.iter() {
        let names: Vec<_> = request.tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, vec!["addTwoNumbers", "createPost"]);
    }
}

#[tokio::test]
async fn e2e_generation_failure_is_not_fatal() {
    let provider = ScriptedProvider::new(vec![
        Err(ProviderError::RateLimited { retry_after_secs: 5 }),
        text("I'm back."),
    ]);
    let endpoint = MockEndpoint::scripted(vec![]);
    let (mut agent, _) = build_agent(provider, endpoint);

    let first = agent.process("hello").await;
    assert!(first.starts_with("Sorry"));

    let second = agent.process("hello?").await;
    assert_eq!(second, "I'm back.");
}
