//! The orchestration loop at the heart of PostClaw.
//!
//! Each round follows a **Generate → Dispatch → Report** cycle:
//!
//! 1. **Receive** a line of user input
//! 2. **Send** the full history plus tool schemas to the generation service
//! 3. **If a call** (emitted, or synthesized from text by the intent
//!    classifier): normalize its arguments, gate the posting tool on the
//!    backoff tracker, sanitize the payload, run it, report the outcome,
//!    and loop back to step 2
//! 4. **If text**: return it to the user
//!
//! The round ends on a text reply, a generation failure, or the iteration
//! cap.

pub mod backoff;
pub mod intent;
pub mod loop_runner;
pub mod normalize;
pub mod sanitize;

pub use backoff::{BackoffTracker, Decision, Gate, RateLimitState};
pub use intent::IntentClassifier;
pub use loop_runner::AgentLoop;
pub use normalize::{normalize, normalize_arguments};
pub use sanitize::{clean_payload, sanitize};
