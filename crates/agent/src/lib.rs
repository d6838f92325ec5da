//! Agent Runtime - turn orchestration around the deterministic policy engine
//!
//! This crate wires the pieces of `adpilot-core` into one conversational turn:
//! - Classifies the user message into an intent (`intent`)
//! - Resolves the turn policy and runs the clarifying gate (`runtime`)
//! - Checks proposed tool calls before anything executes (`guardrails`)
//! - Runs approved calls through the executor boundary (`tools`)
//! - Builds the reply with entity references, UI descriptors and next steps (`assembler`)
//!
//! # Turn Loop
//!
//! 1. **Classify** - message (or explicit hint) to `Intent`
//! 2. **Resolve** - catalog entry narrowed by integrations and playbook tier
//! 3. **Gate** - extract answers, apply defaults, decide what to ask
//! 4. **Guard** - budget, allow-list, tier and approval checks on the call list
//! 5. **Assemble** - `AssembledResponse` for the UI layer
//!
//! # Safety Principle
//!
//! The language model only proposes calls and phrases replies. Which tools
//! exist for a turn, what must be asked first and whether a mutation may run
//! are decided here, deterministically, before the executor is reached.

pub mod assembler;
pub mod guardrails;
pub mod intent;
pub mod next_steps;
pub mod runtime;
pub mod tools;

pub use assembler::{AssembledResponse, AssemblyContext, ResponseAssembler};
pub use guardrails::{GuardrailDecision, GuardrailPolicy, PlanVerdict, ToolCall};
pub use intent::IntentClassifier;
pub use runtime::{AgentRuntime, TurnDecision, TurnInput, TurnOutcome, TurnPlan};
pub use tools::{OperationResult, Tool, ToolRegistry};
