use std::sync::Arc;

use adpilot_core::audit::{
    AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink, InMemoryAuditSink,
};
use adpilot_core::clarify::{answer_from_reply, ClarifyOutcome, ClarifyingGate};
use adpilot_core::config::EngineConfig;
use adpilot_core::domain::answer::{AnswerSet, AnswerValue};
use adpilot_core::domain::context::TurnContext;
use adpilot_core::domain::intent::Intent;
use adpilot_core::domain::question::QuestionType;
use adpilot_core::errors::{ApplicationError, DomainError, GuardrailViolation};
use adpilot_core::policy::{Policy, PolicyResolver};
use adpilot_core::tiers::{
    ApprovalRecord, TierContext, TierEngine, TierState, TierTransition, TierTransitionError,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::assembler::{AssembledResponse, AssemblyContext, ResponseAssembler};
use crate::guardrails::{GuardrailPolicy, PlanVerdict, ToolCall};
use crate::intent::IntentClassifier;
use crate::tools::{OperationResult, ToolRegistry};

const ACTOR: &str = "adpilot-agent";
const GOAL_FIELD: &str = "goal";
const DECLINED_REPLY: &str = "Хорошо, ничего не делаю. Если передумаете, просто напишите.";

/// Everything the host knows about one incoming message. Answers, tier
/// state and approvals are persisted by the host between turns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnInput {
    pub message: String,
    /// Explicit intent, e.g. from a pressed next-step button.
    pub intent: Option<String>,
    pub context: TurnContext,
    pub existing_answers: AnswerSet,
    /// Field of the question asked on the previous turn.
    pub replying_to: Option<String>,
    pub tier_state: Option<TierState>,
    pub approvals: Vec<ApprovalRecord>,
    pub conversation_id: Option<String>,
    pub correlation_id: Option<String>,
}

impl TurnInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), ..Self::default() }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }

    pub fn with_context(mut self, context: TurnContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_answers(mut self, answers: AnswerSet) -> Self {
        self.existing_answers = answers;
        self
    }

    pub fn replying_to(mut self, field: impl Into<String>) -> Self {
        self.replying_to = Some(field.into());
        self
    }

    pub fn with_tier_state(mut self, state: TierState) -> Self {
        self.tier_state = Some(state);
        self
    }

    pub fn with_approval(mut self, approval: ApprovalRecord) -> Self {
        self.approvals.push(approval);
        self
    }

    pub fn with_conversation(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }
}

/// What the host should do with the turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TurnDecision {
    /// A required integration is missing; show the message, call nothing.
    PreflightFailed { message: String },
    /// Ask the user before any tool runs.
    Clarify { prompt: String, fields: Vec<String> },
    /// The user said no to a required confirmation; nothing runs.
    Declined { field: String, message: String },
    /// No tools for this intent; reply from the conversation alone.
    AnswerFromContext,
    /// Hand the allowed tools and resolved answers to the executor.
    Execute {
        #[serde(rename = "allowedTools")]
        allowed_tools: Vec<String>,
        #[serde(rename = "maxToolCalls")]
        max_tool_calls: u32,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnPlan {
    pub correlation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub intent: Intent,
    pub policy: Policy,
    pub clarification: ClarifyOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_state: Option<TierState>,
    pub decision: TurnDecision,
}

impl TurnPlan {
    /// Answers after defaults, extraction and reply capture.
    pub fn answers(&self) -> &AnswerSet {
        &self.clarification.answers
    }

    pub fn audit_context(&self) -> AuditContext {
        AuditContext::new(self.conversation_id.clone(), self.correlation_id.clone(), ACTOR)
    }

    /// Tier context for advancing the current playbook run.
    pub fn tier_context(&self) -> TierContext {
        TierContext::with_unresolved(
            self.clarification.pending_questions.iter().map(|question| question.field.clone()),
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutcome {
    pub plan: TurnPlan,
    pub response: AssembledResponse,
    pub results: Vec<OperationResult>,
}

/// Wires classification, policy resolution, the clarifying gate, the tier
/// machine, guardrails and the response assembler into one turn.
pub struct AgentRuntime {
    config: EngineConfig,
    classifier: IntentClassifier,
    resolver: PolicyResolver<'static>,
    gate: ClarifyingGate,
    tiers: TierEngine<'static>,
    guardrails: GuardrailPolicy,
    assembler: ResponseAssembler,
    tools: ToolRegistry,
    audit: Arc<dyn AuditSink>,
}

impl AgentRuntime {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            classifier: IntentClassifier::new(),
            resolver: PolicyResolver::default(),
            gate: ClarifyingGate::new(config.gate_settings()),
            tiers: TierEngine::default(),
            guardrails: GuardrailPolicy::from(&config),
            assembler: ResponseAssembler::new(&config),
            tools: ToolRegistry::default(),
            audit: Arc::new(InMemoryAuditSink::default()),
            config,
        }
    }

    pub fn with_tools(mut self, tools: ToolRegistry) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn resolver(&self) -> &PolicyResolver<'static> {
        &self.resolver
    }

    /// Decides the turn without running anything. Never fails: unknown
    /// intents fall back to the goal question, missing integrations end in
    /// `PreflightFailed`.
    pub fn plan_turn(&self, input: &TurnInput) -> TurnPlan {
        let correlation_id = input.correlation_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let audit = AuditContext::new(input.conversation_id.clone(), correlation_id.clone(), ACTOR);
        let conversation_id = input.conversation_id.as_deref().unwrap_or("unknown");

        let intent = self.classify(input);
        info!(
            event_name = "agent.intent.classified",
            correlation_id = %correlation_id,
            conversation_id,
            intent = intent.id.as_str(),
            confidence = intent.confidence,
            "turn intent classified"
        );
        self.audit.emit(
            AuditEvent::from_context(&audit, "intent.classified", AuditCategory::Intent, AuditOutcome::Success)
                .with_metadata("intent", intent.id.as_str())
                .with_metadata("confidence", format!("{:.2}", intent.confidence)),
        );

        let policy = self.resolver.resolve(intent.id.as_str(), &input.context, input.tier_state.as_ref());
        let tier_state = self.tier_state_for(&policy, input.tier_state.as_ref());
        info!(
            event_name = "agent.policy.resolved",
            correlation_id = %correlation_id,
            conversation_id,
            intent = intent.id.as_str(),
            allowed_tools = policy.allowed_tools.len(),
            max_tool_calls = policy.max_tool_calls,
            preflight_failed = policy.preflight_failed,
            tier = tier_state.as_ref().map(|state| state.current_tier.as_str()).unwrap_or("none"),
            "turn policy resolved"
        );
        self.audit.emit(
            AuditEvent::from_context(
                &audit,
                "policy.resolved",
                AuditCategory::Policy,
                if policy.preflight_failed { AuditOutcome::Rejected } else { AuditOutcome::Success },
            )
            .with_metadata("intent", intent.id.as_str())
            .with_metadata("allowed_tools", policy.allowed_tools.join(",")),
        );

        let answers = capture_reply(&policy, input);
        let clarification =
            self.gate.evaluate(&input.message, &policy.clarifying_questions, &input.context, &answers);

        let decision = decide(&policy, &clarification);
        if let TurnDecision::Clarify { fields, .. } = &decision {
            info!(
                event_name = "agent.clarification.pending",
                correlation_id = %correlation_id,
                conversation_id,
                intent = intent.id.as_str(),
                fields = %fields.join(","),
                "turn needs clarification"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    &audit,
                    "clarification.pending",
                    AuditCategory::Clarification,
                    AuditOutcome::Success,
                )
                .with_metadata("fields", fields.join(",")),
            );
        }
        if let TurnDecision::Declined { field, .. } = &decision {
            info!(
                event_name = "agent.clarification.declined",
                correlation_id = %correlation_id,
                conversation_id,
                intent = intent.id.as_str(),
                field = %field,
                "turn declined by user"
            );
            self.audit.emit(
                AuditEvent::from_context(
                    &audit,
                    "clarification.declined",
                    AuditCategory::Clarification,
                    AuditOutcome::Rejected,
                )
                .with_metadata("field", field.clone()),
            );
        }

        TurnPlan {
            correlation_id,
            conversation_id: input.conversation_id.clone(),
            intent,
            policy,
            clarification,
            tier_state,
            decision,
        }
    }

    /// Plans the turn, checks every proposed call against the policy before
    /// anything runs, executes the approved ones in order and assembles the
    /// reply.
    pub async fn execute_turn(
        &self,
        input: &TurnInput,
        calls: &[ToolCall],
        raw_reply: &str,
    ) -> Result<TurnOutcome, ApplicationError> {
        let plan = self.plan_turn(input);
        let audit = plan.audit_context();

        let mut context = AssemblyContext {
            tier_state: plan.tier_state.clone(),
            soft_confirmations: plan.clarification.soft_confirmations.clone(),
            clarification: plan.clarification.ui_descriptors.clone(),
            ..AssemblyContext::default()
        };
        let mut content = raw_reply.to_owned();
        let mut results = Vec::new();

        match &plan.decision {
            TurnDecision::Clarify { prompt, fields } => {
                if !calls.is_empty() {
                    return Err(self.reject(&plan, &audit, GuardrailViolation::ClarificationPending {
                        fields: fields.clone(),
                    }));
                }
                content = prompt.clone();
                context.awaiting_user = true;
            }
            TurnDecision::Declined { message, .. } => {
                if let Some(call) = calls.first() {
                    return Err(self.reject(&plan, &audit, GuardrailViolation::ApprovalRejected {
                        tool: call.tool.clone(),
                    }));
                }
                content = message.clone();
            }
            TurnDecision::PreflightFailed { message } => {
                if !calls.is_empty() {
                    return Err(self.reject(&plan, &audit, GuardrailViolation::PreflightFailed {
                        message: message.clone(),
                    }));
                }
            }
            TurnDecision::AnswerFromContext | TurnDecision::Execute { .. } => {
                match self.guardrails.validate_plan(&plan.policy, calls, &input.approvals) {
                    Err(violation) => return Err(self.reject(&plan, &audit, violation)),
                    Ok(PlanVerdict::NeedsApproval(pending)) => {
                        for call in &pending {
                            self.audit.emit(
                                AuditEvent::from_context(
                                    &audit,
                                    "guardrail.approval_requested",
                                    AuditCategory::Guardrail,
                                    AuditOutcome::Success,
                                )
                                .with_metadata("tool", call.tool.clone()),
                            );
                        }
                        if content.trim().is_empty() {
                            let tool = pending.first().map(|call| call.tool.clone()).unwrap_or_default();
                            content = GuardrailViolation::ApprovalRequired { tool }.user_message();
                        }
                        context.pending_approvals = pending;
                        context.awaiting_user = true;
                    }
                    Ok(PlanVerdict::Approved(approved)) => {
                        for call in &approved {
                            results.push(self.run_call(&plan, &audit, call).await);
                        }
                    }
                }
            }
        }

        let response = self.assembler.assemble(&content, &plan.policy, &results, context);
        Ok(TurnOutcome { plan, response, results })
    }

    /// Moves a playbook run one tier forward. Skips, repeats, backward moves
    /// and moves with open questions are rejected and audited.
    pub fn advance_tier(
        &self,
        state: &TierState,
        context: &TierContext,
        audit: &AuditContext,
    ) -> Result<TierTransition, ApplicationError> {
        let Some(target) = state.current_tier.next() else {
            let error = TierTransitionError::AlreadyFinal { tier: state.current_tier };
            warn!(
                event_name = "agent.tier.rejected",
                correlation_id = %audit.correlation_id,
                playbook_id = %state.playbook_id,
                error = %error,
                "tier transition rejected"
            );
            return Err(DomainError::from(error).into());
        };

        match self.tiers.apply_with_audit(state, target, context, self.audit.as_ref(), audit) {
            Ok(transition) => {
                info!(
                    event_name = "agent.tier.advanced",
                    correlation_id = %audit.correlation_id,
                    playbook_id = %state.playbook_id,
                    from = transition.from.as_str(),
                    to = transition.to.as_str(),
                    "tier transition applied"
                );
                Ok(transition)
            }
            Err(error) => {
                warn!(
                    event_name = "agent.tier.rejected",
                    correlation_id = %audit.correlation_id,
                    playbook_id = %state.playbook_id,
                    error = %error,
                    "tier transition rejected"
                );
                Err(DomainError::from(error).into())
            }
        }
    }

    fn classify(&self, input: &TurnInput) -> Intent {
        let intent = self.classifier.classify_with_hint(&input.message, input.intent.as_deref());
        if !intent.id.is_unknown() || input.replying_to.as_deref() != Some(GOAL_FIELD) {
            return intent;
        }
        // A reply to the fallback goal question names the intent directly.
        let goal = self
            .resolver
            .catalog()
            .fallback()
            .questions
            .iter()
            .find(|question| question.field == GOAL_FIELD)
            .and_then(|question| answer_from_reply(question, &input.message));
        match goal {
            Some(AnswerValue::Choice(choice)) if self.classifier.knows(&choice) => {
                self.classifier.classify_with_hint(&input.message, Some(&choice))
            }
            _ => intent,
        }
    }

    fn tier_state_for(&self, policy: &Policy, supplied: Option<&TierState>) -> Option<TierState> {
        if policy.preflight_failed {
            return None;
        }
        let playbook_id = policy.playbook_id.as_deref()?;
        match supplied.filter(|state| state.playbook_id == playbook_id) {
            Some(state) => Some(state.clone()),
            None => self.tiers.start(playbook_id).ok(),
        }
    }

    async fn run_call(&self, plan: &TurnPlan, audit: &AuditContext, call: &ToolCall) -> OperationResult {
        let result = self.tools.execute(call).await;
        let outcome = if result.success { AuditOutcome::Success } else { AuditOutcome::Failed };
        if result.success {
            info!(
                event_name = "agent.tool.executed",
                correlation_id = %plan.correlation_id,
                intent = plan.intent.id.as_str(),
                tool = %call.tool,
                "tool call executed"
            );
        } else {
            warn!(
                event_name = "agent.tool.failed",
                correlation_id = %plan.correlation_id,
                intent = plan.intent.id.as_str(),
                tool = %call.tool,
                error = result.error.as_deref().unwrap_or("unknown"),
                "tool call failed"
            );
        }
        self.audit.emit(
            AuditEvent::from_context(audit, "tool.executed", AuditCategory::Execution, outcome)
                .with_metadata("tool", call.tool.clone()),
        );
        result
    }

    fn reject(&self, plan: &TurnPlan, audit: &AuditContext, violation: GuardrailViolation) -> ApplicationError {
        warn!(
            event_name = "agent.guardrail.denied",
            correlation_id = %plan.correlation_id,
            intent = plan.intent.id.as_str(),
            reason = violation.reason_code(),
            "tool plan rejected before execution"
        );
        self.audit.emit(
            AuditEvent::from_context(audit, "guardrail.denied", AuditCategory::Guardrail, AuditOutcome::Rejected)
                .with_metadata("reason", violation.reason_code()),
        );
        DomainError::from(violation).into()
    }
}

impl Default for AgentRuntime {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

/// Answers plus the reply to last turn's question, when it parses.
fn capture_reply(policy: &Policy, input: &TurnInput) -> AnswerSet {
    let mut answers = input.existing_answers.clone();
    let Some(field) = input.replying_to.as_deref() else {
        return answers;
    };
    if answers.contains(field) {
        return answers;
    }
    let reply = policy
        .clarifying_questions
        .iter()
        .find(|question| question.field == field)
        .and_then(|question| answer_from_reply(question, &input.message));
    if let Some(value) = reply {
        answers.insert(field, value);
    }
    answers
}

fn decide(policy: &Policy, clarification: &ClarifyOutcome) -> TurnDecision {
    if policy.preflight_failed {
        return TurnDecision::PreflightFailed { message: policy.preflight_error.clone().unwrap_or_default() };
    }
    if let Some(field) = declined_confirmation(policy, &clarification.answers) {
        return TurnDecision::Declined { field, message: DECLINED_REPLY.to_owned() };
    }
    if clarification.needs_clarifying {
        return TurnDecision::Clarify {
            prompt: clarification.prompt.clone().unwrap_or_default(),
            fields: clarification.pending_questions.iter().map(|question| question.field.clone()).collect(),
        };
    }
    if !policy.has_tools() {
        return TurnDecision::AnswerFromContext;
    }
    TurnDecision::Execute { allowed_tools: policy.allowed_tools.clone(), max_tool_calls: policy.max_tool_calls }
}

/// A "no" to a confirmation question resolves the slot but must never run tools.
fn declined_confirmation(policy: &Policy, answers: &AnswerSet) -> Option<String> {
    policy
        .clarifying_questions
        .iter()
        .filter(|question| question.question_type == QuestionType::Confirmation)
        .find(|question| answers.get(&question.field) == Some(&AnswerValue::Confirmation(false)))
        .map(|question| question.field.clone())
}
