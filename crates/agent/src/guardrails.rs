use adpilot_core::config::EngineConfig;
use adpilot_core::errors::GuardrailViolation;
use adpilot_core::policy::{is_dangerous, DangerousPolicy, Policy};
use adpilot_core::tiers::{ApprovalDecision, ApprovalRecord, Tier};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One operation the model proposes to run this turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, arguments: Value) -> Self {
        Self { tool: tool.into(), arguments }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum GuardrailDecision {
    Allow,
    RequiresApproval { violation: GuardrailViolation, user_message: String },
    Deny { violation: GuardrailViolation, user_message: String },
}

impl GuardrailDecision {
    fn requires_approval(violation: GuardrailViolation) -> Self {
        let user_message = violation.user_message();
        Self::RequiresApproval { violation, user_message }
    }

    fn deny(violation: GuardrailViolation) -> Self {
        let user_message = violation.user_message();
        Self::Deny { violation, user_message }
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::RequiresApproval { violation, .. } | Self::Deny { violation, .. } => {
                Some(violation.reason_code())
            }
        }
    }

    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Outcome of checking a whole call list against the turn policy.
#[derive(Clone, Debug, PartialEq)]
pub enum PlanVerdict {
    /// Every call may run now.
    Approved(Vec<ToolCall>),
    /// Nothing runs until the user accepts these dangerous calls.
    NeedsApproval(Vec<ToolCall>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    /// Global kill switch for mutating tools.
    pub allow_dangerous_tools: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { allow_dangerous_tools: true }
    }
}

impl From<&EngineConfig> for GuardrailPolicy {
    fn from(config: &EngineConfig) -> Self {
        Self { allow_dangerous_tools: config.allow_dangerous_tools }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, policy: &Policy, call: &ToolCall, approvals: &[ApprovalRecord]) -> GuardrailDecision {
        if policy.preflight_failed {
            return GuardrailDecision::deny(GuardrailViolation::PreflightFailed {
                message: policy.preflight_error.clone().unwrap_or_default(),
            });
        }
        if !policy.allows(&call.tool) {
            return GuardrailDecision::deny(GuardrailViolation::ToolNotAllowed { tool: call.tool.clone() });
        }
        if !is_dangerous(&call.tool) {
            return GuardrailDecision::Allow;
        }
        if !self.allow_dangerous_tools {
            return GuardrailDecision::deny(GuardrailViolation::DangerousToolsDisabled { tool: call.tool.clone() });
        }
        if let Some(tier) = policy.tier.filter(|tier| *tier != Tier::Actions) {
            return GuardrailDecision::deny(GuardrailViolation::OutsideActionsTier { tool: call.tool.clone(), tier });
        }

        let decision = approvals
            .iter()
            .rev()
            .find(|record| record.matches(&call.tool, &call.arguments))
            .map(|record| record.decision);
        match decision {
            Some(ApprovalDecision::Rejected) => {
                GuardrailDecision::deny(GuardrailViolation::ApprovalRejected { tool: call.tool.clone() })
            }
            Some(ApprovalDecision::Accepted) => GuardrailDecision::Allow,
            None if policy.dangerous_policy == DangerousPolicy::Allow => GuardrailDecision::Allow,
            None => GuardrailDecision::requires_approval(GuardrailViolation::ApprovalRequired {
                tool: call.tool.clone(),
            }),
        }
    }

    /// Checks the budget and every call before anything runs. A single
    /// denied call rejects the whole list.
    pub fn validate_plan(
        &self,
        policy: &Policy,
        calls: &[ToolCall],
        approvals: &[ApprovalRecord],
    ) -> Result<PlanVerdict, GuardrailViolation> {
        if calls.len() > policy.max_tool_calls as usize {
            return Err(GuardrailViolation::BudgetExceeded {
                requested: calls.len(),
                max: policy.max_tool_calls,
            });
        }

        let mut awaiting = Vec::new();
        for call in calls {
            match self.evaluate(policy, call, approvals) {
                GuardrailDecision::Allow => {}
                GuardrailDecision::RequiresApproval { .. } => awaiting.push(call.clone()),
                GuardrailDecision::Deny { violation, .. } => return Err(violation),
            }
        }

        if awaiting.is_empty() {
            Ok(PlanVerdict::Approved(calls.to_vec()))
        } else {
            Ok(PlanVerdict::NeedsApproval(awaiting))
        }
    }
}

#[cfg(test)]
mod tests {
    use adpilot_core::domain::context::{Integration, TurnContext};
    use adpilot_core::domain::intent::intents;
    use adpilot_core::errors::GuardrailViolation;
    use adpilot_core::policy::{DangerousPolicy, Policy, PolicyResolver};
    use adpilot_core::tiers::{ApprovalRecord, Tier, TierState, ADS_DIAGNOSIS_PLAYBOOK};
    use serde_json::json;

    use super::{GuardrailDecision, GuardrailPolicy, PlanVerdict, ToolCall};

    fn facebook() -> TurnContext {
        TurnContext::default().with_integrations([Integration::Facebook])
    }

    fn diagnosis_at(tier: Tier) -> Policy {
        let completed = Tier::ALL.iter().copied().filter(|candidate| *candidate < tier).collect();
        let state = TierState {
            playbook_id: ADS_DIAGNOSIS_PLAYBOOK.to_owned(),
            current_tier: tier,
            completed_tiers: completed,
        };
        PolicyResolver::default().resolve(intents::ADS_DIAGNOSIS, &facebook(), Some(&state))
    }

    fn pause_c1() -> ToolCall {
        ToolCall::new("pause_campaign", json!({ "campaign_id": "c1" }))
    }

    #[test]
    fn read_tools_inside_policy_are_allowed() {
        let policy = PolicyResolver::default().resolve(intents::SPEND_REPORT, &facebook(), None);
        let decision = GuardrailPolicy::default().evaluate(
            &policy,
            &ToolCall::new("get_spend_report", json!({ "period": "last_7d" })),
            &[],
        );
        assert_eq!(decision, GuardrailDecision::Allow);
    }

    #[test]
    fn tools_outside_policy_are_denied() {
        let policy = PolicyResolver::default().resolve(intents::SPEND_REPORT, &facebook(), None);
        let decision = GuardrailPolicy::default().evaluate(&policy, &pause_c1(), &[]);
        assert_eq!(decision.reason_code(), Some("tool_not_allowed"));
    }

    #[test]
    fn dangerous_tools_are_denied_before_actions_tier() {
        let mut policy = diagnosis_at(Tier::Drilldown);
        // Even a widened tool list cannot reach a mutation outside the actions tier.
        policy.allowed_tools.push("pause_adset".to_owned());
        let decision = GuardrailPolicy::default().evaluate(
            &policy,
            &ToolCall::new("pause_adset", json!({ "adset_id": "a1" })),
            &[],
        );
        assert_eq!(decision.reason_code(), Some("outside_actions_tier"));
        assert!(!decision.is_allowed());
    }

    #[test]
    fn actions_tier_requires_matching_approval() {
        let policy = diagnosis_at(Tier::Actions);
        let guardrails = GuardrailPolicy::default();
        let call = ToolCall::new("pause_adset", json!({ "adset_id": "a1" }));

        let pending = guardrails.evaluate(&policy, &call, &[]);
        assert_eq!(pending.reason_code(), Some("approval_required"));

        let other_arguments = [ApprovalRecord::accepted("pause_adset", json!({ "adset_id": "a2" }))];
        assert_eq!(guardrails.evaluate(&policy, &call, &other_arguments).reason_code(), Some("approval_required"));

        let accepted = [ApprovalRecord::accepted("pause_adset", json!({ "adset_id": "a1" }))];
        assert!(guardrails.evaluate(&policy, &call, &accepted).is_allowed());

        let rejected = [ApprovalRecord::rejected("pause_adset", json!({ "adset_id": "a1" }))];
        assert_eq!(guardrails.evaluate(&policy, &call, &rejected).reason_code(), Some("approval_rejected"));
    }

    #[test]
    fn allow_policy_skips_approval_but_not_kill_switch() {
        let mut policy = PolicyResolver::default().resolve(intents::PAUSE_ENTITY, &facebook(), None);
        policy.dangerous_policy = DangerousPolicy::Allow;

        assert!(GuardrailPolicy::default().evaluate(&policy, &pause_c1(), &[]).is_allowed());

        let disabled = GuardrailPolicy { allow_dangerous_tools: false };
        let accepted = [ApprovalRecord::accepted("pause_campaign", json!({ "campaign_id": "c1" }))];
        assert_eq!(
            disabled.evaluate(&policy, &pause_c1(), &accepted).reason_code(),
            Some("dangerous_tools_disabled")
        );
    }

    #[test]
    fn failed_preflight_denies_everything() {
        let policy = PolicyResolver::default().resolve(intents::SPEND_REPORT, &TurnContext::default(), None);
        let decision = GuardrailPolicy::default().evaluate(
            &policy,
            &ToolCall::new("get_spend_report", json!({})),
            &[],
        );
        match decision {
            GuardrailDecision::Deny { violation: GuardrailViolation::PreflightFailed { message }, .. } => {
                assert!(message.contains("Facebook"));
            }
            other => panic!("expected preflight denial, got {other:?}"),
        }
    }

    #[test]
    fn plan_over_budget_is_rejected_before_anything_runs() {
        let policy = PolicyResolver::default().resolve(intents::FUNNEL_REPORT, &TurnContext::default().with_integrations([Integration::Crm]), None);
        let calls = vec![
            ToolCall::new("get_funnel_stats", json!({})),
            ToolCall::new("get_funnel_stats", json!({ "period": "last_30d" })),
        ];
        assert_eq!(
            GuardrailPolicy::default().validate_plan(&policy, &calls, &[]),
            Err(GuardrailViolation::BudgetExceeded { requested: 2, max: 1 })
        );
    }

    #[test]
    fn plan_with_one_denied_call_is_rejected_whole() {
        let policy = PolicyResolver::default().resolve(intents::SPEND_REPORT, &facebook(), None);
        let calls = vec![ToolCall::new("get_spend_report", json!({})), pause_c1()];
        assert!(matches!(
            GuardrailPolicy::default().validate_plan(&policy, &calls, &[]),
            Err(GuardrailViolation::ToolNotAllowed { .. })
        ));
    }

    #[test]
    fn plan_with_unapproved_mutation_waits_for_approval() {
        let policy = PolicyResolver::default().resolve(intents::PAUSE_ENTITY, &facebook(), None);
        let calls = vec![ToolCall::new("get_campaigns", json!({})), pause_c1()];
        let verdict = GuardrailPolicy::default().validate_plan(&policy, &calls, &[]).expect("no denial");
        assert_eq!(verdict, PlanVerdict::NeedsApproval(vec![pause_c1()]));

        let approvals = [ApprovalRecord::accepted("pause_campaign", json!({ "campaign_id": "c1" }))];
        let verdict = GuardrailPolicy::default().validate_plan(&policy, &calls, &approvals).expect("no denial");
        assert_eq!(verdict, PlanVerdict::Approved(calls));
    }
}
