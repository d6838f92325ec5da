use crate::domain::context::TurnContext;
use crate::domain::intent::IntentId;
use crate::policy::catalog::{PolicyCatalog, PolicyDefinition};
use crate::policy::{is_dangerous, Policy};
use crate::tiers::playbook::{builtin_playbooks, Playbook};
use crate::tiers::states::{Tier, TierState};

/// Turns a static catalog entry into the effective policy for one turn.
///
/// Resolution never fails. Unknown intents get the fallback entry, failed
/// preflights and unknown playbooks leave the policy without tools.
pub struct PolicyResolver<'a> {
    catalog: &'a PolicyCatalog,
    playbooks: &'a [Playbook],
}

impl<'a> PolicyResolver<'a> {
    pub fn new(catalog: &'a PolicyCatalog, playbooks: &'a [Playbook]) -> Self {
        Self { catalog, playbooks }
    }

    pub fn catalog(&self) -> &'a PolicyCatalog {
        self.catalog
    }

    /// `tier_state` only applies when it belongs to the intent's playbook;
    /// playbook intents without one resolve at the snapshot tier.
    pub fn resolve(&self, intent: &str, context: &TurnContext, tier_state: Option<&TierState>) -> Policy {
        let definition = self.catalog.get(intent);
        let mut policy = base_policy(definition);

        if let Some(preflight) = definition.preflight {
            if !preflight.check(&context.integrations) {
                policy.allowed_tools.clear();
                policy.clarifying_questions.clear();
                policy.max_tool_calls = 0;
                policy.preflight_failed = true;
                policy.preflight_error = Some(preflight.error_message().to_owned());
                return policy;
            }
        }

        for optional in &definition.optional_tools {
            if context.has(optional.integration) && !policy.allows(&optional.tool) {
                policy.allowed_tools.push(optional.tool.clone());
            }
        }

        if let Some(playbook_id) = &definition.playbook_id {
            self.narrow_to_tier(&mut policy, playbook_id, tier_state);
        }

        if policy.allowed_tools.is_empty() {
            policy.max_tool_calls = 0;
        }
        policy
    }

    fn narrow_to_tier(&self, policy: &mut Policy, playbook_id: &str, tier_state: Option<&TierState>) {
        let tier = tier_state
            .filter(|state| state.playbook_id == playbook_id)
            .map(|state| state.current_tier)
            .unwrap_or(Tier::Snapshot);
        policy.playbook_id = Some(playbook_id.to_owned());
        policy.tier = Some(tier);

        let Some(spec) = self
            .playbooks
            .iter()
            .find(|playbook| playbook.id == playbook_id)
            .and_then(|playbook| playbook.tier(tier))
        else {
            policy.allowed_tools.clear();
            return;
        };

        policy.allowed_tools.retain(|tool| spec.allowed_tools.contains(tool));
        if tier != Tier::Actions {
            policy.allowed_tools.retain(|tool| !is_dangerous(tool));
        }
        policy.dangerous_policy = spec.dangerous_policy;
        for question in &spec.questions {
            if !policy.clarifying_questions.iter().any(|existing| existing.field == question.field) {
                policy.clarifying_questions.push(question.clone());
            }
        }
    }
}

impl Default for PolicyResolver<'static> {
    fn default() -> Self {
        Self::new(PolicyCatalog::builtin(), builtin_playbooks())
    }
}

fn base_policy(definition: &PolicyDefinition) -> Policy {
    Policy {
        intent: IntentId::new(definition.intent.clone()),
        domain: definition.domain,
        allowed_tools: definition.allowed_tools.clone(),
        dangerous_policy: definition.dangerous_policy,
        max_tool_calls: definition.max_tool_calls,
        clarifying_questions: definition.questions.clone(),
        preflight: definition.preflight,
        use_context_only: definition.use_context_only,
        preflight_failed: false,
        preflight_error: None,
        playbook_id: None,
        tier: None,
    }
}

#[cfg(test)]
mod tests {
    use super::PolicyResolver;
    use crate::domain::context::{Integration, TurnContext};
    use crate::domain::intent::intents;
    use crate::policy::{is_dangerous, PolicyCatalog};
    use crate::tiers::playbook::ADS_DIAGNOSIS_PLAYBOOK;
    use crate::tiers::states::{Tier, TierState};

    fn facebook() -> TurnContext {
        TurnContext::default().with_integrations([Integration::Facebook])
    }

    #[test]
    fn failed_preflight_closes_every_catalog_intent() {
        let resolver = PolicyResolver::default();
        for definition in PolicyCatalog::builtin().definitions() {
            let Some(preflight) = definition.preflight else {
                continue;
            };
            let policy = resolver.resolve(&definition.intent, &TurnContext::default(), None);
            assert!(!preflight.check(&TurnContext::default().integrations));
            assert!(policy.allowed_tools.is_empty(), "{}", definition.intent);
            assert_eq!(policy.max_tool_calls, 0);
            assert!(policy.clarifying_questions.is_empty());
            assert!(policy.preflight_failed);
            assert!(policy.preflight_error.is_some());
        }
    }

    #[test]
    fn greeting_is_context_only_without_tools() {
        let policy = PolicyResolver::default().resolve(intents::GREETING_NEUTRAL, &TurnContext::default(), None);
        assert!(policy.allowed_tools.is_empty());
        assert_eq!(policy.max_tool_calls, 0);
        assert!(policy.clarifying_questions.is_empty());
        assert!(policy.use_context_only);
        assert!(!policy.preflight_failed);
    }

    #[test]
    fn optional_tools_follow_connected_integrations() {
        let resolver = PolicyResolver::default();
        let plain = resolver.resolve(intents::SPEND_REPORT, &facebook(), None);
        assert!(!plain.allows("get_tiktok_report"));

        let extended = resolver.resolve(
            intents::SPEND_REPORT,
            &TurnContext::default().with_integrations([Integration::Tiktok, Integration::RoiAnalytics]),
            None,
        );
        assert!(extended.allows("get_tiktok_report"));
        assert!(extended.allows("get_roi_report"));
        assert!(extended.allows("get_spend_report"));
    }

    #[test]
    fn crm_intents_require_crm() {
        let resolver = PolicyResolver::default();
        let blocked = resolver.resolve(intents::FUNNEL_REPORT, &facebook(), None);
        assert!(blocked.preflight_failed);
        assert!(blocked.preflight_error.as_deref().is_some_and(|message| message.contains("CRM")));

        let open = resolver.resolve(
            intents::FUNNEL_REPORT,
            &TurnContext::default().with_integrations([Integration::Crm]),
            None,
        );
        assert!(open.allows("get_funnel_stats"));
        assert!(open.clarifying_questions[0].renders_as_choice());
    }

    #[test]
    fn playbook_intents_start_at_snapshot_without_dangerous_tools() {
        let policy = PolicyResolver::default().resolve(intents::ADS_DIAGNOSIS, &facebook(), None);
        assert_eq!(policy.tier, Some(Tier::Snapshot));
        assert!(policy.allows("get_spend_report"));
        assert!(!policy.allows("get_adsets"));
        assert!(policy.allowed_tools.iter().all(|tool| !is_dangerous(tool)));
        assert!(policy.clarifying_questions.iter().any(|question| question.field == "symptom"));
    }

    #[test]
    fn actions_tier_exposes_dangerous_tools() {
        let state = TierState {
            playbook_id: ADS_DIAGNOSIS_PLAYBOOK.to_owned(),
            current_tier: Tier::Actions,
            completed_tiers: vec![Tier::Snapshot, Tier::Drilldown],
        };
        let policy = PolicyResolver::default().resolve(intents::ADS_DIAGNOSIS, &facebook(), Some(&state));
        assert!(policy.allows("pause_adset"));
        assert!(policy.allows("update_budget"));
        assert!(!policy.allows("get_spend_report"));
        assert!(policy.clarifying_questions.is_empty());
    }

    #[test]
    fn foreign_tier_state_is_ignored() {
        let state = TierState {
            playbook_id: "budget_review".to_owned(),
            current_tier: Tier::Actions,
            completed_tiers: vec![Tier::Snapshot, Tier::Drilldown],
        };
        let policy = PolicyResolver::default().resolve(intents::ADS_DIAGNOSIS, &facebook(), Some(&state));
        assert_eq!(policy.tier, Some(Tier::Snapshot));
        assert!(policy.allowed_tools.iter().all(|tool| !is_dangerous(tool)));
    }

    #[test]
    fn unknown_intent_resolves_to_fallback() {
        let policy = PolicyResolver::default().resolve("wire_money", &facebook(), None);
        assert!(policy.intent.is_unknown());
        assert!(policy.allowed_tools.is_empty());
        assert_eq!(policy.max_tool_calls, 0);
        assert_eq!(policy.clarifying_questions.len(), 1);
    }

    #[test]
    fn empty_tool_sets_have_zero_budget_everywhere() {
        let resolver = PolicyResolver::default();
        let contexts = [TurnContext::default(), facebook()];
        for definition in PolicyCatalog::builtin().definitions() {
            for context in &contexts {
                let policy = resolver.resolve(&definition.intent, context, None);
                if policy.allowed_tools.is_empty() {
                    assert_eq!(policy.max_tool_calls, 0, "{}", definition.intent);
                }
            }
        }
    }
}
