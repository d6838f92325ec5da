use adpilot_core::domain::context::Integration;
use adpilot_core::policy::PolicyResolver;
use adpilot_core::tiers::{Tier, ADS_DIAGNOSIS_PLAYBOOK};

use super::{tier_state, turn_context, CommandResult};

/// Effective policy for `intent` given the connected integrations and,
/// for playbook intents, the current tier.
pub fn run(intent: &str, integrations: &[Integration], tier: Option<Tier>) -> CommandResult {
    let resolver = PolicyResolver::default();
    let playbook_id = resolver.catalog().get(intent).playbook_id.as_deref().unwrap_or(ADS_DIAGNOSIS_PLAYBOOK);
    let state = tier.map(|tier| tier_state(playbook_id, tier));

    let policy = resolver.resolve(intent, &turn_context(integrations), state.as_ref());
    CommandResult::json("policy", &policy)
}
