use thiserror::Error;

use crate::audit::{AuditCategory, AuditContext, AuditEvent, AuditOutcome, AuditSink};
use crate::tiers::playbook::{builtin_playbooks, Playbook};
use crate::tiers::states::{Tier, TierContext, TierState, TierTransition};
use crate::ui::{UiAction, UiDescriptor};

/// Drives playbook runs through `snapshot -> drilldown -> actions`.
pub struct TierEngine<'a> {
    playbooks: &'a [Playbook],
}

impl<'a> TierEngine<'a> {
    pub fn new(playbooks: &'a [Playbook]) -> Self {
        Self { playbooks }
    }

    pub fn playbook(&self, playbook_id: &str) -> Result<&'a Playbook, TierTransitionError> {
        self.playbooks
            .iter()
            .find(|playbook| playbook.id == playbook_id)
            .ok_or_else(|| TierTransitionError::UnknownPlaybook { playbook_id: playbook_id.to_owned() })
    }

    pub fn start(&self, playbook_id: &str) -> Result<TierState, TierTransitionError> {
        self.playbook(playbook_id).map(|playbook| TierState::start(playbook.id.clone()))
    }

    /// Moves to the next tier.
    pub fn advance(
        &self,
        state: &TierState,
        context: &TierContext,
    ) -> Result<TierTransition, TierTransitionError> {
        let target = state
            .current_tier
            .next()
            .ok_or(TierTransitionError::AlreadyFinal { tier: state.current_tier })?;
        self.transition(state, target, context)
    }

    pub fn transition(
        &self,
        state: &TierState,
        target: Tier,
        context: &TierContext,
    ) -> Result<TierTransition, TierTransitionError> {
        self.playbook(&state.playbook_id)?;
        let current = state.current_tier;

        if target == current || state.is_completed(target) {
            return Err(TierTransitionError::Repeated { tier: target });
        }
        if target < current {
            return Err(TierTransitionError::Backward { from: current, to: target });
        }
        if current.next() != Some(target) {
            return Err(TierTransitionError::Skipped { from: current, to: target });
        }
        if !context.unresolved_questions.is_empty() {
            return Err(TierTransitionError::UnresolvedQuestions {
                tier: current,
                fields: context.unresolved_questions.clone(),
            });
        }

        let mut completed_tiers = state.completed_tiers.clone();
        completed_tiers.push(current);
        Ok(TierTransition {
            from: current,
            to: target,
            state: TierState { playbook_id: state.playbook_id.clone(), current_tier: target, completed_tiers },
        })
    }

    pub fn apply_with_audit<S>(
        &self,
        state: &TierState,
        target: Tier,
        context: &TierContext,
        sink: &S,
        audit: &AuditContext,
    ) -> Result<TierTransition, TierTransitionError>
    where
        S: AuditSink + ?Sized,
    {
        let result = self.transition(state, target, context);
        match &result {
            Ok(transition) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "tier.transition_applied",
                        AuditCategory::Tier,
                        AuditOutcome::Success,
                    )
                    .with_metadata("playbook_id", state.playbook_id.clone())
                    .with_metadata("from", transition.from.as_str())
                    .with_metadata("to", transition.to.as_str()),
                );
            }
            Err(error) => {
                sink.emit(
                    AuditEvent::from_context(
                        audit,
                        "tier.transition_rejected",
                        AuditCategory::Tier,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("playbook_id", state.playbook_id.clone())
                    .with_metadata("target", target.as_str())
                    .with_metadata("error", error.to_string()),
                );
            }
        }
        result
    }

    /// Suggested follow-ups for the tier the run is currently in.
    pub fn next_step_menu(&self, state: &TierState) -> Vec<UiAction> {
        self.playbook(&state.playbook_id)
            .ok()
            .and_then(|playbook| playbook.tier(state.current_tier))
            .map(|spec| spec.menu.clone())
            .unwrap_or_default()
    }

    pub fn progress(&self, state: &TierState) -> UiDescriptor {
        let total_tiers =
            self.playbook(&state.playbook_id).map(|playbook| playbook.tiers.len()).unwrap_or(Tier::ALL.len());
        UiDescriptor::Progress {
            playbook_id: state.playbook_id.clone(),
            current_tier: state.current_tier,
            completed_tiers: state.completed_tiers.clone(),
            total_tiers,
        }
    }
}

impl Default for TierEngine<'static> {
    fn default() -> Self {
        Self::new(builtin_playbooks())
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TierTransitionError {
    #[error("unknown playbook `{playbook_id}`")]
    UnknownPlaybook { playbook_id: String },
    #[error("tier {tier} still has unresolved questions: {fields:?}")]
    UnresolvedQuestions { tier: Tier, fields: Vec<String> },
    #[error("cannot move backward from {from} to {to}")]
    Backward { from: Tier, to: Tier },
    #[error("tier {tier} was already entered in this run")]
    Repeated { tier: Tier },
    #[error("cannot skip from {from} to {to}")]
    Skipped { from: Tier, to: Tier },
    #[error("tier {tier} is the last tier of the playbook")]
    AlreadyFinal { tier: Tier },
}
