pub mod engine;
pub mod playbook;
pub mod states;

pub use engine::{TierEngine, TierTransitionError};
pub use playbook::{builtin_playbooks, find_playbook, Playbook, TierSpec, ADS_DIAGNOSIS_PLAYBOOK};
pub use states::{
    ApprovalDecision, ApprovalRecord, Tier, TierContext, TierState, TierTransition,
};
