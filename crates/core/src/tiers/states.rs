use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Disclosure stage of a playbook run, strictly ordered.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Snapshot,
    Drilldown,
    Actions,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Self::Snapshot, Self::Drilldown, Self::Actions];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Snapshot => "snapshot",
            Self::Drilldown => "drilldown",
            Self::Actions => "actions",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Snapshot => "Общая картина",
            Self::Drilldown => "Детализация",
            Self::Actions => "Действия",
        }
    }

    pub fn next(&self) -> Option<Tier> {
        match self {
            Self::Snapshot => Some(Self::Drilldown),
            Self::Drilldown => Some(Self::Actions),
            Self::Actions => None,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "snapshot" => Ok(Self::Snapshot),
            "drilldown" => Ok(Self::Drilldown),
            "actions" => Ok(Self::Actions),
            other => Err(format!("unknown tier `{other}`")),
        }
    }
}

/// Progress of one playbook run. Owned by the caller between turns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierState {
    pub playbook_id: String,
    pub current_tier: Tier,
    pub completed_tiers: Vec<Tier>,
}

impl TierState {
    /// A fresh run at the first tier. Restarting a playbook always goes through here.
    pub fn start(playbook_id: impl Into<String>) -> Self {
        Self { playbook_id: playbook_id.into(), current_tier: Tier::Snapshot, completed_tiers: Vec::new() }
    }

    pub fn is_completed(&self, tier: Tier) -> bool {
        self.completed_tiers.contains(&tier)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TierContext {
    /// Fields of the current tier's questions that are still open.
    pub unresolved_questions: Vec<String>,
}

impl TierContext {
    pub fn resolved() -> Self {
        Self::default()
    }

    pub fn with_unresolved<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { unresolved_questions: fields.into_iter().map(Into::into).collect() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierTransition {
    pub from: Tier,
    pub to: Tier,
    pub state: TierState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Accepted,
    Rejected,
}

/// The user's decision on one proposed dangerous call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApprovalRecord {
    pub tool: String,
    pub arguments: Value,
    pub decision: ApprovalDecision,
}

impl ApprovalRecord {
    pub fn accepted(tool: impl Into<String>, arguments: Value) -> Self {
        Self { tool: tool.into(), arguments, decision: ApprovalDecision::Accepted }
    }

    pub fn rejected(tool: impl Into<String>, arguments: Value) -> Self {
        Self { tool: tool.into(), arguments, decision: ApprovalDecision::Rejected }
    }

    /// Approvals bind to the exact tool and arguments that were proposed.
    pub fn matches(&self, tool: &str, arguments: &Value) -> bool {
        self.tool == tool && &self.arguments == arguments
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ApprovalRecord, Tier, TierState};

    #[test]
    fn tiers_are_ordered_and_chain_forward() {
        assert!(Tier::Snapshot < Tier::Drilldown && Tier::Drilldown < Tier::Actions);
        assert_eq!(Tier::Snapshot.next(), Some(Tier::Drilldown));
        assert_eq!(Tier::Actions.next(), None);
        assert_eq!("Drilldown".parse::<Tier>(), Ok(Tier::Drilldown));
    }

    #[test]
    fn start_begins_at_snapshot_with_nothing_completed() {
        let state = TierState::start("ads_diagnosis");
        assert_eq!(state.current_tier, Tier::Snapshot);
        assert!(state.completed_tiers.is_empty());

        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(json["playbookId"], "ads_diagnosis");
        assert_eq!(json["currentTier"], "snapshot");
    }

    #[test]
    fn approvals_match_tool_and_arguments_exactly() {
        let approval = ApprovalRecord::accepted("pause_campaign", json!({"campaign_id": "c1"}));
        assert!(approval.matches("pause_campaign", &json!({"campaign_id": "c1"})));
        assert!(!approval.matches("pause_campaign", &json!({"campaign_id": "c2"})));
        assert!(!approval.matches("pause_adset", &json!({"campaign_id": "c1"})));
    }
}
