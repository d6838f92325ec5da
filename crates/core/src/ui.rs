use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::question::{ChoiceOption, Question};
use crate::tiers::Tier;

/// Structured component for the UI layer. Serialized with a `type` tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiDescriptor {
    Actions {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        actions: Vec<UiAction>,
    },
    #[serde(rename_all = "camelCase")]
    Choice {
        field_id: String,
        title: String,
        options: Vec<ChoiceOption>,
        #[serde(default)]
        default: Option<String>,
        required: bool,
    },
    #[serde(rename_all = "camelCase")]
    Approval {
        tool: String,
        arguments: Value,
        title: String,
        approve_label: String,
        reject_label: String,
    },
    #[serde(rename_all = "camelCase")]
    Progress {
        playbook_id: String,
        current_tier: Tier,
        completed_tiers: Vec<Tier>,
        total_tiers: usize,
    },
    Table {
        title: String,
        columns: Vec<String>,
        rows: Vec<Value>,
    },
    Cards {
        title: String,
        cards: Vec<Value>,
    },
    Alert {
        level: AlertLevel,
        message: String,
    },
    MetricsComparison {
        title: String,
        metrics: Vec<MetricDelta>,
    },
    #[serde(rename_all = "camelCase")]
    SoftConfirm {
        field_id: String,
        value: String,
        message: String,
    },
}

impl UiDescriptor {
    /// Button group for a clarifying question that has a fixed set of answers.
    pub fn choice_for(question: &Question) -> Self {
        Self::Choice {
            field_id: question.field.clone(),
            title: question.prompt.clone(),
            options: question.options.clone(),
            default: question.default.as_ref().map(|value| value.code()),
            required: !question.optional,
        }
    }

    pub fn alert(level: AlertLevel, message: impl Into<String>) -> Self {
        Self::Alert { level, message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Actions { .. } => "actions",
            Self::Choice { .. } => "choice",
            Self::Approval { .. } => "approval",
            Self::Progress { .. } => "progress",
            Self::Table { .. } => "table",
            Self::Cards { .. } => "cards",
            Self::Alert { .. } => "alert",
            Self::MetricsComparison { .. } => "metrics_comparison",
            Self::SoftConfirm { .. } => "soft_confirm",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiAction {
    pub label: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
}

impl UiAction {
    pub fn new(label: impl Into<String>, message: impl Into<String>) -> Self {
        Self { label: label.into(), message: message.into(), intent: None }
    }

    pub fn with_intent(mut self, intent: impl Into<String>) -> Self {
        self.intent = Some(intent.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDelta {
    pub metric: String,
    pub current: f64,
    pub previous: f64,
    pub change_percent: Option<f64>,
}

impl MetricDelta {
    pub fn new(metric: impl Into<String>, current: f64, previous: f64) -> Self {
        let change_percent =
            (previous != 0.0).then(|| ((current - previous) / previous * 100.0 * 10.0).round() / 10.0);
        Self { metric: metric.into(), current, previous, change_percent }
    }
}
