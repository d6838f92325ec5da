use serde::{Deserialize, Serialize};

use crate::clarify::condition::AskCondition;
use crate::domain::answer::{AnswerValue, EntityKind};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Period,
    Entity,
    Amount,
    Metric,
    Confirmation,
    Choice,
    Stage,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Period => "period",
            Self::Entity => "entity",
            Self::Amount => "amount",
            Self::Metric => "metric",
            Self::Confirmation => "confirmation",
            Self::Choice => "choice",
            Self::Stage => "stage",
        }
    }
}

/// How a question interacts with extraction.
///
/// `Standard` questions are filled from the message, history or default before
/// anyone is asked. `AlwaysAsk` questions block until the user answers them
/// explicitly. `SoftConfirm` questions accept an extracted value but surface it
/// as an adjustable assumption.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AskMode {
    #[default]
    Standard,
    AlwaysAsk,
    SoftConfirm,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub value: String,
    pub label: String,
}

impl ChoiceOption {
    pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
        Self { value: value.into(), label: label.into() }
    }
}

/// A required input slot declared by a policy or a playbook tier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub field: String,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub prompt: String,
    #[serde(default)]
    pub mode: AskMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ask_if: Option<AskCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<AnswerValue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<ChoiceOption>,
    #[serde(default)]
    pub optional: bool,
    /// Entity questions with a kind only accept references of that kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_kind: Option<EntityKind>,
}

impl Question {
    pub fn new(field: impl Into<String>, question_type: QuestionType, prompt: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            question_type,
            prompt: prompt.into(),
            mode: AskMode::Standard,
            ask_if: None,
            default: None,
            options: Vec::new(),
            optional: false,
            entity_kind: None,
        }
    }

    pub fn with_mode(mut self, mode: AskMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn ask_if(mut self, condition: AskCondition) -> Self {
        self.ask_if = Some(condition);
        self
    }

    pub fn with_default(mut self, value: AnswerValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_options<I, V, L>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<String>,
        L: Into<String>,
    {
        self.options =
            options.into_iter().map(|(value, label)| ChoiceOption::new(value, label)).collect();
        self
    }

    pub fn with_entity_kind(mut self, kind: EntityKind) -> Self {
        self.entity_kind = Some(kind);
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Choice questions and period questions with explicit options are shown as buttons.
    pub fn renders_as_choice(&self) -> bool {
        match self.question_type {
            QuestionType::Choice => true,
            QuestionType::Period => !self.options.is_empty(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AskMode, Question, QuestionType};
    use crate::clarify::condition::AskCondition;
    use crate::domain::answer::{AnswerValue, EntityKind, Period};

    #[test]
    fn builder_sets_modifiers() {
        let question = Question::new("period", QuestionType::Period, "За какой период?")
            .ask_if(AskCondition::PeriodNotInMessage)
            .with_default(AnswerValue::Period(Period::LastDays(7)));

        assert_eq!(question.mode, AskMode::Standard);
        assert_eq!(question.ask_if, Some(AskCondition::PeriodNotInMessage));
        assert!(!question.renders_as_choice());
    }

    #[test]
    fn period_with_options_renders_as_choice() {
        let question = Question::new("period", QuestionType::Period, "За какой период?")
            .with_options([("last_7d", "7 дней"), ("last_30d", "30 дней")]);
        assert!(question.renders_as_choice());
        assert!(Question::new("goal", QuestionType::Choice, "?").renders_as_choice());
        assert!(!Question::new("entity", QuestionType::Entity, "?").renders_as_choice());
    }

    #[test]
    fn question_serializes_type_and_condition() {
        let question = Question::new("direction", QuestionType::Choice, "Какое направление?")
            .ask_if("directions_count > 1".parse().expect("condition parses"))
            .with_mode(AskMode::AlwaysAsk);
        let json = serde_json::to_value(&question).expect("serialize question");
        assert_eq!(json["type"], "choice");
        assert_eq!(json["askIf"], "directions_count > 1");
        assert_eq!(json["mode"], "always_ask");
        assert!(json.get("entityKind").is_none());
    }

    #[test]
    fn entity_kind_round_trips_in_camel_case() {
        let question = Question::new("direction", QuestionType::Entity, "Какое направление?")
            .with_entity_kind(EntityKind::Direction);
        let json = serde_json::to_value(&question).expect("serialize question");
        assert_eq!(json["entityKind"], "direction");

        let parsed: Question = serde_json::from_value(json).expect("deserialize question");
        assert_eq!(parsed.entity_kind, Some(EntityKind::Direction));
    }
}
