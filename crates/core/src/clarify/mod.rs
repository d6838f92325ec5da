//! Clarifying gate: decides which policy questions are still open for a turn.

pub mod condition;

use serde::{Deserialize, Serialize};

use crate::domain::answer::{
    AnswerSet, AnswerSource, AnswerValue, ResolvedAnswer, SoftConfirmation,
};
use crate::domain::context::TurnContext;
use crate::domain::question::{AskMode, Question, QuestionType};
use crate::extract::extract_for_question;
use crate::ui::UiDescriptor;

pub use condition::{AskCondition, CompareOp, ConditionContext, ConditionParseError, ConditionValue};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateSettings {
    pub max_questions_per_turn: usize,
    pub history_window: usize,
    pub vague_max_words: usize,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self { max_questions_per_turn: 1, history_window: 5, vague_max_words: 3 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClarifyOutcome {
    pub needs_clarifying: bool,
    /// Every blocking question, in declaration order.
    pub pending_questions: Vec<Question>,
    /// The pending questions actually shown to the user this turn.
    pub surfaced_questions: Vec<Question>,
    pub answers: AnswerSet,
    pub resolved: Vec<ResolvedAnswer>,
    pub ui_descriptors: Vec<UiDescriptor>,
    pub soft_confirmations: Vec<SoftConfirmation>,
    pub prompt: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct ClarifyingGate {
    settings: GateSettings,
}

impl ClarifyingGate {
    pub fn new(settings: GateSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn evaluate(
        &self,
        message: &str,
        questions: &[Question],
        context: &TurnContext,
        existing: &AnswerSet,
    ) -> ClarifyOutcome {
        let mut answers = existing.clone();
        let mut resolved = Vec::new();
        let mut pending = Vec::new();
        let mut soft_confirmations = Vec::new();

        for question in questions {
            if answers.contains(&question.field) {
                continue;
            }

            if let Some(condition) = &question.ask_if {
                let condition_context = ConditionContext {
                    message,
                    metadata: &context.metadata,
                    answers: &answers,
                    vague_max_words: self.settings.vague_max_words,
                };
                if !condition.evaluate(&condition_context) {
                    if let Some(default) = &question.default {
                        accept(&mut answers, &mut resolved, question, default.clone(), AnswerSource::ConditionalDefault);
                    }
                    continue;
                }
            }

            match question.mode {
                AskMode::SoftConfirm => match extract_for_question(message, question) {
                    Some(value) => {
                        soft_confirmations.push(soft_confirmation(question, &value));
                        accept(&mut answers, &mut resolved, question, value, AnswerSource::Message);
                    }
                    None if question.optional => {}
                    None => pending.push(question.clone()),
                },
                AskMode::AlwaysAsk => {
                    if !question.optional {
                        pending.push(question.clone());
                    }
                }
                AskMode::Standard => match self.resolve_standard(message, question, context) {
                    Some((value, source)) => accept(&mut answers, &mut resolved, question, value, source),
                    None if question.optional => {}
                    None => pending.push(question.clone()),
                },
            }
        }

        let surfaced: Vec<Question> =
            pending.iter().take(self.settings.max_questions_per_turn.max(1)).cloned().collect();

        let mut ui_descriptors: Vec<UiDescriptor> = surfaced
            .iter()
            .filter(|question| question.renders_as_choice())
            .map(UiDescriptor::choice_for)
            .collect();
        ui_descriptors.extend(soft_confirmations.iter().map(|confirmation| UiDescriptor::SoftConfirm {
            field_id: confirmation.field.clone(),
            value: confirmation.value.code(),
            message: confirmation.message.clone(),
        }));

        let prompt = (!surfaced.is_empty()).then(|| {
            surfaced.iter().map(|question| question.prompt.as_str()).collect::<Vec<_>>().join("\n")
        });

        ClarifyOutcome {
            needs_clarifying: !pending.is_empty(),
            pending_questions: pending,
            surfaced_questions: surfaced,
            answers,
            resolved,
            ui_descriptors,
            soft_confirmations,
            prompt,
        }
    }

    fn resolve_standard(
        &self,
        message: &str,
        question: &Question,
        context: &TurnContext,
    ) -> Option<(AnswerValue, AnswerSource)> {
        if let Some(value) = extract_for_question(message, question) {
            return Some((value, AnswerSource::Message));
        }
        if let Some(value) = context
            .recent_user_messages(self.settings.history_window)
            .find_map(|previous| extract_for_question(previous, question))
        {
            return Some((value, AnswerSource::History));
        }
        question.default.clone().map(|value| (value, AnswerSource::Default))
    }
}

/// Interprets the user's reply to a question asked on the previous turn.
/// Free-form choice questions accept the reply text as-is.
pub fn answer_from_reply(question: &Question, reply: &str) -> Option<AnswerValue> {
    if let Some(value) = extract_for_question(reply, question) {
        return Some(value);
    }
    let trimmed = reply.trim();
    (question.question_type == QuestionType::Choice && question.options.is_empty() && !trimmed.is_empty())
        .then(|| AnswerValue::Choice(trimmed.to_owned()))
}

fn accept(
    answers: &mut AnswerSet,
    resolved: &mut Vec<ResolvedAnswer>,
    question: &Question,
    value: AnswerValue,
    source: AnswerSource,
) {
    answers.insert(question.field.clone(), value.clone());
    resolved.push(ResolvedAnswer { field: question.field.clone(), value, source });
}

fn soft_confirmation(question: &Question, value: &AnswerValue) -> SoftConfirmation {
    SoftConfirmation {
        field: question.field.clone(),
        value: value.clone(),
        message: format!("Понял как {}. Если нужно иначе, напишите новое значение.", value.label()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{answer_from_reply, ClarifyingGate, GateSettings};
    use crate::clarify::condition::AskCondition;
    use crate::domain::answer::{
        Amount, AnswerSet, AnswerSource, AnswerValue, Currency, EntityKind, EntityRef, Period,
    };
    use crate::domain::context::{RecentMessage, TurnContext};
    use crate::domain::question::{AskMode, Question, QuestionType};
    use crate::ui::UiDescriptor;

    fn period_question() -> Question {
        Question::new("period", QuestionType::Period, "За какой период?")
            .with_default(AnswerValue::Period(Period::LastDays(7)))
    }

    fn entity_question() -> Question {
        Question::new("entity", QuestionType::Entity, "Какую кампанию?")
    }

    #[test]
    fn pause_with_short_ref_needs_no_clarification() {
        let gate = ClarifyingGate::default();
        let outcome = gate.evaluate(
            "поставь на паузу кампанию c1",
            &[entity_question()],
            &TurnContext::default(),
            &AnswerSet::new(),
        );

        assert!(!outcome.needs_clarifying);
        assert!(outcome.pending_questions.is_empty());
        assert_eq!(
            outcome.answers.get("entity"),
            Some(&AnswerValue::Entity(EntityRef::new(EntityKind::Campaign, "c1")))
        );
        assert_eq!(outcome.resolved[0].source, AnswerSource::Message);
    }

    #[test]
    fn missing_period_falls_back_to_default() {
        let outcome = ClarifyingGate::default().evaluate(
            "покажи расходы",
            &[period_question()],
            &TurnContext::default(),
            &AnswerSet::new(),
        );

        assert!(!outcome.needs_clarifying);
        assert_eq!(outcome.answers.get("period"), Some(&AnswerValue::Period(Period::LastDays(7))));
        assert_eq!(outcome.resolved[0].source, AnswerSource::Default);
        assert!(outcome.prompt.is_none());
    }

    #[test]
    fn existing_answers_are_never_reasked() {
        let existing = AnswerSet::new().with("entity", AnswerValue::Entity(EntityRef::new(EntityKind::Campaign, "c9")));
        let outcome = ClarifyingGate::default().evaluate(
            "поставь на паузу c1",
            &[entity_question()],
            &TurnContext::default(),
            &existing,
        );

        assert_eq!(outcome.answers, existing);
        assert!(outcome.resolved.is_empty());
    }

    #[test]
    fn false_condition_applies_default_and_never_pends() {
        let question = Question::new("direction", QuestionType::Choice, "Какое направление?")
            .ask_if("directions_count > 1".parse().expect("condition parses"))
            .with_mode(AskMode::AlwaysAsk);
        let with_default = question.clone().with_default(AnswerValue::Choice("all".to_owned()));
        let context = TurnContext::default().with_metadata("directions_count", json!(1));

        for message in ["", "направление d1", "что угодно"] {
            let outcome = ClarifyingGate::default().evaluate(
                message,
                std::slice::from_ref(&question),
                &context,
                &AnswerSet::new(),
            );
            assert!(outcome.pending_questions.is_empty(), "message: {message}");
        }

        let outcome = ClarifyingGate::default().evaluate(
            "",
            &[with_default],
            &context,
            &AnswerSet::new(),
        );
        assert_eq!(outcome.answers.get("direction"), Some(&AnswerValue::Choice("all".to_owned())));
        assert_eq!(outcome.resolved[0].source, AnswerSource::ConditionalDefault);
    }

    #[test]
    fn true_condition_asks_with_choice_ui() {
        let question = Question::new("direction", QuestionType::Choice, "Какое направление?")
            .ask_if("directions_count > 1".parse().expect("condition parses"))
            .with_options([("d1", "Имплантация"), ("d2", "Виниры")]);
        let context = TurnContext::default().with_metadata("directions_count", json!(2));

        let outcome =
            ClarifyingGate::default().evaluate("сколько лидов?", &[question], &context, &AnswerSet::new());

        assert!(outcome.needs_clarifying);
        assert_eq!(outcome.prompt.as_deref(), Some("Какое направление?"));
        assert!(matches!(
            &outcome.ui_descriptors[0],
            UiDescriptor::Choice { field_id, required: true, .. } if field_id == "direction"
        ));
    }

    #[test]
    fn soft_confirm_accepts_extracted_value_without_blocking() {
        let question = Question::new("amount", QuestionType::Amount, "Какой бюджет поставить?")
            .with_mode(AskMode::SoftConfirm);

        let outcome = ClarifyingGate::default().evaluate(
            "поставь бюджет c1 на 300$",
            std::slice::from_ref(&question),
            &TurnContext::default(),
            &AnswerSet::new(),
        );
        assert!(!outcome.needs_clarifying);
        assert_eq!(outcome.soft_confirmations.len(), 1);
        assert_eq!(
            outcome.answers.get("amount"),
            Some(&AnswerValue::Amount(Amount::Money { value: 300.into(), currency: Currency::Usd }))
        );
        assert!(outcome.ui_descriptors.iter().any(|ui| ui.kind() == "soft_confirm"));

        let blocked = ClarifyingGate::default().evaluate(
            "поменяй бюджет c1",
            &[question],
            &TurnContext::default(),
            &AnswerSet::new(),
        );
        assert!(blocked.needs_clarifying);
        assert!(blocked.soft_confirmations.is_empty());
    }

    #[test]
    fn always_ask_blocks_even_when_extractable() {
        let question = Question::new("confirm", QuestionType::Confirmation, "Точно отправить?")
            .with_mode(AskMode::AlwaysAsk);
        let outcome = ClarifyingGate::default().evaluate(
            "да, отправь",
            &[question],
            &TurnContext::default(),
            &AnswerSet::new(),
        );
        assert!(outcome.needs_clarifying);
        assert!(outcome.answers.is_empty());
    }

    #[test]
    fn history_is_searched_newest_first_within_window() {
        let context = TurnContext::default()
            .with_message(RecentMessage::user("расходы за вчера"))
            .with_message(RecentMessage::assistant("Вот расходы за 7 дней"))
            .with_message(RecentMessage::user("а по c2 за 14 дней?"));
        let question = Question::new("period", QuestionType::Period, "За какой период?");

        let outcome = ClarifyingGate::default().evaluate(
            "а лиды?",
            std::slice::from_ref(&question),
            &context,
            &AnswerSet::new(),
        );
        assert_eq!(outcome.answers.get("period"), Some(&AnswerValue::Period(Period::LastDays(14))));
        assert_eq!(outcome.resolved[0].source, AnswerSource::History);

        let narrow = ClarifyingGate::new(GateSettings { history_window: 0, ..GateSettings::default() });
        let outcome = narrow.evaluate("а лиды?", &[question], &context, &AnswerSet::new());
        assert!(outcome.needs_clarifying);
    }

    #[test]
    fn only_first_pending_question_is_surfaced() {
        let questions = [
            entity_question(),
            Question::new("amount", QuestionType::Amount, "Какой бюджет?"),
        ];
        let outcome = ClarifyingGate::default().evaluate(
            "измени бюджет",
            &questions,
            &TurnContext::default(),
            &AnswerSet::new(),
        );
        assert_eq!(outcome.pending_questions.len(), 2);
        assert_eq!(outcome.surfaced_questions.len(), 1);
        assert_eq!(outcome.surfaced_questions[0].field, "entity");

        let roomy = ClarifyingGate::new(GateSettings { max_questions_per_turn: 2, ..GateSettings::default() });
        let outcome = roomy.evaluate("измени бюджет", &questions, &TurnContext::default(), &AnswerSet::new());
        assert_eq!(outcome.surfaced_questions.len(), 2);
        assert_eq!(outcome.prompt.as_deref(), Some("Какую кампанию?\nКакой бюджет?"));
    }

    #[test]
    fn optional_questions_never_block() {
        let questions = [
            Question::new("metric", QuestionType::Metric, "Какая метрика?").optional(),
            Question::new("confirm", QuestionType::Confirmation, "Уверены?")
                .with_mode(AskMode::AlwaysAsk)
                .optional(),
        ];
        let outcome = ClarifyingGate::default().evaluate(
            "покажи креативы",
            &questions,
            &TurnContext::default(),
            &AnswerSet::new(),
        );
        assert!(!outcome.needs_clarifying);
        assert!(outcome.answers.is_empty());
    }

    #[test]
    fn evaluation_is_idempotent() {
        let questions = [period_question(), entity_question()];
        let context = TurnContext::default().with_message(RecentMessage::user("кампания c3"));
        let gate = ClarifyingGate::default();

        let first = gate.evaluate("покажи расходы", &questions, &context, &AnswerSet::new());
        let second = gate.evaluate("покажи расходы", &questions, &context, &AnswerSet::new());
        assert_eq!(first.pending_questions, second.pending_questions);
        assert_eq!(first.answers, second.answers);
    }

    #[test]
    fn replies_fill_questions_asked_last_turn() {
        let confirm = Question::new("confirm", QuestionType::Confirmation, "Точно?")
            .with_mode(AskMode::AlwaysAsk);
        assert_eq!(answer_from_reply(&confirm, "да"), Some(AnswerValue::Confirmation(true)));
        assert_eq!(answer_from_reply(&confirm, "не знаю"), None);

        let goal = Question::new("goal", QuestionType::Choice, "Что нужно?");
        assert_eq!(
            answer_from_reply(&goal, " проверить рекламу "),
            Some(AnswerValue::Choice("проверить рекламу".to_owned()))
        );
        assert!(AskCondition::PeriodNotInMessage.to_string().contains("period"));
    }
}
