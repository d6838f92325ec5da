//! Ordered pattern rules that pull typed answers out of free text.
//!
//! Every extractor is a priority list of `(pattern, mapper)` pairs tried in
//! declaration order; the first rule whose mapper produces a value wins.
//! Extraction never fails: no match is a normal `None`.

pub mod amount;
pub mod confirmation;
pub mod entity;
pub mod metric;
pub mod period;
pub mod stage;
pub mod vagueness;

use regex::{Captures, Regex};

use crate::domain::answer::{AnswerValue, Period};
use crate::domain::question::{Question, QuestionType};

pub use vagueness::{is_vague, is_vague_with};

pub(crate) type Mapper = fn(&Captures<'_>) -> Option<AnswerValue>;

pub(crate) struct ExtractionRule {
    pub(crate) pattern: Regex,
    pub(crate) map: Mapper,
}

/// Compiles case-insensitive rules, dropping any pattern that fails to compile.
pub(crate) fn compile_rules(specs: &[(&str, Mapper)]) -> Vec<ExtractionRule> {
    specs
        .iter()
        .filter_map(|(pattern, map)| {
            Regex::new(&format!("(?i){pattern}"))
                .ok()
                .map(|pattern| ExtractionRule { pattern, map: *map })
        })
        .collect()
}

pub(crate) fn first_match(rules: &[ExtractionRule], text: &str) -> Option<AnswerValue> {
    rules.iter().find_map(|rule| rule.pattern.captures(text).and_then(|captures| (rule.map)(&captures)))
}

/// Trims and folds `ё` into `е` so patterns only spell the common form.
pub fn normalize(message: &str) -> String {
    message.trim().replace('ё', "е").replace('Ё', "Е")
}

/// Extracts a value of the given type from `message`. Choices need options and
/// go through [`extract_for_question`].
pub fn extract(message: &str, question_type: QuestionType) -> Option<AnswerValue> {
    let text = normalize(message);
    if text.is_empty() {
        return None;
    }
    match question_type {
        QuestionType::Period => first_match(period::rules(), &text),
        QuestionType::Entity => first_match(entity::rules(), &text),
        QuestionType::Amount => first_match(amount::rules(), &text),
        QuestionType::Metric => first_match(metric::rules(), &text),
        QuestionType::Confirmation => first_match(confirmation::rules(), &text),
        QuestionType::Stage => first_match(stage::rules(), &text),
        QuestionType::Choice => None,
    }
}

/// Extracts an answer for a concrete question, matching its declared options first.
pub fn extract_for_question(message: &str, question: &Question) -> Option<AnswerValue> {
    if let Some(value) = match_option(message, question) {
        return match question.question_type {
            QuestionType::Choice => Some(AnswerValue::Choice(value)),
            QuestionType::Stage => Some(AnswerValue::Stage(value)),
            QuestionType::Period => value.parse::<Period>().ok().map(AnswerValue::Period),
            _ => extract_typed(message, question),
        };
    }
    extract_typed(message, question)
}

fn extract_typed(message: &str, question: &Question) -> Option<AnswerValue> {
    match (question.question_type, question.entity_kind) {
        (QuestionType::Entity, Some(kind)) => entity::first_of_kind(&normalize(message), kind),
        (question_type, _) => extract(message, question_type),
    }
}

fn match_option(message: &str, question: &Question) -> Option<String> {
    if question.options.is_empty() {
        return None;
    }
    let text = normalize(message).to_lowercase();
    let tokens: Vec<&str> = text
        .split(|ch: char| !(ch.is_alphanumeric() || ch == '_' || ch == '.'))
        .filter(|token| !token.is_empty())
        .collect();

    question
        .options
        .iter()
        .find(|option| {
            let value = option.value.to_lowercase();
            let label = normalize(&option.label).to_lowercase();
            tokens.iter().any(|token| *token == value) || (!label.is_empty() && text.contains(&label))
        })
        .map(|option| option.value.clone())
}

#[cfg(test)]
mod tests {
    use super::{compile_rules, extract, extract_for_question, Mapper};
    use crate::domain::answer::{AnswerValue, EntityKind, EntityRef, Period};
    use crate::domain::question::{Question, QuestionType};

    fn always_choice(_: &regex::Captures<'_>) -> Option<AnswerValue> {
        Some(AnswerValue::Choice("x".to_owned()))
    }

    #[test]
    fn invalid_patterns_are_skipped() {
        let specs: [(&str, Mapper); 2] = [("(unclosed", always_choice), ("ok", always_choice)];
        assert_eq!(compile_rules(&specs).len(), 1);
    }

    #[test]
    fn choice_needs_options() {
        assert_eq!(extract("первый вариант", QuestionType::Choice), None);
        assert_eq!(extract("   ", QuestionType::Period), None);
    }

    #[test]
    fn options_match_by_value_or_label() {
        let question = Question::new("symptom", QuestionType::Choice, "Что беспокоит?")
            .with_options([("expensive_leads", "Дорогие лиды"), ("no_leads", "Нет лидов")]);

        assert_eq!(
            extract_for_question("у нас дорогие лиды", &question),
            Some(AnswerValue::Choice("expensive_leads".to_owned()))
        );
        assert_eq!(
            extract_for_question("no_leads", &question),
            Some(AnswerValue::Choice("no_leads".to_owned()))
        );
        assert_eq!(extract_for_question("что-то другое", &question), None);
    }

    #[test]
    fn period_options_parse_to_periods() {
        let question = Question::new("period", QuestionType::Period, "За какой период?")
            .with_options([("last_7d", "7 дней"), ("last_30d", "30 дней")]);
        assert_eq!(
            extract_for_question("давай 30 дней", &question),
            Some(AnswerValue::Period(Period::LastDays(30)))
        );
        assert_eq!(
            extract_for_question("вчера", &question),
            Some(AnswerValue::Period(Period::Yesterday))
        );
    }

    #[test]
    fn entity_slots_only_take_their_kind() {
        let question = Question::new("direction", QuestionType::Entity, "Какое направление?")
            .with_entity_kind(EntityKind::Direction);

        assert_eq!(extract_for_question("сколько лидов по кампании c1", &question), None);
        assert_eq!(
            extract_for_question("кампания c1, направление d2", &question),
            Some(AnswerValue::Entity(EntityRef::new(EntityKind::Direction, "d2")))
        );
        assert_eq!(
            extract_for_question("по направлению «Алматы»", &question),
            Some(AnswerValue::Entity(EntityRef::new(EntityKind::Direction, "Алматы")))
        );

        let any_kind = Question::new("entity", QuestionType::Entity, "Какую кампанию?");
        assert_eq!(
            extract_for_question("сколько лидов по кампании c1", &any_kind),
            Some(AnswerValue::Entity(EntityRef::new(EntityKind::Campaign, "c1")))
        );
    }
}
