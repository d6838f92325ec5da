//! `ask_if` conditions: a closed set of named checks plus single binary
//! comparisons over context fields (`directions_count > 1`).

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::answer::{AnswerSet, AnswerValue};
use crate::domain::question::QuestionType;
use crate::extract::{extract, is_vague_with};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum AskCondition {
    PeriodNotInMessage,
    EntityNotInMessage,
    AmountNotInMessage,
    MessageIsVague,
    Compare { field: String, op: CompareOp, value: ConditionValue },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl CompareOp {
    // Two-character operators first so `>=` is not read as `>`.
    const ALL: [(&'static str, CompareOp); 7] = [
        ("==", Self::Eq),
        ("!=", Self::Ne),
        (">=", Self::Ge),
        ("<=", Self::Le),
        (">", Self::Gt),
        ("<", Self::Lt),
        ("=", Self::Eq),
    ];

    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Lt => "<",
            Self::Le => "<=",
        }
    }

    fn holds(&self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ConditionValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ConditionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            Self::Number(number) => write!(f, "{number}"),
            Self::Bool(flag) => write!(f, "{flag}"),
            Self::Text(text) if is_identifier(text) => f.write_str(text),
            Self::Text(text) => write!(f, "'{text}'"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ConditionParseError {
    #[error("empty condition")]
    Empty,
    #[error("condition `{0}` is neither a named check nor a comparison")]
    Unrecognized(String),
    #[error("invalid field name `{0}` in condition")]
    InvalidField(String),
    #[error("missing right-hand side in condition `{0}`")]
    MissingValue(String),
}

impl FromStr for AskCondition {
    type Err = ConditionParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ConditionParseError::Empty);
        }
        match trimmed {
            "period_not_in_message" => return Ok(Self::PeriodNotInMessage),
            "entity_not_in_message" => return Ok(Self::EntityNotInMessage),
            "amount_not_in_message" => return Ok(Self::AmountNotInMessage),
            "message_is_vague" | "is_vague" => return Ok(Self::MessageIsVague),
            _ => {}
        }

        let (position, symbol, op) = CompareOp::ALL
            .iter()
            .filter_map(|(symbol, op)| trimmed.find(symbol).map(|position| (position, *symbol, *op)))
            .min_by_key(|(position, symbol, _)| (*position, std::cmp::Reverse(symbol.len())))
            .ok_or_else(|| ConditionParseError::Unrecognized(trimmed.to_owned()))?;

        let field = trimmed[..position].trim();
        if !is_identifier(field) {
            return Err(ConditionParseError::InvalidField(field.to_owned()));
        }
        let raw_value = trimmed[position + symbol.len()..].trim();
        if raw_value.is_empty() {
            return Err(ConditionParseError::MissingValue(trimmed.to_owned()));
        }

        Ok(Self::Compare { field: field.to_owned(), op, value: parse_value(raw_value) })
    }
}

impl fmt::Display for AskCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeriodNotInMessage => f.write_str("period_not_in_message"),
            Self::EntityNotInMessage => f.write_str("entity_not_in_message"),
            Self::AmountNotInMessage => f.write_str("amount_not_in_message"),
            Self::MessageIsVague => f.write_str("message_is_vague"),
            Self::Compare { field, op, value } => write!(f, "{field} {} {value}", op.symbol()),
        }
    }
}

impl From<AskCondition> for String {
    fn from(value: AskCondition) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for AskCondition {
    type Error = ConditionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '.')
}

fn parse_value(raw: &str) -> ConditionValue {
    let unquoted = raw
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')));
    if let Some(text) = unquoted {
        return ConditionValue::Text(text.to_owned());
    }
    match raw {
        "true" => ConditionValue::Bool(true),
        "false" => ConditionValue::Bool(false),
        other => other
            .parse::<f64>()
            .map(ConditionValue::Number)
            .unwrap_or_else(|_| ConditionValue::Text(other.to_owned())),
    }
}

/// Everything a condition may look at for one turn.
#[derive(Clone, Copy, Debug)]
pub struct ConditionContext<'a> {
    pub message: &'a str,
    pub metadata: &'a BTreeMap<String, Value>,
    pub answers: &'a AnswerSet,
    pub vague_max_words: usize,
}

impl AskCondition {
    /// Evaluates the condition. Comparisons over unknown fields are false.
    pub fn evaluate(&self, context: &ConditionContext<'_>) -> bool {
        match self {
            Self::PeriodNotInMessage => extract(context.message, QuestionType::Period).is_none(),
            Self::EntityNotInMessage => extract(context.message, QuestionType::Entity).is_none(),
            Self::AmountNotInMessage => extract(context.message, QuestionType::Amount).is_none(),
            Self::MessageIsVague => is_vague_with(context.message, context.vague_max_words),
            Self::Compare { field, op, value } => lookup(context, field)
                .and_then(|left| compare(&left, value))
                .map(|ordering| op.holds(ordering))
                .unwrap_or(false),
        }
    }
}

fn lookup(context: &ConditionContext<'_>, field: &str) -> Option<Value> {
    if let Some(value) = context.metadata.get(field) {
        return Some(value.clone());
    }
    context.answers.get(field).map(|answer| match answer {
        AnswerValue::Confirmation(flag) => Value::Bool(*flag),
        other => Value::String(other.code()),
    })
}

fn compare(left: &Value, right: &ConditionValue) -> Option<std::cmp::Ordering> {
    match right {
        ConditionValue::Number(expected) => as_number(left)?.partial_cmp(expected),
        ConditionValue::Bool(expected) => left.as_bool().map(|actual| actual.cmp(expected)),
        ConditionValue::Text(expected) => match left {
            Value::String(actual) => Some(actual.as_str().cmp(expected.as_str())),
            Value::Number(number) => Some(number.to_string().as_str().cmp(expected.as_str())),
            Value::Bool(flag) => Some(flag.to_string().as_str().cmp(expected.as_str())),
            _ => None,
        },
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::Array(items) => Some(items.len() as f64),
        Value::String(text) => text.trim().parse().ok(),
        Value::Bool(flag) => Some(if *flag { 1.0 } else { 0.0 }),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use serde_json::{json, Value};

    use super::{AskCondition, CompareOp, ConditionContext, ConditionParseError, ConditionValue};
    use crate::domain::answer::{AnswerSet, AnswerValue};

    fn context<'a>(
        message: &'a str,
        metadata: &'a BTreeMap<String, Value>,
        answers: &'a AnswerSet,
    ) -> ConditionContext<'a> {
        ConditionContext { message, metadata, answers, vague_max_words: 3 }
    }

    #[test]
    fn parses_named_conditions_and_comparisons() {
        assert_eq!("period_not_in_message".parse(), Ok(AskCondition::PeriodNotInMessage));
        assert_eq!(
            " directions_count > 1 ".parse(),
            Ok(AskCondition::Compare {
                field: "directions_count".to_owned(),
                op: CompareOp::Gt,
                value: ConditionValue::Number(1.0),
            })
        );
        assert_eq!(
            "stage != 'won'".parse::<AskCondition>().map(|condition| condition.to_string()),
            Ok("stage != won".to_owned())
        );
        assert_eq!(
            "budget_mode >= 2".parse::<AskCondition>().map(|condition| condition.to_string()),
            Ok("budget_mode >= 2".to_owned())
        );
    }

    #[test]
    fn rejects_malformed_conditions() {
        assert_eq!("".parse::<AskCondition>(), Err(ConditionParseError::Empty));
        assert!(matches!(
            "whenever it feels right".parse::<AskCondition>(),
            Err(ConditionParseError::Unrecognized(_))
        ));
        assert!(matches!(
            "1 + x > 2".parse::<AskCondition>(),
            Err(ConditionParseError::InvalidField(_))
        ));
        assert!(matches!(
            "directions_count >".parse::<AskCondition>(),
            Err(ConditionParseError::MissingValue(_))
        ));
    }

    #[test]
    fn comparisons_read_metadata_and_answers() {
        let metadata = BTreeMap::from([
            ("directions_count".to_owned(), json!(3)),
            ("directions".to_owned(), json!(["a", "b"])),
            ("plan".to_owned(), json!("pro")),
        ]);
        let answers = AnswerSet::new()
            .with("symptom", AnswerValue::Choice("no_leads".to_owned()))
            .with("confirm", AnswerValue::Confirmation(true));
        let ctx = context("", &metadata, &answers);

        let holds = |raw: &str| raw.parse::<AskCondition>().map(|condition| condition.evaluate(&ctx));
        assert_eq!(holds("directions_count > 1"), Ok(true));
        assert_eq!(holds("directions_count <= 2"), Ok(false));
        assert_eq!(holds("directions > 1"), Ok(true));
        assert_eq!(holds("plan == pro"), Ok(true));
        assert_eq!(holds("symptom == no_leads"), Ok(true));
        assert_eq!(holds("confirm == true"), Ok(true));
    }

    #[test]
    fn unknown_fields_evaluate_false_for_every_operator() {
        let metadata = BTreeMap::new();
        let answers = AnswerSet::new();
        let ctx = context("", &metadata, &answers);
        for raw in ["missing > 1", "missing != 1", "missing == x", "missing < 0"] {
            let condition: AskCondition = raw.parse().expect("condition parses");
            assert!(!condition.evaluate(&ctx), "{raw}");
        }
    }

    #[test]
    fn named_conditions_inspect_the_message() {
        let metadata = BTreeMap::new();
        let answers = AnswerSet::new();
        assert!(AskCondition::PeriodNotInMessage.evaluate(&context("покажи расходы", &metadata, &answers)));
        assert!(!AskCondition::PeriodNotInMessage
            .evaluate(&context("расходы за вчера", &metadata, &answers)));
        assert!(!AskCondition::EntityNotInMessage.evaluate(&context("пауза c1", &metadata, &answers)));
        assert!(AskCondition::MessageIsVague.evaluate(&context("помоги", &metadata, &answers)));
    }
}
