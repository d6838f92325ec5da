use std::sync::OnceLock;

use regex::Captures;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::AnswerValue;

// Negatives are checked first so "не надо" never reads as a yes.
pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let specs: &[(&str, Mapper)] = &[
            (
                r"^(?:нет|неа|не\s+надо|не\s+нужно|не\s+стоит|отмен\w*|стоп|no|nope|cancel|don'?t)\b",
                declined,
            ),
            (
                r"^(?:да|ага|угу|ок|окей|хорошо|давай\w*|подтвержда\w*|подтверд\w*|конечно|верно|выполняй|yes|yep|yeah|ok|okay|sure|confirm\w*|go\s+ahead)\b",
                accepted,
            ),
        ];
        compile_rules(specs)
    })
}

fn accepted(_: &Captures<'_>) -> Option<AnswerValue> {
    Some(AnswerValue::Confirmation(true))
}

fn declined(_: &Captures<'_>) -> Option<AnswerValue> {
    Some(AnswerValue::Confirmation(false))
}
