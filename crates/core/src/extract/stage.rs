use std::sync::OnceLock;

use regex::Captures;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::AnswerValue;

pub const STAGES: [&str; 5] = ["new", "qualified", "meeting", "won", "lost"];

pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let specs: &[(&str, Mapper)] = &[
            (r"\b(?:отказ\w*|потерян\w*|проигран\w*|lost)\b", lost),
            (r"\b(?:оплат\w*|продаж\w*|выигран\w*|купил\w*|won)\b", won),
            (r"\b(?:встреч\w*|созвон\w*|meeting)\b", meeting),
            (r"\b(?:квалифицир\w*|квал|целев\w*|qualified)\b", qualified),
            (r"\b(?:нов(?:ый|ая|ое|ые|ых|ую)|new)\b", new_stage),
        ];
        compile_rules(specs)
    })
}

fn stage(value: &str) -> Option<AnswerValue> {
    Some(AnswerValue::Stage(value.to_owned()))
}

fn lost(_: &Captures<'_>) -> Option<AnswerValue> {
    stage("lost")
}

fn won(_: &Captures<'_>) -> Option<AnswerValue> {
    stage("won")
}

fn meeting(_: &Captures<'_>) -> Option<AnswerValue> {
    stage("meeting")
}

fn qualified(_: &Captures<'_>) -> Option<AnswerValue> {
    stage("qualified")
}

fn new_stage(_: &Captures<'_>) -> Option<AnswerValue> {
    stage("new")
}
