use std::sync::OnceLock;

use regex::Captures;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::{AnswerValue, EntityKind, EntityRef};

const KIND_WORDS: &str = r"(кампани\w*|campaigns?|направлени\w*|directions?|адсет\w*|adsets?|групп\w*|объявлени\w*|ads?|креатив\w*|creatives?|лид\w*|leads?)";

pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let by_id = format!(r"\b{KIND_WORDS}\W{{0,3}}(?:id\W{{0,2}})?(\d{{6,20}})\b");
        let by_name = format!(r#"\b{KIND_WORDS}\s*[«"“']([^»"”']{{1,80}})[»"”']"#);
        let specs: &[(&str, Mapper)] = &[
            (r"\b(cr|ad|c|d|a|l|с)(\d{1,4})\b", short_ref),
            (by_id.as_str(), kind_with_value),
            (by_name.as_str(), kind_with_value),
        ];
        compile_rules(specs)
    })
}

/// First reference of `kind` anywhere in `text`, skipping references of other kinds.
pub(crate) fn first_of_kind(text: &str, kind: EntityKind) -> Option<AnswerValue> {
    rules().iter().find_map(|rule| {
        rule.pattern.captures_iter(text).find_map(|captures| match (rule.map)(&captures) {
            Some(AnswerValue::Entity(entity)) if entity.kind == kind => Some(AnswerValue::Entity(entity)),
            _ => None,
        })
    })
}

fn short_ref(captures: &Captures<'_>) -> Option<AnswerValue> {
    let kind = EntityKind::from_prefix(&captures.get(1)?.as_str().to_lowercase())?;
    let number = captures.get(2)?.as_str();
    Some(AnswerValue::Entity(EntityRef::new(kind, format!("{}{number}", kind.prefix()))))
}

fn kind_with_value(captures: &Captures<'_>) -> Option<AnswerValue> {
    let kind = kind_from_word(&captures.get(1)?.as_str().to_lowercase())?;
    let value = captures.get(2)?.as_str().trim();
    if value.is_empty() {
        return None;
    }
    Some(AnswerValue::Entity(EntityRef::new(kind, value)))
}

fn kind_from_word(word: &str) -> Option<EntityKind> {
    if word.starts_with("кампани") || word.starts_with("campaign") {
        Some(EntityKind::Campaign)
    } else if word.starts_with("направлени") || word.starts_with("direction") {
        Some(EntityKind::Direction)
    } else if word.starts_with("адсет") || word.starts_with("adset") || word.starts_with("групп") {
        Some(EntityKind::Adset)
    } else if word.starts_with("объявлени") || word == "ad" || word == "ads" {
        Some(EntityKind::Ad)
    } else if word.starts_with("креатив") || word.starts_with("creative") {
        Some(EntityKind::Creative)
    } else if word.starts_with("лид") || word.starts_with("lead") {
        Some(EntityKind::Lead)
    } else {
        None
    }
}
