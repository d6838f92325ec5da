use std::sync::OnceLock;

use regex::Captures;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::{AnswerValue, Metric};

// Cost metrics come first: "цена лида" must not resolve to plain leads.
pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let specs: &[(&str, Mapper)] = &[
            (r"\b(?:cpl|цен\w*\s+(?:за\s+)?лид\w*|стоимост\w*\s+лид\w*|cost\s+per\s+lead)", cpl),
            (r"\b(?:cpc|цен\w*\s+(?:за\s+)?клик\w*|стоимост\w*\s+клик\w*|cost\s+per\s+click)", cpc),
            (r"\b(?:cpm|цен\w*\s+(?:за\s+)?(?:тысяч\w*|1000)\s+показ\w*)", cpm),
            (r"\b(?:ctr|кликабельн\w*|click[- ]through)", ctr),
            (r"\b(?:roi|romi|roas|окупаем\w*)", roi),
            (r"\b(?:лид\w*|leads?|заявк\w*)", leads),
            (r"\b(?:клик\w*|clicks?)", clicks),
            (r"\b(?:показ\w*|impressions?|охват\w*|reach)", impressions),
            (r"\b(?:расход\w*|трат\w*|потрач\w*|затрат\w*|spend\w*|spent)", spend),
        ];
        compile_rules(specs)
    })
}

fn metric(value: Metric) -> Option<AnswerValue> {
    Some(AnswerValue::Metric(value))
}

fn cpl(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Cpl)
}

fn cpc(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Cpc)
}

fn cpm(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Cpm)
}

fn ctr(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Ctr)
}

fn roi(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Roi)
}

fn leads(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Leads)
}

fn clicks(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Clicks)
}

fn impressions(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Impressions)
}

fn spend(_: &Captures<'_>) -> Option<AnswerValue> {
    metric(Metric::Spend)
}
