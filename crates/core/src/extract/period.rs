use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Captures;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::{AnswerValue, Period};

const ISO: &str = r"(\d{4})-(\d{2})-(\d{2})";

pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let range = format!(r"\b{ISO}\s*(?:\.\.|–|—|-|по|to|until)\s*{ISO}\b");
        let iso = format!(r"\b{ISO}\b");
        let specs: &[(&str, Mapper)] = &[
            (range.as_str(), range_period),
            (iso.as_str(), iso_date),
            (r"\b(\d{1,2})\.(\d{1,2})\.(\d{4})\b", dotted_date),
            (r"\b(?:сегодня|сегодняшн\w*|today)\b", today),
            (r"\b(?:вчера|вчерашн\w*|yesterday)\b", yesterday),
            (r"\b(\d{1,3})\s*(?:дней|дня|день|дн\.?|days?|d)\b", last_days),
            (r"\b(\d{1,2})\s*(?:недел\w*|weeks?)\b", last_weeks),
            (r"\b(?:эт(?:а|у|ой)|текущ\w*)\s+недел\w*|\bthis\s+week\b", this_week),
            (r"\b(?:прошл\w*|предыдущ\w*)\s+недел\w*|\b(?:last|previous)\s+week\b", last_week),
            (r"\b(?:недел\w*|week)\b", rolling_week),
            (r"\b(?:эт(?:от|ом)|текущ\w*)\s+месяц\w*|\bthis\s+month\b", this_month),
            (r"\b(?:прошл\w*|предыдущ\w*)\s+месяц\w*|\b(?:last|previous)\s+month\b", last_month),
            (r"\b(?:месяц\w*|month)\b", rolling_month),
        ];
        compile_rules(specs)
    })
}

fn period(value: Period) -> Option<AnswerValue> {
    Some(AnswerValue::Period(value))
}

fn today(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::Today)
}

fn yesterday(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::Yesterday)
}

fn this_week(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::ThisWeek)
}

fn last_week(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::LastWeek)
}

fn rolling_week(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::LastDays(7))
}

fn this_month(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::ThisMonth)
}

fn last_month(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::LastMonth)
}

fn rolling_month(_: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::LastDays(30))
}

fn number<T: std::str::FromStr>(captures: &Captures<'_>, index: usize) -> Option<T> {
    captures.get(index)?.as_str().parse().ok()
}

fn date_at(captures: &Captures<'_>, year: usize, month: usize, day: usize) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(number(captures, year)?, number(captures, month)?, number(captures, day)?)
}

fn range_period(captures: &Captures<'_>) -> Option<AnswerValue> {
    let since = date_at(captures, 1, 2, 3)?;
    let until = date_at(captures, 4, 5, 6)?;
    (since <= until).then_some(AnswerValue::Period(Period::Range { since, until }))
}

fn iso_date(captures: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::Date(date_at(captures, 1, 2, 3)?))
}

fn dotted_date(captures: &Captures<'_>) -> Option<AnswerValue> {
    period(Period::Date(date_at(captures, 3, 2, 1)?))
}

fn last_days(captures: &Captures<'_>) -> Option<AnswerValue> {
    let days: u16 = number(captures, 1)?;
    match days {
        0 => None,
        1 => period(Period::Yesterday),
        days => period(Period::LastDays(days)),
    }
}

fn last_weeks(captures: &Captures<'_>) -> Option<AnswerValue> {
    let weeks: u16 = number(captures, 1)?;
    (weeks > 0).then_some(AnswerValue::Period(Period::LastDays(weeks * 7)))
}
