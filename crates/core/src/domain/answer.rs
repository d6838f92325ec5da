use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::question::QuestionType;

const ISO_DATE: &str = "%Y-%m-%d";

/// Reporting window, serialized as its canonical code (`last_7d`, `2026-03-01`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Period {
    Today,
    Yesterday,
    LastDays(u16),
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
    Date(NaiveDate),
    Range { since: NaiveDate, until: NaiveDate },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unrecognized period code `{0}`")]
pub struct PeriodParseError(pub String);

impl Period {
    pub fn code(&self) -> String {
        match self {
            Self::Today => "today".to_string(),
            Self::Yesterday => "yesterday".to_string(),
            Self::LastDays(days) => format!("last_{days}d"),
            Self::ThisWeek => "this_week".to_string(),
            Self::LastWeek => "last_week".to_string(),
            Self::ThisMonth => "this_month".to_string(),
            Self::LastMonth => "last_month".to_string(),
            Self::Date(date) => date.format(ISO_DATE).to_string(),
            Self::Range { since, until } => {
                format!("{}..{}", since.format(ISO_DATE), until.format(ISO_DATE))
            }
        }
    }

    pub fn label(&self) -> String {
        match self {
            Self::Today => "сегодня".to_string(),
            Self::Yesterday => "вчера".to_string(),
            Self::LastDays(days) => format!("последние {days} дн."),
            Self::ThisWeek => "эта неделя".to_string(),
            Self::LastWeek => "прошлая неделя".to_string(),
            Self::ThisMonth => "этот месяц".to_string(),
            Self::LastMonth => "прошлый месяц".to_string(),
            Self::Date(date) => date.format("%d.%m.%Y").to_string(),
            Self::Range { since, until } => {
                format!("{} – {}", since.format("%d.%m.%Y"), until.format("%d.%m.%Y"))
            }
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<Period> for String {
    fn from(value: Period) -> Self {
        value.code()
    }
}

impl TryFrom<String> for Period {
    type Error = PeriodParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl FromStr for Period {
    type Err = PeriodParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let parsed = match trimmed {
            "today" => Some(Self::Today),
            "yesterday" => Some(Self::Yesterday),
            "this_week" => Some(Self::ThisWeek),
            "last_week" => Some(Self::LastWeek),
            "this_month" => Some(Self::ThisMonth),
            "last_month" => Some(Self::LastMonth),
            other => parse_days_code(other)
                .map(Self::LastDays)
                .or_else(|| parse_range_code(other))
                .or_else(|| NaiveDate::parse_from_str(other, ISO_DATE).ok().map(Self::Date)),
        };
        parsed.ok_or_else(|| PeriodParseError(trimmed.to_string()))
    }
}

fn parse_days_code(value: &str) -> Option<u16> {
    let days = value.strip_prefix("last_")?.strip_suffix('d')?.parse::<u16>().ok()?;
    (days > 0).then_some(days)
}

fn parse_range_code(value: &str) -> Option<Period> {
    let (since, until) = value.split_once("..")?;
    let since = NaiveDate::parse_from_str(since, ISO_DATE).ok()?;
    let until = NaiveDate::parse_from_str(until, ISO_DATE).ok()?;
    (since <= until).then_some(Period::Range { since, until })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Campaign,
    Direction,
    Adset,
    Ad,
    Creative,
    Lead,
}

impl EntityKind {
    /// Prefix used for short conversational references (`c1`, `d2`, ...).
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Campaign => "c",
            Self::Direction => "d",
            Self::Adset => "a",
            Self::Ad => "ad",
            Self::Creative => "cr",
            Self::Lead => "l",
        }
    }

    pub fn from_prefix(prefix: &str) -> Option<Self> {
        match prefix {
            // Cyrillic "с" is visually identical to Latin "c" and shows up in typed refs.
            "c" | "с" => Some(Self::Campaign),
            "d" => Some(Self::Direction),
            "a" => Some(Self::Adset),
            "ad" => Some(Self::Ad),
            "cr" => Some(Self::Creative),
            "l" => Some(Self::Lead),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Campaign => "кампания",
            Self::Direction => "направление",
            Self::Adset => "группа объявлений",
            Self::Ad => "объявление",
            Self::Creative => "креатив",
            Self::Lead => "лид",
        }
    }
}

/// Reference to a domain entity: a short ref (`c1`), a platform id or a quoted name.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: impl Into<String>) -> Self {
        Self { kind, id: id.into() }
    }

    pub fn is_short_ref(&self) -> bool {
        self.id
            .strip_prefix(self.kind.prefix())
            .map(|rest| !rest.is_empty() && rest.chars().all(|ch| ch.is_ascii_digit()))
            .unwrap_or(false)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Usd,
    Rub,
    Kzt,
    Eur,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Usd => "USD",
            Self::Rub => "RUB",
            Self::Kzt => "KZT",
            Self::Eur => "EUR",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Amount {
    Money { value: Decimal, currency: Currency },
    Percent { percent: Decimal, relative: bool },
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Money { value, currency } => write!(f, "{} {}", value.normalize(), currency.code()),
            Self::Percent { percent, .. } if percent.is_sign_negative() => {
                write!(f, "{}%", percent.normalize())
            }
            Self::Percent { percent, .. } => write!(f, "+{}%", percent.normalize()),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Spend,
    Leads,
    Cpl,
    Ctr,
    Cpm,
    Cpc,
    Impressions,
    Clicks,
    Roi,
}

impl Metric {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Spend => "spend",
            Self::Leads => "leads",
            Self::Cpl => "cpl",
            Self::Ctr => "ctr",
            Self::Cpm => "cpm",
            Self::Cpc => "cpc",
            Self::Impressions => "impressions",
            Self::Clicks => "clicks",
            Self::Roi => "roi",
        }
    }
}

/// A resolved answer for one clarifying question.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AnswerValue {
    Period(Period),
    Entity(EntityRef),
    Amount(Amount),
    Metric(Metric),
    Confirmation(bool),
    Choice(String),
    Stage(String),
}

impl AnswerValue {
    pub fn question_type(&self) -> QuestionType {
        match self {
            Self::Period(_) => QuestionType::Period,
            Self::Entity(_) => QuestionType::Entity,
            Self::Amount(_) => QuestionType::Amount,
            Self::Metric(_) => QuestionType::Metric,
            Self::Confirmation(_) => QuestionType::Confirmation,
            Self::Choice(_) => QuestionType::Choice,
            Self::Stage(_) => QuestionType::Stage,
        }
    }

    /// Machine-facing code, used by condition comparisons and choice defaults.
    pub fn code(&self) -> String {
        match self {
            Self::Period(period) => period.code(),
            Self::Entity(entity) => entity.id.clone(),
            Self::Amount(amount) => amount.to_string(),
            Self::Metric(metric) => metric.code().to_string(),
            Self::Confirmation(flag) => flag.to_string(),
            Self::Choice(value) | Self::Stage(value) => value.clone(),
        }
    }

    /// Human-facing rendering for prose and soft confirmations.
    pub fn label(&self) -> String {
        match self {
            Self::Period(period) => period.label(),
            Self::Entity(entity) => format!("{} {}", entity.kind.label(), entity.id),
            Self::Amount(amount) => amount.to_string(),
            Self::Metric(metric) => metric.code().to_uppercase(),
            Self::Confirmation(true) => "да".to_string(),
            Self::Confirmation(false) => "нет".to_string(),
            Self::Choice(value) | Self::Stage(value) => value.clone(),
        }
    }
}

/// Answers accumulated across the turns of one conversation. Keys are never removed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerSet(BTreeMap<String, AnswerValue>);

impl AnswerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&AnswerValue> {
        self.0.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: AnswerValue) {
        self.0.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<String>, value: AnswerValue) -> Self {
        self.insert(field, value);
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AnswerValue)> {
        self.0.iter().map(|(field, value)| (field.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    Reply,
    Message,
    History,
    Default,
    ConditionalDefault,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedAnswer {
    pub field: String,
    pub value: AnswerValue,
    pub source: AnswerSource,
}

/// An automatically extracted answer surfaced to the user as an adjustable assumption.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftConfirmation {
    pub field: String,
    pub value: AnswerValue,
    pub message: String,
}
