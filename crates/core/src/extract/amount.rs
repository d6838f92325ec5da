use std::str::FromStr;
use std::sync::OnceLock;

use regex::Captures;
use rust_decimal::Decimal;

use super::{compile_rules, ExtractionRule, Mapper};
use crate::domain::answer::{Amount, AnswerValue, Currency};

/// A number with an optional thousands multiplier; groups `(value)(multiplier)`.
const NUM: &str = r"\b(\d{1,9}(?:[.,]\d+)?)(?:\s?(k|к|тыс\w*))?\b";
const PERCENT_SIGN: &str = r"\s?(?:%|процент\w*|percent)";
/// Trailing period unit that marks a number as a duration rather than money.
const PERIOD_UNIT: &str = r"(\s?(?:дн\w*|день|сут\w*|недел\w*|месяц\w*|days?|weeks?|months?)\b)?";
const DECREASE_VERBS: &str =
    r"\b(?:уменьш\w*|сниз\w*|сократ\w*|урез\w*|убав\w*|decrease\w*|reduce\w*|cut|lower)\b";

pub(crate) fn rules() -> &'static [ExtractionRule] {
    static RULES: OnceLock<Vec<ExtractionRule>> = OnceLock::new();
    RULES.get_or_init(|| {
        let decrease = format!(r"{DECREASE_VERBS}.{{0,40}}?\b(\d{{1,3}}(?:[.,]\d+)?){PERCENT_SIGN}");
        let percent = format!(r"([+-])?\b(\d{{1,3}}(?:[.,]\d+)?){PERCENT_SIGN}");
        let usd_prefix = format!(r"\$\s?{NUM}");
        let usd_suffix = format!(r"{NUM}\s?(?:\$|usd|долл\w*|dollars?|бакс\w*)");
        let rub = format!(r"{NUM}\s?(?:₽|руб\w*|rub|р\.)");
        let kzt = format!(r"{NUM}\s?(?:₸|тенге|тг|kzt)");
        let eur_prefix = format!(r"€\s?{NUM}");
        let eur_suffix = format!(r"{NUM}\s?(?:€|eur|euro|евро)");
        let budget = format!(r"(?:бюджет\w*|budget).{{0,30}}?{NUM}{PERIOD_UNIT}");
        let up_to = format!(r"\b(?:до|to)\s+{NUM}\s*$");
        let specs: &[(&str, Mapper)] = &[
            (decrease.as_str(), decrease_percent),
            (percent.as_str(), signed_percent),
            (usd_prefix.as_str(), usd),
            (usd_suffix.as_str(), usd),
            (rub.as_str(), rub_amount),
            (kzt.as_str(), kzt_amount),
            (eur_prefix.as_str(), eur),
            (eur_suffix.as_str(), eur),
            (budget.as_str(), budget_usd),
            (up_to.as_str(), usd),
        ];
        compile_rules(specs)
    })
}

fn parse_number(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.replace(',', ".")).ok()
}

fn money(captures: &Captures<'_>, currency: Currency) -> Option<AnswerValue> {
    let mut value = parse_number(captures.get(1)?.as_str())?;
    if captures.get(2).is_some() {
        value *= Decimal::ONE_THOUSAND;
    }
    (value > Decimal::ZERO).then_some(AnswerValue::Amount(Amount::Money { value, currency }))
}

fn usd(captures: &Captures<'_>) -> Option<AnswerValue> {
    money(captures, Currency::Usd)
}

/// Budget numbers followed by a period unit ("за 7 дней") are durations.
fn budget_usd(captures: &Captures<'_>) -> Option<AnswerValue> {
    if captures.get(3).is_some() {
        return None;
    }
    money(captures, Currency::Usd)
}

fn rub_amount(captures: &Captures<'_>) -> Option<AnswerValue> {
    money(captures, Currency::Rub)
}

fn kzt_amount(captures: &Captures<'_>) -> Option<AnswerValue> {
    money(captures, Currency::Kzt)
}

fn eur(captures: &Captures<'_>) -> Option<AnswerValue> {
    money(captures, Currency::Eur)
}

fn percent(value: Decimal) -> Option<AnswerValue> {
    (!value.is_zero()).then_some(AnswerValue::Amount(Amount::Percent { percent: value, relative: true }))
}

fn decrease_percent(captures: &Captures<'_>) -> Option<AnswerValue> {
    percent(-parse_number(captures.get(1)?.as_str())?)
}

fn signed_percent(captures: &Captures<'_>) -> Option<AnswerValue> {
    let value = parse_number(captures.get(2)?.as_str())?;
    match captures.get(1).map(|sign| sign.as_str()) {
        Some("-") => percent(-value),
        _ => percent(value),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use crate::domain::answer::{Amount, AnswerValue, Currency};
    use crate::domain::question::QuestionType;
    use crate::extract::extract;

    fn amount_of(message: &str) -> Option<Amount> {
        match extract(message, QuestionType::Amount) {
            Some(AnswerValue::Amount(amount)) => Some(amount),
            _ => None,
        }
    }

    fn money(value: i64, currency: Currency) -> Option<Amount> {
        Some(Amount::Money { value: Decimal::from(value), currency })
    }

    fn relative(percent: i64) -> Option<Amount> {
        Some(Amount::Percent { percent: Decimal::from(percent), relative: true })
    }

    #[test]
    fn currencies_are_detected() {
        assert_eq!(amount_of("поставь $500 в день"), money(500, Currency::Usd));
        assert_eq!(amount_of("бюджет c1 200 долларов"), money(200, Currency::Usd));
        assert_eq!(amount_of("сделай 15000 руб"), money(15_000, Currency::Rub));
        assert_eq!(amount_of("50 тыс тенге"), money(50_000, Currency::Kzt));
        assert_eq!(amount_of("€40 please"), money(40, Currency::Eur));
    }

    #[test]
    fn multipliers_scale_values() {
        assert_eq!(amount_of("подними до 1.5k$"), Some(Amount::Money {
            value: Decimal::new(1500, 0),
            currency: Currency::Usd,
        }));
        assert_eq!(amount_of("2к usd"), money(2_000, Currency::Usd));
    }

    #[test]
    fn decrease_verbs_make_percent_negative() {
        assert_eq!(amount_of("уменьши бюджет на 20%"), relative(-20));
        assert_eq!(amount_of("cut budget by 15 percent"), relative(-15));
        assert_eq!(amount_of("увеличь бюджет c1 на 30%"), relative(30));
        assert_eq!(amount_of("-10%"), relative(-10));
    }

    #[test]
    fn bare_budget_numbers_default_to_usd() {
        assert_eq!(amount_of("поставь бюджет кампании c1 на 300"), money(300, Currency::Usd));
        assert_eq!(amount_of("увеличь c2 до 450"), money(450, Currency::Usd));
    }

    #[test]
    fn platform_ids_are_not_amounts() {
        assert_eq!(amount_of("бюджет кампании 120210000000001"), None);
        assert_eq!(amount_of("покажи расходы за неделю"), None);
    }

    #[test]
    fn period_numbers_after_budget_are_not_amounts() {
        assert_eq!(amount_of("бюджет c1 за 7 дней"), None);
        assert_eq!(amount_of("budget for 2 weeks"), None);
        assert_eq!(amount_of("бюджет 500 на 7 дней"), money(500, Currency::Usd));
        assert_eq!(amount_of("бюджет c1 за 30 дней 200 долларов"), money(200, Currency::Usd));
    }
}
