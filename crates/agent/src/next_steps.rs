use adpilot_core::domain::intent::intents;
use adpilot_core::ui::UiAction;

use crate::tools::{number_field, OperationResult};

/// Hard ceiling on suggestions per reply.
pub const MAX_NEXT_STEPS: usize = 3;

/// What the predicates of the rule table can see.
pub struct ResultView<'a> {
    pub results: &'a [OperationResult],
    pub spend_breakdown_threshold: f64,
}

type Predicate = fn(&ResultView<'_>) -> bool;

pub struct NextStepRule {
    /// `None` applies to every intent.
    pub intent: Option<&'static str>,
    /// `None` marks the intent's default rule, used only when nothing else matched.
    pub when: Option<Predicate>,
    pub label: &'static str,
    pub message: &'static str,
    pub target: Option<&'static str>,
}

impl NextStepRule {
    fn applies_to(&self, intent: &str) -> bool {
        self.intent.map_or(true, |rule_intent| rule_intent == intent)
    }

    fn action(&self) -> UiAction {
        let action = UiAction::new(self.label, self.message);
        match self.target {
            Some(target) => action.with_intent(target),
            None => action,
        }
    }
}

const fn when(
    intent: Option<&'static str>,
    predicate: Predicate,
    label: &'static str,
    message: &'static str,
    target: Option<&'static str>,
) -> NextStepRule {
    NextStepRule { intent, when: Some(predicate), label, message, target }
}

const fn default_for(intent: &'static str, label: &'static str, message: &'static str, target: &'static str) -> NextStepRule {
    NextStepRule { intent: Some(intent), when: None, label, message, target: Some(target) }
}

pub const RULES: &[NextStepRule] = &[
    when(None, any_failed, "Попробовать ещё раз", "Повтори последний запрос", None),
    when(
        Some(intents::SPEND_REPORT),
        spend_above_threshold,
        "Разбивка по кампаниям",
        "Покажи расходы по кампаниям",
        Some(intents::CAMPAIGN_OVERVIEW),
    ),
    when(
        Some(intents::SPEND_REPORT),
        has_spend,
        "Сколько лидов",
        "Сколько лидов за этот период?",
        Some(intents::LEADS_REPORT),
    ),
    default_for(intents::SPEND_REPORT, "Прошлая неделя", "Покажи расходы за прошлую неделю", intents::SPEND_REPORT),
    when(
        Some(intents::LEADS_REPORT),
        no_leads,
        "Почему нет лидов",
        "Почему нет лидов?",
        Some(intents::ADS_DIAGNOSIS),
    ),
    when(
        Some(intents::LEADS_REPORT),
        has_leads,
        "Креативы с лидами",
        "Какие креативы приводят лиды?",
        Some(intents::CREATIVE_REPORT),
    ),
    default_for(intents::LEADS_REPORT, "Расходы за период", "Покажи расходы за этот период", intents::SPEND_REPORT),
    when(
        Some(intents::CAMPAIGN_OVERVIEW),
        campaign_without_leads,
        "Разобрать кампании без лидов",
        "Почему кампании тратят без лидов?",
        Some(intents::ADS_DIAGNOSIS),
    ),
    default_for(intents::CAMPAIGN_OVERVIEW, "Расходы по кампаниям", "Покажи расходы за неделю", intents::SPEND_REPORT),
    default_for(intents::CREATIVE_REPORT, "Диагностика рекламы", "Проверь, что не так с рекламой", intents::ADS_DIAGNOSIS),
    when(
        Some(intents::PAUSE_ENTITY),
        all_succeeded,
        "Статус кампаний",
        "Покажи статус кампаний",
        Some(intents::CAMPAIGN_OVERVIEW),
    ),
    when(
        Some(intents::RESUME_ENTITY),
        all_succeeded,
        "Статус кампаний",
        "Покажи статус кампаний",
        Some(intents::CAMPAIGN_OVERVIEW),
    ),
    when(
        Some(intents::BUDGET_CHANGE),
        all_succeeded,
        "Проверить расходы",
        "Покажи расходы за сегодня",
        Some(intents::SPEND_REPORT),
    ),
    when(
        Some(intents::LEAD_SEARCH),
        has_leads,
        "Перевести на этап",
        "Переведи лида на следующий этап",
        Some(intents::LEAD_STAGE_CHANGE),
    ),
    default_for(intents::FUNNEL_REPORT, "Найти лидов", "Найди лидов на этапе встречи", intents::LEAD_SEARCH),
    default_for(intents::GREETING_NEUTRAL, "Расходы за неделю", "Покажи расходы за неделю", intents::SPEND_REPORT),
    default_for(intents::HELP, "Проверить рекламу", "Проверь, что не так с рекламой", intents::ADS_DIAGNOSIS),
];

/// Suggested follow-ups for a reply, at most `limit` (and never more than three).
/// Falls back to the intent's default rule only when no predicate matched.
pub fn suggest(intent: &str, view: &ResultView<'_>, limit: usize) -> Vec<UiAction> {
    let limit = limit.min(MAX_NEXT_STEPS);
    let mut actions: Vec<UiAction> = Vec::new();
    for rule in RULES.iter().filter(|rule| rule.applies_to(intent)) {
        let Some(predicate) = rule.when else {
            continue;
        };
        if predicate(view) && !actions.iter().any(|action| action.label == rule.label) {
            actions.push(rule.action());
        }
    }

    if actions.is_empty() {
        actions.extend(
            RULES
                .iter()
                .find(|rule| rule.when.is_none() && rule.intent == Some(intent))
                .map(NextStepRule::action),
        );
    }
    actions.truncate(limit);
    actions
}

fn successful<'a>(view: &'a ResultView<'a>) -> impl Iterator<Item = &'a OperationResult> {
    view.results.iter().filter(|result| result.success)
}

/// Top-level `total_spend`/`spend`, else the sum of row spend.
fn total_spend(view: &ResultView<'_>) -> Option<f64> {
    let mut total = None;
    for result in successful(view) {
        let spend = result.number("total_spend").or_else(|| result.number("spend")).or_else(|| {
            result.rows().map(|rows| rows.iter().filter_map(|row| number_field(row, "spend")).sum())
        });
        if let Some(spend) = spend {
            total = Some(total.unwrap_or(0.0) + spend);
        }
    }
    total
}

fn leads_count(view: &ResultView<'_>) -> Option<f64> {
    let mut count = None;
    for result in successful(view)
        .filter(|result| matches!(result.tool.as_str(), "get_leads" | "get_crm_leads" | "search_leads"))
    {
        let leads = ["total", "count", "leads"]
            .iter()
            .find_map(|key| result.number(key))
            .or_else(|| result.rows().map(|rows| rows.len() as f64));
        if let Some(leads) = leads {
            count = Some(count.unwrap_or(0.0) + leads);
        }
    }
    count
}

fn any_failed(view: &ResultView<'_>) -> bool {
    view.results.iter().any(|result| !result.success)
}

fn all_succeeded(view: &ResultView<'_>) -> bool {
    !view.results.is_empty() && view.results.iter().all(|result| result.success)
}

fn has_spend(view: &ResultView<'_>) -> bool {
    total_spend(view).is_some_and(|spend| spend > 0.0)
}

fn spend_above_threshold(view: &ResultView<'_>) -> bool {
    total_spend(view).is_some_and(|spend| spend > view.spend_breakdown_threshold)
}

fn no_leads(view: &ResultView<'_>) -> bool {
    leads_count(view).is_some_and(|count| count == 0.0)
}

fn has_leads(view: &ResultView<'_>) -> bool {
    leads_count(view).is_some_and(|count| count > 0.0)
}

fn campaign_without_leads(view: &ResultView<'_>) -> bool {
    successful(view).filter(|result| result.tool == "get_campaigns").any(|result| {
        result.rows().unwrap_or_default().iter().any(|row| {
            number_field(row, "spend").is_some_and(|spend| spend > 0.0)
                && number_field(row, "leads").is_some_and(|leads| leads == 0.0)
        })
    })
}
