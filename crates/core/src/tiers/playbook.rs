use std::sync::OnceLock;

use serde::Serialize;

use crate::clarify::condition::{AskCondition, CompareOp, ConditionValue};
use crate::domain::answer::{AnswerValue, EntityKind, Period};
use crate::domain::intent::intents;
use crate::domain::question::{Question, QuestionType};
use crate::policy::DangerousPolicy;
use crate::tiers::states::Tier;
use crate::ui::UiAction;

pub const ADS_DIAGNOSIS_PLAYBOOK: &str = "ads_diagnosis";

/// What a single tier of a playbook may do and ask.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TierSpec {
    pub tier: Tier,
    pub title: String,
    pub allowed_tools: Vec<String>,
    pub questions: Vec<Question>,
    pub dangerous_policy: DangerousPolicy,
    pub menu: Vec<UiAction>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Playbook {
    pub id: String,
    pub intent: String,
    pub tiers: Vec<TierSpec>,
}

impl Playbook {
    pub fn tier(&self, tier: Tier) -> Option<&TierSpec> {
        self.tiers.iter().find(|spec| spec.tier == tier)
    }
}

pub fn builtin_playbooks() -> &'static [Playbook] {
    static PLAYBOOKS: OnceLock<Vec<Playbook>> = OnceLock::new();
    PLAYBOOKS.get_or_init(|| vec![ads_diagnosis()])
}

pub fn find_playbook(id: &str) -> Option<&'static Playbook> {
    builtin_playbooks().iter().find(|playbook| playbook.id == id)
}

/// Union of every tier's tools, in first-seen order.
pub fn all_tools(id: &str) -> Vec<String> {
    let mut tools: Vec<String> = Vec::new();
    for spec in find_playbook(id).map(|playbook| playbook.tiers.as_slice()).unwrap_or_default() {
        for tool in &spec.allowed_tools {
            if !tools.contains(tool) {
                tools.push(tool.clone());
            }
        }
    }
    tools
}

fn owned(tools: &[&str]) -> Vec<String> {
    tools.iter().map(|tool| (*tool).to_owned()).collect()
}

fn ads_diagnosis() -> Playbook {
    let snapshot = TierSpec {
        tier: Tier::Snapshot,
        title: "Смотрю общую картину по рекламе".to_owned(),
        allowed_tools: owned(&["get_spend_report", "get_leads", "get_directions"]),
        questions: vec![
            Question::new("period", QuestionType::Period, "За какой период разобрать рекламу?")
                .with_default(AnswerValue::Period(Period::LastDays(7))),
            Question::new("symptom", QuestionType::Choice, "Что именно беспокоит?")
                .ask_if(AskCondition::MessageIsVague)
                .with_options([
                    ("expensive_leads", "Дорогие лиды"),
                    ("no_leads", "Мало или нет лидов"),
                    ("overspend", "Быстро тратится бюджет"),
                    ("low_quality", "Некачественные заявки"),
                ]),
        ],
        dangerous_policy: DangerousPolicy::Block,
        menu: vec![
            UiAction::new("Детализация по кампаниям", "Покажи детализацию по кампаниям")
                .with_intent(intents::ADS_DIAGNOSIS),
            UiAction::new("Сравнить креативы", "Сравни креативы по CPL").with_intent(intents::CREATIVE_REPORT),
        ],
    };

    let drilldown = TierSpec {
        tier: Tier::Drilldown,
        title: "Разбираю кампании и группы".to_owned(),
        allowed_tools: owned(&[
            "get_campaigns",
            "get_campaign_details",
            "get_adsets",
            "get_creative_metrics",
        ]),
        questions: vec![Question::new(
            "direction",
            QuestionType::Entity,
            "По какому направлению копать глубже?",
        )
        .with_entity_kind(EntityKind::Direction)
        .ask_if(AskCondition::Compare {
            field: "directions_count".to_owned(),
            op: CompareOp::Gt,
            value: ConditionValue::Number(1.0),
        })],
        dangerous_policy: DangerousPolicy::Block,
        menu: vec![
            UiAction::new("Предложить действия", "Что можно сделать, чтобы исправить?")
                .with_intent(intents::ADS_DIAGNOSIS),
            UiAction::new("Показать лиды", "Покажи лиды за этот период").with_intent(intents::LEADS_REPORT),
        ],
    };

    let actions = TierSpec {
        tier: Tier::Actions,
        title: "Готовлю действия".to_owned(),
        allowed_tools: owned(&["pause_adset", "pause_campaign", "update_budget", "get_campaign_details"]),
        questions: Vec::new(),
        dangerous_policy: DangerousPolicy::Block,
        menu: vec![UiAction::new("Начать заново", "Проверь рекламу ещё раз")
            .with_intent(intents::ADS_DIAGNOSIS)],
    };

    Playbook {
        id: ADS_DIAGNOSIS_PLAYBOOK.to_owned(),
        intent: intents::ADS_DIAGNOSIS.to_owned(),
        tiers: vec![snapshot, drilldown, actions],
    }
}
