use std::sync::OnceLock;

use serde::Serialize;

use crate::clarify::condition::{AskCondition, CompareOp, ConditionValue};
use crate::domain::answer::{AnswerValue, EntityKind, Metric, Period};
use crate::domain::context::Integration;
use crate::domain::intent::{intents, IntentDomain, UNKNOWN_INTENT};
use crate::domain::question::{AskMode, Question, QuestionType};
use crate::policy::{DangerousPolicy, Preflight};
use crate::tiers::playbook::{self, ADS_DIAGNOSIS_PLAYBOOK};

/// A tool added only when its integration is connected.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OptionalTool {
    pub integration: Integration,
    pub tool: String,
}

/// Static policy entry for one intent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PolicyDefinition {
    pub intent: String,
    pub domain: IntentDomain,
    pub allowed_tools: Vec<String>,
    pub optional_tools: Vec<OptionalTool>,
    pub dangerous_policy: DangerousPolicy,
    pub max_tool_calls: u32,
    pub questions: Vec<Question>,
    pub preflight: Option<Preflight>,
    pub use_context_only: bool,
    pub playbook_id: Option<String>,
}

impl PolicyDefinition {
    pub fn new(intent: &str, domain: IntentDomain) -> Self {
        Self {
            intent: intent.to_owned(),
            domain,
            allowed_tools: Vec::new(),
            optional_tools: Vec::new(),
            dangerous_policy: DangerousPolicy::Block,
            max_tool_calls: 0,
            questions: Vec::new(),
            preflight: None,
            use_context_only: false,
            playbook_id: None,
        }
    }

    pub fn tools<I, S>(mut self, tools: I, max_tool_calls: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tools = tools.into_iter().map(Into::into).collect();
        self.max_tool_calls = max_tool_calls;
        self
    }

    pub fn optional_tool(mut self, integration: Integration, tool: &str) -> Self {
        self.optional_tools.push(OptionalTool { integration, tool: tool.to_owned() });
        self
    }

    pub fn allow_dangerous(mut self) -> Self {
        self.dangerous_policy = DangerousPolicy::Allow;
        self
    }

    pub fn question(mut self, question: Question) -> Self {
        self.questions.push(question);
        self
    }

    pub fn preflight(mut self, preflight: Preflight) -> Self {
        self.preflight = Some(preflight);
        self
    }

    pub fn context_only(mut self) -> Self {
        self.use_context_only = true;
        self
    }

    pub fn playbook(mut self, playbook_id: &str) -> Self {
        self.playbook_id = Some(playbook_id.to_owned());
        self
    }
}

pub struct PolicyCatalog {
    definitions: Vec<PolicyDefinition>,
    fallback: PolicyDefinition,
}

impl PolicyCatalog {
    pub fn new(definitions: Vec<PolicyDefinition>, fallback: PolicyDefinition) -> Self {
        Self { definitions, fallback }
    }

    pub fn builtin() -> &'static PolicyCatalog {
        static CATALOG: OnceLock<PolicyCatalog> = OnceLock::new();
        CATALOG.get_or_init(|| PolicyCatalog::new(builtin_definitions(), fallback_definition()))
    }

    pub fn find(&self, intent: &str) -> Option<&PolicyDefinition> {
        self.definitions.iter().find(|definition| definition.intent == intent)
    }

    /// Definition for `intent`, or the tool-less fallback.
    pub fn get(&self, intent: &str) -> &PolicyDefinition {
        self.find(intent).unwrap_or(&self.fallback)
    }

    pub fn fallback(&self) -> &PolicyDefinition {
        &self.fallback
    }

    pub fn definitions(&self) -> &[PolicyDefinition] {
        &self.definitions
    }

    pub fn contains(&self, intent: &str) -> bool {
        self.find(intent).is_some()
    }
}

fn period_question(default: Option<Period>) -> Question {
    let question = Question::new("period", QuestionType::Period, "За какой период посмотреть?");
    match default {
        Some(period) => question.with_default(AnswerValue::Period(period)),
        None => question,
    }
}

fn directions_question() -> Question {
    Question::new("direction", QuestionType::Entity, "По какому направлению смотреть?")
        .with_entity_kind(EntityKind::Direction)
        .ask_if(AskCondition::Compare {
            field: "directions_count".to_owned(),
            op: CompareOp::Gt,
            value: ConditionValue::Number(1.0),
        })
}

fn entity_question(prompt: &str) -> Question {
    Question::new("entity", QuestionType::Entity, prompt)
}

fn builtin_definitions() -> Vec<PolicyDefinition> {
    use IntentDomain::{Ads, Creative, Crm, General, Whatsapp};

    let last_week = Some(Period::LastDays(7));

    vec![
        PolicyDefinition::new(intents::GREETING_NEUTRAL, General).context_only(),
        PolicyDefinition::new(intents::HELP, General).context_only(),
        PolicyDefinition::new(intents::SPEND_REPORT, Ads)
            .tools(["get_spend_report", "get_campaigns"], 3)
            .optional_tool(Integration::Tiktok, "get_tiktok_report")
            .optional_tool(Integration::RoiAnalytics, "get_roi_report")
            .question(period_question(last_week.clone()))
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::LEADS_REPORT, Ads)
            .tools(["get_leads", "get_directions"], 3)
            .optional_tool(Integration::Crm, "get_crm_leads")
            .question(period_question(last_week.clone()))
            .question(directions_question())
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::CAMPAIGN_OVERVIEW, Ads)
            .tools(["get_campaigns", "get_campaign_details"], 3)
            .optional_tool(Integration::Tiktok, "get_tiktok_report")
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::CREATIVE_REPORT, Creative)
            .tools(["get_creatives", "get_creative_metrics"], 2)
            .question(
                Question::new("metric", QuestionType::Metric, "По какой метрике сравнить креативы?")
                    .with_default(AnswerValue::Metric(Metric::Cpl)),
            )
            .question(period_question(last_week.clone()))
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::ADS_DIAGNOSIS, Ads)
            .tools(playbook::all_tools(ADS_DIAGNOSIS_PLAYBOOK), 6)
            .playbook(ADS_DIAGNOSIS_PLAYBOOK)
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::PAUSE_ENTITY, Ads)
            .tools(["pause_campaign", "pause_adset", "get_campaigns"], 2)
            .question(entity_question("Какую кампанию или группу остановить?"))
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::RESUME_ENTITY, Ads)
            .tools(["resume_campaign", "resume_adset", "get_campaigns"], 2)
            .question(entity_question("Какую кампанию или группу запустить?"))
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::BUDGET_CHANGE, Ads)
            .tools(["update_budget", "get_campaign_details"], 2)
            .question(entity_question("Для какой кампании изменить бюджет?"))
            .question(
                Question::new("amount", QuestionType::Amount, "Какой бюджет поставить?")
                    .with_mode(AskMode::SoftConfirm),
            )
            .preflight(Preflight::AdAccount),
        PolicyDefinition::new(intents::LEAD_SEARCH, Crm)
            .tools(["search_leads"], 2)
            .question(period_question(None).optional())
            .preflight(Preflight::Requires(Integration::Crm)),
        PolicyDefinition::new(intents::FUNNEL_REPORT, Crm)
            .tools(["get_funnel_stats"], 1)
            .question(period_question(None).with_options([
                ("last_7d", "7 дней"),
                ("last_30d", "30 дней"),
                ("this_month", "Этот месяц"),
            ]))
            .preflight(Preflight::Requires(Integration::Crm)),
        PolicyDefinition::new(intents::LEAD_STAGE_CHANGE, Crm)
            .tools(["update_lead_stage", "search_leads"], 2)
            .question(entity_question("Какого лида перевести?"))
            .question(
                Question::new("stage", QuestionType::Stage, "На какой этап перевести лида?")
                    .with_options([
                        ("new", "Новый"),
                        ("qualified", "Квалифицирован"),
                        ("meeting", "Встреча"),
                        ("won", "Оплата"),
                        ("lost", "Отказ"),
                    ]),
            )
            .preflight(Preflight::Requires(Integration::Crm)),
        PolicyDefinition::new(intents::WHATSAPP_DIALOGS, Whatsapp)
            .tools(["get_whatsapp_dialogs"], 1)
            .question(period_question(last_week))
            .preflight(Preflight::Requires(Integration::Whatsapp)),
        PolicyDefinition::new(intents::SEND_WHATSAPP_MESSAGE, Whatsapp)
            .tools(["send_whatsapp_message", "get_whatsapp_dialogs"], 2)
            .question(
                Question::new("confirm_send", QuestionType::Confirmation, "Отправить это сообщение клиенту?")
                    .with_mode(AskMode::AlwaysAsk),
            )
            .preflight(Preflight::Requires(Integration::Whatsapp)),
    ]
}

fn fallback_definition() -> PolicyDefinition {
    PolicyDefinition::new(UNKNOWN_INTENT, IntentDomain::Unknown).question(
        Question::new("goal", QuestionType::Choice, "Уточните, что нужно сделать?")
            .with_mode(AskMode::AlwaysAsk)
            .with_options([
                (intents::SPEND_REPORT, "Показать расходы"),
                (intents::LEADS_REPORT, "Показать лиды"),
                (intents::ADS_DIAGNOSIS, "Разобраться, почему реклама работает плохо"),
                (intents::HELP, "Что ты умеешь?"),
            ]),
    )
}

#[cfg(test)]
mod tests {
    use super::{PolicyCatalog, PolicyDefinition};
    use crate::domain::intent::{intents, IntentDomain};
    use crate::domain::question::AskMode;
    use crate::policy::{tool_spec, DangerousPolicy};

    #[test]
    fn every_definition_is_well_formed() {
        for definition in PolicyCatalog::builtin().definitions() {
            assert_eq!(
                definition.max_tool_calls == 0,
                definition.allowed_tools.is_empty(),
                "{}",
                definition.intent
            );
            for tool in definition
                .allowed_tools
                .iter()
                .chain(definition.optional_tools.iter().map(|optional| &optional.tool))
            {
                assert!(tool_spec(tool).is_some(), "{} uses unknown tool {tool}", definition.intent);
            }
        }
    }

    #[test]
    fn writes_are_blocked_by_default() {
        let catalog = PolicyCatalog::builtin();
        for intent in [intents::PAUSE_ENTITY, intents::BUDGET_CHANGE, intents::SEND_WHATSAPP_MESSAGE] {
            assert_eq!(catalog.get(intent).dangerous_policy, DangerousPolicy::Block);
        }
    }

    #[test]
    fn unknown_intents_fall_back_to_toolless_policy() {
        let fallback = PolicyCatalog::builtin().get("transfer_all_money");
        assert!(fallback.allowed_tools.is_empty());
        assert_eq!(fallback.max_tool_calls, 0);
        assert_eq!(fallback.questions.len(), 1);
        assert_eq!(fallback.questions[0].mode, AskMode::AlwaysAsk);
        assert!(!PolicyCatalog::builtin().contains("transfer_all_money"));
    }

    #[test]
    fn custom_catalogs_can_allow_dangerous_calls() {
        let definition = PolicyDefinition::new("pause_entity", IntentDomain::Ads)
            .tools(["pause_campaign"], 1)
            .allow_dangerous();
        let catalog = PolicyCatalog::new(vec![definition], super::fallback_definition());
        assert_eq!(catalog.get("pause_entity").dangerous_policy, DangerousPolicy::Allow);
        assert_eq!(catalog.get("pause_entity").max_tool_calls, 1);
    }
}
