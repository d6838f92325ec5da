use serde::Serialize;

/// An operation the executor can run on behalf of the assistant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ToolSpec {
    pub name: &'static str,
    /// Mutates state on an ad platform, CRM or messenger.
    pub dangerous: bool,
    pub description: &'static str,
}

const fn read(name: &'static str, description: &'static str) -> ToolSpec {
    ToolSpec { name, dangerous: false, description }
}

const fn write(name: &'static str, description: &'static str) -> ToolSpec {
    ToolSpec { name, dangerous: true, description }
}

pub const TOOLS: &[ToolSpec] = &[
    read("get_spend_report", "Расходы по рекламному кабинету за период"),
    read("get_leads", "Лиды из рекламных форм и сайта"),
    read("get_directions", "Список направлений и их показатели"),
    read("get_campaigns", "Кампании с базовыми метриками"),
    read("get_campaign_details", "Детали одной кампании"),
    read("get_adsets", "Группы объявлений кампании"),
    read("get_creatives", "Список креативов"),
    read("get_creative_metrics", "Метрики креативов"),
    read("get_tiktok_report", "Отчёт по TikTok Ads"),
    read("get_roi_report", "Окупаемость по данным аналитики"),
    read("get_crm_leads", "Лиды из CRM"),
    read("search_leads", "Поиск лидов в CRM"),
    read("get_funnel_stats", "Воронка продаж CRM"),
    read("get_whatsapp_dialogs", "Диалоги WhatsApp"),
    write("pause_campaign", "Остановить кампанию"),
    write("resume_campaign", "Запустить кампанию"),
    write("pause_adset", "Остановить группу объявлений"),
    write("resume_adset", "Запустить группу объявлений"),
    write("update_budget", "Изменить бюджет"),
    write("update_lead_stage", "Перевести лида на другой этап"),
    write("send_whatsapp_message", "Отправить сообщение в WhatsApp"),
];

pub fn tool_spec(name: &str) -> Option<&'static ToolSpec> {
    TOOLS.iter().find(|tool| tool.name == name)
}

/// Unknown tools are treated as dangerous.
pub fn is_dangerous(name: &str) -> bool {
    tool_spec(name).map(|tool| tool.dangerous).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::{is_dangerous, tool_spec, TOOLS};

    #[test]
    fn tool_names_are_unique() {
        let names: HashSet<&str> = TOOLS.iter().map(|tool| tool.name).collect();
        assert_eq!(names.len(), TOOLS.len());
    }

    #[test]
    fn writes_are_dangerous_and_unknown_tools_fail_closed() {
        assert!(is_dangerous("pause_campaign"));
        assert!(is_dangerous("update_budget"));
        assert!(!is_dangerous("get_spend_report"));
        assert!(is_dangerous("drop_database"));
        assert!(tool_spec("drop_database").is_none());
    }
}
