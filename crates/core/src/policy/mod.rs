pub mod catalog;
pub mod resolver;
pub mod tools;

use serde::{Deserialize, Serialize};

use crate::domain::context::{Integration, Integrations};
use crate::domain::intent::{IntentDomain, IntentId};
use crate::domain::question::Question;
use crate::tiers::Tier;

pub use catalog::{OptionalTool, PolicyCatalog, PolicyDefinition};
pub use resolver::PolicyResolver;
pub use tools::{is_dangerous, tool_spec, ToolSpec, TOOLS};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DangerousPolicy {
    Allow,
    #[default]
    Block,
}

/// Integration precondition checked before any tool is exposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "integration", rename_all = "snake_case")]
pub enum Preflight {
    /// At least one ad platform (Facebook or TikTok) is connected.
    AdAccount,
    Requires(Integration),
}

impl Preflight {
    pub fn check(&self, integrations: &Integrations) -> bool {
        match self {
            Self::AdAccount => {
                integrations.contains(&Integration::Facebook) || integrations.contains(&Integration::Tiktok)
            }
            Self::Requires(integration) => integrations.contains(integration),
        }
    }

    pub fn error_message(&self) -> &'static str {
        match self {
            Self::AdAccount => {
                "Рекламный кабинет не подключён. Подключите Facebook или TikTok в настройках, и я смогу работать с рекламой."
            }
            Self::Requires(Integration::Crm) => {
                "CRM не подключена. Подключите её в настройках, чтобы работать с лидами и воронкой."
            }
            Self::Requires(Integration::Whatsapp) => {
                "WhatsApp не подключён. Подключите номер в настройках, чтобы работать с диалогами."
            }
            Self::Requires(Integration::Tiktok) => "TikTok Ads не подключён.",
            Self::Requires(Integration::Facebook) => "Facebook Ads не подключён.",
            Self::Requires(Integration::RoiAnalytics) => "Аналитика окупаемости не подключена.",
        }
    }
}

/// Effective permission and question contract for one turn.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Policy {
    pub intent: IntentId,
    pub domain: IntentDomain,
    pub allowed_tools: Vec<String>,
    pub dangerous_policy: DangerousPolicy,
    pub max_tool_calls: u32,
    pub clarifying_questions: Vec<Question>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight: Option<Preflight>,
    pub use_context_only: bool,
    pub preflight_failed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preflight_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub playbook_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier: Option<Tier>,
}

impl Policy {
    pub fn allows(&self, tool: &str) -> bool {
        self.allowed_tools.iter().any(|allowed| allowed == tool)
    }

    pub fn has_tools(&self) -> bool {
        !self.allowed_tools.is_empty()
    }
}
