use std::fmt;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_INTENT: &str = "unknown";
pub const UNKNOWN_CONFIDENCE: f32 = 0.1;

/// Intent identifiers known to the built-in catalog.
pub mod intents {
    pub const GREETING_NEUTRAL: &str = "greeting_neutral";
    pub const HELP: &str = "help";
    pub const SPEND_REPORT: &str = "spend_report";
    pub const LEADS_REPORT: &str = "leads_report";
    pub const CAMPAIGN_OVERVIEW: &str = "campaign_overview";
    pub const CREATIVE_REPORT: &str = "creative_report";
    pub const ADS_DIAGNOSIS: &str = "ads_diagnosis";
    pub const PAUSE_ENTITY: &str = "pause_entity";
    pub const RESUME_ENTITY: &str = "resume_entity";
    pub const BUDGET_CHANGE: &str = "budget_change";
    pub const LEAD_SEARCH: &str = "lead_search";
    pub const FUNNEL_REPORT: &str = "funnel_report";
    pub const LEAD_STAGE_CHANGE: &str = "lead_stage_change";
    pub const WHATSAPP_DIALOGS: &str = "whatsapp_dialogs";
    pub const SEND_WHATSAPP_MESSAGE: &str = "send_whatsapp_message";
}

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntentId(pub String);

impl IntentId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn unknown() -> Self {
        Self(UNKNOWN_INTENT.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN_INTENT
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentDomain {
    Ads,
    Crm,
    Whatsapp,
    Creative,
    General,
    Unknown,
}

impl IntentDomain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ads => "ads",
            Self::Crm => "crm",
            Self::Whatsapp => "whatsapp",
            Self::Creative => "creative",
            Self::General => "general",
            Self::Unknown => "unknown",
        }
    }
}

/// Classification of a single turn. Determined fresh per message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    #[serde(rename = "intent")]
    pub id: IntentId,
    pub domain: IntentDomain,
    pub confidence: f32,
}

impl Intent {
    pub fn new(id: impl Into<String>, domain: IntentDomain, confidence: f32) -> Self {
        Self { id: IntentId::new(id), domain, confidence: confidence.clamp(0.0, 1.0) }
    }

    pub fn unknown() -> Self {
        Self { id: IntentId::unknown(), domain: IntentDomain::Unknown, confidence: UNKNOWN_CONFIDENCE }
    }
}

#[cfg(test)]
mod tests {
    use super::{Intent, IntentDomain, IntentId};

    #[test]
    fn unknown_intent_has_low_confidence() {
        let intent = Intent::unknown();
        assert!(intent.id.is_unknown());
        assert_eq!(intent.domain, IntentDomain::Unknown);
        assert!((intent.confidence - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn intent_serializes_with_spec_field_names() {
        let intent = Intent::new("spend_report", IntentDomain::Ads, 0.8);
        let json = serde_json::to_value(&intent).expect("serialize intent");
        assert_eq!(json["intent"], "spend_report");
        assert_eq!(json["domain"], "ads");
    }

    #[test]
    fn confidence_is_clamped() {
        let intent = Intent::new("x", IntentDomain::General, 3.0);
        assert_eq!(intent.confidence, 1.0);
        assert_eq!(IntentId::new("x").to_string(), "x");
    }
}
