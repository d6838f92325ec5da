use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Integration {
    Facebook,
    Tiktok,
    Crm,
    Whatsapp,
    RoiAnalytics,
}

impl Integration {
    pub const ALL: [Integration; 5] =
        [Self::Facebook, Self::Tiktok, Self::Crm, Self::Whatsapp, Self::RoiAnalytics];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Facebook => "facebook",
            Self::Tiktok => "tiktok",
            Self::Crm => "crm",
            Self::Whatsapp => "whatsapp",
            Self::RoiAnalytics => "roi_analytics",
        }
    }
}

impl fmt::Display for Integration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Integration {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "facebook" | "fb" => Ok(Self::Facebook),
            "tiktok" => Ok(Self::Tiktok),
            "crm" => Ok(Self::Crm),
            "whatsapp" | "wa" => Ok(Self::Whatsapp),
            "roi_analytics" | "roi" => Ok(Self::RoiAnalytics),
            other => Err(format!("unknown integration `{other}`")),
        }
    }
}

pub type Integrations = BTreeSet<Integration>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentMessage {
    pub role: MessageRole,
    pub content: String,
}

impl RecentMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: MessageRole::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: MessageRole::Assistant, content: content.into() }
    }
}

/// Caller-supplied context for one turn. Messages are ordered oldest first.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    #[serde(default)]
    pub integrations: Integrations,
    #[serde(default)]
    pub recent_messages: Vec<RecentMessage>,
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl TurnContext {
    pub fn with_integrations<I>(mut self, integrations: I) -> Self
    where
        I: IntoIterator<Item = Integration>,
    {
        self.integrations.extend(integrations);
        self
    }

    pub fn with_message(mut self, message: RecentMessage) -> Self {
        self.recent_messages.push(message);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn has(&self, integration: Integration) -> bool {
        self.integrations.contains(&integration)
    }

    /// User messages, most recent first, limited to `window` entries.
    pub fn recent_user_messages(&self, window: usize) -> impl Iterator<Item = &str> {
        self.recent_messages
            .iter()
            .rev()
            .filter(|message| message.role == MessageRole::User)
            .take(window)
            .map(|message| message.content.as_str())
    }
}
