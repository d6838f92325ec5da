use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::guardrails::ToolCall;

/// Executor boundary. Implementations call ad platforms, the CRM or
/// messengers; the engine itself never does I/O.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    async fn execute(&self, input: Value) -> Result<Value>;
}

/// Result of one executed call, as handed to the response assembler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub tool: String,
    pub success: bool,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OperationResult {
    pub fn success(tool: impl Into<String>, data: Value) -> Self {
        Self { tool: tool.into(), success: true, data, error: None }
    }

    pub fn failure(tool: impl Into<String>, error: impl Into<String>) -> Self {
        Self { tool: tool.into(), success: false, data: Value::Null, error: Some(error.into()) }
    }

    /// Row list of a tabular payload: a bare array or an `items`/`rows` field.
    pub fn rows(&self) -> Option<&[Value]> {
        match &self.data {
            Value::Array(rows) => Some(rows.as_slice()),
            Value::Object(map) => ["items", "rows"]
                .iter()
                .find_map(|key| map.get(*key))
                .and_then(Value::as_array)
                .map(Vec::as_slice),
            _ => None,
        }
    }

    /// Top-level numeric field, accepting numbers encoded as strings.
    pub fn number(&self, key: &str) -> Option<f64> {
        number_field(&self.data, key)
    }
}

pub(crate) fn number_field(value: &Value, key: &str) -> Option<f64> {
    match value.get(key)? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.insert(tool.name().to_string(), Box::new(tool));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Runs one call. Executor failures become failed results so the reply
    /// can still be assembled.
    pub async fn execute(&self, call: &ToolCall) -> OperationResult {
        let Some(tool) = self.tools.get(&call.tool) else {
            return OperationResult::failure(&call.tool, format!("no executor registered for `{}`", call.tool));
        };
        match tool.execute(call.arguments.clone()).await {
            Ok(data) => OperationResult::success(&call.tool, data),
            Err(error) => OperationResult::failure(&call.tool, error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use serde_json::{json, Value};

    use super::{Tool, ToolRegistry};
    use crate::guardrails::ToolCall;

    struct SpendReport;

    #[async_trait]
    impl Tool for SpendReport {
        fn name(&self) -> &'static str {
            "get_spend_report"
        }

        async fn execute(&self, input: Value) -> Result<Value> {
            Ok(json!({ "period": input["period"], "spend": 120.5 }))
        }
    }

    struct Broken;

    #[async_trait]
    impl Tool for Broken {
        fn name(&self) -> &'static str {
            "get_leads"
        }

        async fn execute(&self, _input: Value) -> Result<Value> {
            bail!("graph api timeout")
        }
    }

    #[tokio::test]
    async fn registered_tools_run_and_failures_are_captured() {
        let mut registry = ToolRegistry::default();
        registry.register(SpendReport);
        registry.register(Broken);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains("get_spend_report"));

        let ok = registry.execute(&ToolCall::new("get_spend_report", json!({ "period": "last_7d" }))).await;
        assert!(ok.success);
        assert_eq!(ok.data["period"], "last_7d");

        let failed = registry.execute(&ToolCall::new("get_leads", json!({}))).await;
        assert!(!failed.success);
        assert_eq!(failed.error.as_deref(), Some("graph api timeout"));
    }

    #[tokio::test]
    async fn unknown_tools_fail_without_panicking() {
        let registry = ToolRegistry::default();
        assert!(registry.is_empty());
        let result = registry.execute(&ToolCall::new("get_campaigns", json!({}))).await;
        assert!(!result.success);
        assert!(result.error.is_some_and(|error| error.contains("get_campaigns")));
    }
}
