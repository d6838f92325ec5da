use std::collections::BTreeMap;

use adpilot_core::config::EngineConfig;
use adpilot_core::domain::answer::{EntityKind, SoftConfirmation};
use adpilot_core::policy::{tool_spec, Policy};
use adpilot_core::tiers::{TierEngine, TierState};
use adpilot_core::ui::{AlertLevel, MetricDelta, UiAction, UiDescriptor};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::guardrails::ToolCall;
use crate::next_steps::{self, ResultView};
use crate::tools::{number_field, OperationResult};

/// Row count above which tabular results render as a table instead of cards.
pub const CARD_LIMIT: usize = 3;

const NESTED_ROW_KEYS: &[&str] = &["items", "rows"];

const ID_KEYS: &[(&str, EntityKind)] = &[
    ("campaign_id", EntityKind::Campaign),
    ("adset_id", EntityKind::Adset),
    ("ad_id", EntityKind::Ad),
    ("creative_id", EntityKind::Creative),
    ("direction_id", EntityKind::Direction),
    ("lead_id", EntityKind::Lead),
];

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRefEntry {
    #[serde(rename = "ref")]
    pub short_ref: String,
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Hands out `c1`, `d2`, ... per response. The same entity id always gets
/// the same reference; numbering is per kind, in order of first mention.
#[derive(Clone, Debug, Default)]
pub struct EntityRefRegistry {
    assigned: BTreeMap<(EntityKind, String), String>,
    counters: BTreeMap<EntityKind, usize>,
    entries: Vec<EntityRefEntry>,
}

impl EntityRefRegistry {
    pub fn reference(&mut self, kind: EntityKind, id: &str, name: Option<&str>) -> String {
        if let Some(existing) = self.assigned.get(&(kind, id.to_owned())) {
            return existing.clone();
        }
        let counter = self.counters.entry(kind).or_insert(0);
        *counter += 1;
        let short_ref = format!("{}{}", kind.prefix(), counter);
        self.assigned.insert((kind, id.to_owned()), short_ref.clone());
        self.entries.push(EntityRefEntry {
            short_ref: short_ref.clone(),
            kind,
            id: id.to_owned(),
            name: name.map(str::to_owned),
        });
        short_ref
    }

    pub fn entries(&self) -> &[EntityRefEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<EntityRefEntry> {
        self.entries
    }
}

/// Everything besides operation results that the reply has to carry.
#[derive(Clone, Debug, Default)]
pub struct AssemblyContext {
    pub tier_state: Option<TierState>,
    pub soft_confirmations: Vec<SoftConfirmation>,
    /// Descriptors produced by the clarifying gate.
    pub clarification: Vec<UiDescriptor>,
    /// Dangerous calls waiting for the user's decision.
    pub pending_approvals: Vec<ToolCall>,
    /// The reply asks the user something; no follow-ups are suggested.
    pub awaiting_user: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssembledResponse {
    pub content: String,
    pub ui_descriptors: Vec<UiDescriptor>,
    pub next_steps: Vec<UiAction>,
    pub entity_refs: Vec<EntityRefEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_state: Option<TierState>,
}

pub struct ResponseAssembler {
    max_next_steps: usize,
    spend_breakdown_threshold: f64,
    tiers: TierEngine<'static>,
}

impl ResponseAssembler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_next_steps: config.max_next_steps,
            spend_breakdown_threshold: config.spend_breakdown_threshold,
            tiers: TierEngine::default(),
        }
    }

    pub fn assemble(
        &self,
        raw_reply: &str,
        policy: &Policy,
        results: &[OperationResult],
        context: AssemblyContext,
    ) -> AssembledResponse {
        let mut refs = EntityRefRegistry::default();
        let mut ui_descriptors = Vec::new();
        let mut content = raw_reply.trim().to_owned();

        if policy.preflight_failed {
            let message = policy.preflight_error.clone().unwrap_or_default();
            if content.is_empty() {
                content = message.clone();
            }
            ui_descriptors.push(UiDescriptor::alert(AlertLevel::Warning, message));
        }

        let mut annotated = Vec::with_capacity(results.len());
        for result in results {
            let mut result = result.clone();
            annotate_entities(&mut refs, &result.tool, &mut result.data);
            annotated.push(result);
        }
        for result in &annotated {
            ui_descriptors.extend(describe_result(result));
        }

        ui_descriptors.extend(context.clarification.iter().cloned());
        for confirmation in &context.soft_confirmations {
            let already_shown = context.clarification.iter().any(|descriptor| {
                matches!(descriptor, UiDescriptor::SoftConfirm { field_id, .. } if *field_id == confirmation.field)
            });
            if !already_shown {
                ui_descriptors.push(UiDescriptor::SoftConfirm {
                    field_id: confirmation.field.clone(),
                    value: confirmation.value.code(),
                    message: confirmation.message.clone(),
                });
            }
        }

        ui_descriptors.extend(context.pending_approvals.iter().map(approval_for));

        if let Some(state) = &context.tier_state {
            ui_descriptors.push(self.tiers.progress(state));
            let menu = self.tiers.next_step_menu(state);
            if !menu.is_empty() {
                ui_descriptors.push(UiDescriptor::Actions { title: Some(state.current_tier.label().to_owned()), actions: menu });
            }
        }

        let next_steps = if context.awaiting_user || policy.preflight_failed {
            Vec::new()
        } else {
            let view = ResultView { results: &annotated, spend_breakdown_threshold: self.spend_breakdown_threshold };
            next_steps::suggest(policy.intent.as_str(), &view, self.max_next_steps)
        };

        AssembledResponse {
            content,
            ui_descriptors,
            next_steps,
            entity_refs: refs.into_entries(),
            tier_state: context.tier_state,
        }
    }
}

impl Default for ResponseAssembler {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

fn tool_entity_kind(tool: &str) -> Option<EntityKind> {
    match tool {
        "get_campaigns" | "get_campaign_details" => Some(EntityKind::Campaign),
        "get_adsets" => Some(EntityKind::Adset),
        "get_directions" => Some(EntityKind::Direction),
        "get_creatives" | "get_creative_metrics" => Some(EntityKind::Creative),
        "get_leads" | "get_crm_leads" | "search_leads" => Some(EntityKind::Lead),
        _ => None,
    }
}

fn scalar_id(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

fn row_entity(tool: &str, row: &Map<String, Value>) -> Option<(EntityKind, String)> {
    ID_KEYS
        .iter()
        .find_map(|(key, kind)| row.get(*key).and_then(scalar_id).map(|id| (*kind, id)))
        .or_else(|| {
            let kind = tool_entity_kind(tool)?;
            row.get("id").and_then(scalar_id).map(|id| (kind, id))
        })
}

fn annotate_row(refs: &mut EntityRefRegistry, tool: &str, row: &mut Value) {
    if let Value::Object(map) = row {
        annotate_map(refs, tool, map);
    }
}

fn annotate_map(refs: &mut EntityRefRegistry, tool: &str, map: &mut Map<String, Value>) {
    if map.contains_key("ref") {
        return;
    }
    if let Some((kind, id)) = row_entity(tool, map) {
        let name = map.get("name").and_then(Value::as_str);
        let short_ref = refs.reference(kind, &id, name);
        map.insert("ref".to_owned(), Value::String(short_ref));
    }
}

/// Adds a `ref` field to every row (or the single object) naming an entity.
fn annotate_entities(refs: &mut EntityRefRegistry, tool: &str, data: &mut Value) {
    match data {
        Value::Array(rows) => rows.iter_mut().for_each(|row| annotate_row(refs, tool, row)),
        Value::Object(map) => {
            let nested = NESTED_ROW_KEYS.iter().copied().find(|key| map.get(*key).is_some_and(Value::is_array));
            match nested.and_then(|key| map.get_mut(key)) {
                Some(Value::Array(rows)) => rows.iter_mut().for_each(|row| annotate_row(refs, tool, row)),
                _ => annotate_map(refs, tool, map),
            }
        }
        _ => {}
    }
}

fn title_for(tool: &str) -> String {
    tool_spec(tool).map(|spec| spec.description.to_owned()).unwrap_or_else(|| tool.to_owned())
}

fn describe_result(result: &OperationResult) -> Option<UiDescriptor> {
    if !result.success {
        return Some(UiDescriptor::alert(
            AlertLevel::Error,
            format!("Не получилось выполнить «{}». Попробуйте чуть позже.", title_for(&result.tool)),
        ));
    }

    if let Some(metrics) = comparison(&result.data) {
        return Some(UiDescriptor::MetricsComparison { title: title_for(&result.tool), metrics });
    }

    let rows = result.rows()?;
    if rows.is_empty() {
        return None;
    }
    if rows.len() > CARD_LIMIT {
        Some(UiDescriptor::Table { title: title_for(&result.tool), columns: columns(rows), rows: rows.to_vec() })
    } else {
        Some(UiDescriptor::Cards { title: title_for(&result.tool), cards: rows.to_vec() })
    }
}

/// `{ current: {...}, previous: {...} }` payloads become metric deltas.
fn comparison(data: &Value) -> Option<Vec<MetricDelta>> {
    let current = data.get("current")?.as_object()?;
    let previous = data.get("previous")?;
    let metrics: Vec<MetricDelta> = current
        .iter()
        .filter_map(|(metric, value)| {
            let now = value.as_f64()?;
            let before = number_field(previous, metric)?;
            Some(MetricDelta::new(metric.clone(), now, before))
        })
        .collect();
    (!metrics.is_empty()).then_some(metrics)
}

fn columns(rows: &[Value]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    if rows.iter().any(|row| row.get("ref").is_some()) {
        columns.push("ref".to_owned());
    }
    for row in rows {
        if let Value::Object(map) = row {
            for key in map.keys() {
                if !columns.contains(key) {
                    columns.push(key.clone());
                }
            }
        }
    }
    columns
}

fn approval_for(call: &ToolCall) -> UiDescriptor {
    UiDescriptor::Approval {
        tool: call.tool.clone(),
        arguments: call.arguments.clone(),
        title: format!("{}?", title_for(&call.tool)),
        approve_label: "Подтвердить".to_owned(),
        reject_label: "Отменить".to_owned(),
    }
}
