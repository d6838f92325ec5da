use adpilot_agent::intent::IntentClassifier;
use adpilot_core::config::{AppConfig, LoadOptions};
use adpilot_core::domain::context::{Integration, TurnContext};
use adpilot_core::policy::{is_dangerous, PolicyCatalog, PolicyResolver};
use adpilot_core::tiers::{builtin_playbooks, Tier};
use serde::Serialize;

use super::{tier_state, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn from_problems(name: &'static str, ok_details: &str, problems: Vec<String>) -> Self {
        if problems.is_empty() {
            Self { name, status: CheckStatus::Pass, details: ok_details.to_string() }
        } else {
            Self { name, status: CheckStatus::Fail, details: problems.join("; ") }
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool, options: &LoadOptions) -> CommandResult {
    let report = build_report(options);
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };
    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let resolver = PolicyResolver::default();
    let mut checks = vec![check_config(options)];
    checks.push(check_fail_closed_preflight(&resolver));
    checks.push(check_tool_budgets(&resolver));
    checks.push(check_dangerous_tools_tier(&resolver));
    checks.push(check_classifier_coverage(resolver.catalog()));

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

fn check_config(options: &LoadOptions) -> DoctorCheck {
    match AppConfig::load(options.clone()) {
        Ok(_) => DoctorCheck {
            name: "config_validation",
            status: CheckStatus::Pass,
            details: "configuration loaded and validated".to_string(),
        },
        Err(error) => {
            DoctorCheck { name: "config_validation", status: CheckStatus::Fail, details: error.to_string() }
        }
    }
}

fn all_integrations() -> TurnContext {
    TurnContext::default().with_integrations(Integration::ALL)
}

/// Without integrations every gated intent must expose no tools.
fn check_fail_closed_preflight(resolver: &PolicyResolver<'_>) -> DoctorCheck {
    let bare = TurnContext::default();
    let problems = resolver
        .catalog()
        .definitions()
        .iter()
        .filter(|definition| definition.preflight.is_some())
        .filter_map(|definition| {
            let policy = resolver.resolve(&definition.intent, &bare, None);
            (!policy.preflight_failed || policy.has_tools() || policy.max_tool_calls != 0)
                .then(|| format!("{} exposes tools without its integration", definition.intent))
        })
        .collect();
    DoctorCheck::from_problems("preflight_fail_closed", "every gated intent fails closed", problems)
}

fn check_tool_budgets(resolver: &PolicyResolver<'_>) -> DoctorCheck {
    let context = all_integrations();
    let problems = resolver
        .catalog()
        .definitions()
        .iter()
        .chain(std::iter::once(resolver.catalog().fallback()))
        .filter_map(|definition| {
            let policy = resolver.resolve(&definition.intent, &context, None);
            (policy.has_tools() == (policy.max_tool_calls == 0)).then(|| {
                format!(
                    "{} has {} tools with a budget of {}",
                    definition.intent,
                    policy.allowed_tools.len(),
                    policy.max_tool_calls
                )
            })
        })
        .collect();
    DoctorCheck::from_problems("tool_budgets", "tool budgets match tool lists", problems)
}

/// Mutating tools may only appear in the actions tier of a playbook.
fn check_dangerous_tools_tier(resolver: &PolicyResolver<'_>) -> DoctorCheck {
    let context = all_integrations();
    let mut problems = Vec::new();
    for playbook in builtin_playbooks() {
        for tier in [Tier::Snapshot, Tier::Drilldown] {
            let policy = resolver.resolve(&playbook.intent, &context, Some(&tier_state(&playbook.id, tier)));
            for tool in policy.allowed_tools.iter().filter(|tool| is_dangerous(tool)) {
                problems.push(format!("{} allows `{tool}` in tier {tier}", playbook.id));
            }
        }
    }
    DoctorCheck::from_problems("dangerous_tools_tier", "mutations are confined to the actions tier", problems)
}

fn check_classifier_coverage(catalog: &PolicyCatalog) -> DoctorCheck {
    let problems = IntentClassifier::new()
        .intents()
        .filter(|intent| !catalog.contains(intent))
        .map(|intent| format!("intent `{intent}` has no catalog entry"))
        .collect();
    DoctorCheck::from_problems("classifier_coverage", "every classifier intent has a policy", problems)
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
