use adpilot_agent::runtime::{AgentRuntime, TurnInput};
use adpilot_core::config::{AppConfig, LoadOptions};
use adpilot_core::domain::answer::AnswerSet;
use adpilot_core::domain::context::{Integration, RecentMessage};
use adpilot_core::tiers::{Tier, ADS_DIAGNOSIS_PLAYBOOK};
use clap::Args;
use serde_json::{Map, Value};

use super::{tier_state, turn_context, CommandResult, EXIT_CONFIG, EXIT_INPUT};

#[derive(Debug, Clone, Default, Args)]
pub struct PlanArgs {
    #[arg(long, help = "User message for this turn")]
    pub message: String,
    #[arg(long, help = "Explicit intent, bypassing the classifier")]
    pub intent: Option<String>,
    #[arg(long = "integration", help = "Connected integration (repeatable)")]
    pub integrations: Vec<Integration>,
    #[arg(long, help = "Answers from earlier turns as a JSON object")]
    pub answers: Option<String>,
    #[arg(long, help = "Field of the question this message replies to")]
    pub replying_to: Option<String>,
    #[arg(long, help = "Earlier user message, oldest first (repeatable)")]
    pub history: Vec<String>,
    #[arg(long, help = "Turn metadata as a JSON object, e.g. {\"directions_count\":2}")]
    pub metadata: Option<String>,
    #[arg(long, help = "Playbook of the current run (defaults to ads_diagnosis with --tier)")]
    pub playbook: Option<String>,
    #[arg(long, help = "Current tier of the playbook run")]
    pub tier: Option<Tier>,
}

pub fn run(args: &PlanArgs, options: &LoadOptions) -> CommandResult {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return CommandResult::failure("plan", "config_validation", error.to_string(), EXIT_CONFIG),
    };
    let input = match turn_input(args) {
        Ok(input) => input,
        Err(message) => return CommandResult::failure("plan", "invalid_input", message, EXIT_INPUT),
    };

    let plan = AgentRuntime::new(config.engine).plan_turn(&input);
    CommandResult::json("plan", &plan)
}

fn turn_input(args: &PlanArgs) -> Result<TurnInput, String> {
    let mut context = turn_context(&args.integrations);
    for message in &args.history {
        context = context.with_message(RecentMessage::user(message.clone()));
    }
    if let Some(raw) = &args.metadata {
        let metadata: Map<String, Value> =
            serde_json::from_str(raw).map_err(|error| format!("--metadata is not a JSON object: {error}"))?;
        for (key, value) in metadata {
            context = context.with_metadata(key, value);
        }
    }

    let answers = match &args.answers {
        Some(raw) => serde_json::from_str::<AnswerSet>(raw)
            .map_err(|error| format!("--answers is not a valid answer set: {error}"))?,
        None => AnswerSet::default(),
    };

    let mut input = TurnInput::new(args.message.clone()).with_context(context).with_answers(answers);
    if let Some(intent) = &args.intent {
        input = input.with_intent(intent.clone());
    }
    if let Some(field) = &args.replying_to {
        input = input.replying_to(field.clone());
    }
    match (&args.playbook, args.tier) {
        (Some(playbook), tier) => {
            input = input.with_tier_state(tier_state(playbook, tier.unwrap_or(Tier::Snapshot)));
        }
        (None, Some(tier)) => input = input.with_tier_state(tier_state(ADS_DIAGNOSIS_PLAYBOOK, tier)),
        (None, None) => {}
    }
    Ok(input)
}
