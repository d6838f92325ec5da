pub mod commands;

use std::path::PathBuf;
use std::process::ExitCode;

use adpilot_core::config::{AppConfig, ConfigOverrides, LoadOptions, LogFormat};
use adpilot_core::domain::context::Integration;
use adpilot_core::tiers::Tier;
use clap::{Parser, Subcommand};

use commands::plan::PlanArgs;

#[derive(Debug, Parser)]
#[command(
    name = "adpilot",
    about = "Adpilot operator CLI",
    long_about = "Inspect intent classification, resolved policies, turn plans and engine configuration.",
    after_help = "Examples:\n  adpilot classify \"покажи расходы\"\n  adpilot plan --message \"поставь на паузу кампанию c1\" --integration facebook\n  adpilot policy ads_diagnosis --integration facebook --tier drilldown\n  adpilot doctor --json"
)]
pub struct Cli {
    #[arg(long, global = true, help = "Config file (default: adpilot.toml or config/adpilot.toml)")]
    config: Option<PathBuf>,
    #[arg(long, global = true, help = "Override logging.level")]
    log_level: Option<String>,
    #[arg(long, global = true, help = "Override logging.format (compact|pretty|json)")]
    log_format: Option<LogFormat>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Classify a message into an intent and print it as JSON")]
    Classify {
        message: String,
        #[arg(long, help = "Explicit intent hint")]
        intent: Option<String>,
    },
    #[command(about = "Plan one conversational turn: intent, policy, clarification and decision")]
    Plan(PlanArgs),
    #[command(about = "Print the effective policy for an intent")]
    Policy {
        intent: String,
        #[arg(long = "integration", help = "Connected integration (repeatable)")]
        integrations: Vec<Integration>,
        #[arg(long, help = "Current tier for playbook intents")]
        tier: Option<Tier>,
    },
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config and policy catalog invariants")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
}

impl Cli {
    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            config_path: self.config.clone(),
            require_file: self.config.is_some(),
            overrides: ConfigOverrides {
                log_level: self.log_level.clone(),
                log_format: self.log_format,
                ..ConfigOverrides::default()
            },
        }
    }
}

/// Logs go to stderr so stdout stays a clean JSON document.
fn init_logging(config: &AppConfig) {
    use adpilot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);
    let builder = tracing_subscriber::fmt().with_writer(std::io::stderr).with_target(false).with_max_level(log_level);

    match config.logging.format {
        Compact => builder.compact().init(),
        Pretty => builder.pretty().init(),
        Json => builder.json().init(),
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    let options = cli.load_options();

    // Commands report config errors themselves; logging falls back to defaults.
    init_logging(&AppConfig::load(options.clone()).unwrap_or_default());

    let result = match &cli.command {
        Command::Classify { message, intent } => commands::classify::run(message, intent.as_deref()),
        Command::Plan(args) => commands::plan::run(args, &options),
        Command::Policy { intent, integrations, tier } => commands::policy::run(intent, integrations, *tier),
        Command::Config => commands::CommandResult { exit_code: 0, output: commands::config::run(&options) },
        Command::Doctor { json } => commands::doctor::run(*json, &options),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
