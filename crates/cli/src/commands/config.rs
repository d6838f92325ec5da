use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use adpilot_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run(options: &LoadOptions) -> String {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(options.config_path.as_deref());
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        if overridden(options, key_path) {
            return "flag".to_string();
        }
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let engine = &config.engine;
    let mut lines = vec!["effective config (source precedence: flag > env > file > default):".to_string()];
    lines.push(render_line(
        "engine.max_questions_per_turn",
        &engine.max_questions_per_turn.to_string(),
        source("engine.max_questions_per_turn", &["ADPILOT_ENGINE_MAX_QUESTIONS_PER_TURN"]),
    ));
    lines.push(render_line(
        "engine.history_window",
        &engine.history_window.to_string(),
        source("engine.history_window", &["ADPILOT_ENGINE_HISTORY_WINDOW"]),
    ));
    lines.push(render_line(
        "engine.max_next_steps",
        &engine.max_next_steps.to_string(),
        source("engine.max_next_steps", &["ADPILOT_ENGINE_MAX_NEXT_STEPS"]),
    ));
    lines.push(render_line(
        "engine.spend_breakdown_threshold",
        &engine.spend_breakdown_threshold.to_string(),
        source("engine.spend_breakdown_threshold", &["ADPILOT_ENGINE_SPEND_BREAKDOWN_THRESHOLD"]),
    ));
    lines.push(render_line(
        "engine.vague_max_words",
        &engine.vague_max_words.to_string(),
        source("engine.vague_max_words", &["ADPILOT_ENGINE_VAGUE_MAX_WORDS"]),
    ));
    lines.push(render_line(
        "engine.allow_dangerous_tools",
        &engine.allow_dangerous_tools.to_string(),
        source("engine.allow_dangerous_tools", &["ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["ADPILOT_LOGGING_LEVEL", "ADPILOT_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format).to_lowercase(),
        source("logging.format", &["ADPILOT_LOGGING_FORMAT", "ADPILOT_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn overridden(options: &LoadOptions, key_path: &str) -> bool {
    let overrides = &options.overrides;
    match key_path {
        "engine.max_questions_per_turn" => overrides.max_questions_per_turn.is_some(),
        "engine.history_window" => overrides.history_window.is_some(),
        "engine.allow_dangerous_tools" => overrides.allow_dangerous_tools.is_some(),
        "logging.level" => overrides.log_level.is_some(),
        "logging.format" => overrides.log_format.is_some(),
        _ => false,
    }
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    let root = PathBuf::from("adpilot.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/adpilot.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
