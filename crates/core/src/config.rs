use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clarify::GateSettings;

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

/// Knobs of the clarification gate, guardrails and next-step suggestions.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EngineConfig {
    pub max_questions_per_turn: usize,
    /// How many recent user messages the gate searches for earlier answers.
    pub history_window: usize,
    pub max_next_steps: usize,
    /// Spend (account currency) above which a breakdown suggestion is offered.
    pub spend_breakdown_threshold: f64,
    pub vague_max_words: usize,
    /// Kill switch for every mutating tool.
    pub allow_dangerous_tools: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub max_questions_per_turn: Option<usize>,
    pub history_window: Option<usize>,
    pub allow_dangerous_tools: Option<bool>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_questions_per_turn: 1,
            history_window: 5,
            max_next_steps: 3,
            spend_breakdown_threshold: 100.0,
            vague_max_words: 3,
            allow_dangerous_tools: true,
        }
    }
}

impl EngineConfig {
    pub fn gate_settings(&self) -> GateSettings {
        GateSettings {
            max_questions_per_turn: self.max_questions_per_turn,
            history_window: self.history_window,
            vague_max_words: self.vague_max_words,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("adpilot.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(engine) = patch.engine {
            if let Some(value) = engine.max_questions_per_turn {
                self.engine.max_questions_per_turn = value;
            }
            if let Some(value) = engine.history_window {
                self.engine.history_window = value;
            }
            if let Some(value) = engine.max_next_steps {
                self.engine.max_next_steps = value;
            }
            if let Some(value) = engine.spend_breakdown_threshold {
                self.engine.spend_breakdown_threshold = value;
            }
            if let Some(value) = engine.vague_max_words {
                self.engine.vague_max_words = value;
            }
            if let Some(value) = engine.allow_dangerous_tools {
                self.engine.allow_dangerous_tools = value;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ADPILOT_ENGINE_MAX_QUESTIONS_PER_TURN") {
            self.engine.max_questions_per_turn =
                parse_usize("ADPILOT_ENGINE_MAX_QUESTIONS_PER_TURN", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_ENGINE_HISTORY_WINDOW") {
            self.engine.history_window = parse_usize("ADPILOT_ENGINE_HISTORY_WINDOW", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_ENGINE_MAX_NEXT_STEPS") {
            self.engine.max_next_steps = parse_usize("ADPILOT_ENGINE_MAX_NEXT_STEPS", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_ENGINE_SPEND_BREAKDOWN_THRESHOLD") {
            self.engine.spend_breakdown_threshold =
                parse_f64("ADPILOT_ENGINE_SPEND_BREAKDOWN_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_ENGINE_VAGUE_MAX_WORDS") {
            self.engine.vague_max_words = parse_usize("ADPILOT_ENGINE_VAGUE_MAX_WORDS", &value)?;
        }
        if let Some(value) = read_env("ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS") {
            self.engine.allow_dangerous_tools =
                parse_bool("ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS", &value)?;
        }

        if let Some(value) =
            read_env("ADPILOT_LOGGING_LEVEL").or_else(|| read_env("ADPILOT_LOG_LEVEL"))
        {
            self.logging.level = value;
        }
        if let Some(value) =
            read_env("ADPILOT_LOGGING_FORMAT").or_else(|| read_env("ADPILOT_LOG_FORMAT"))
        {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(value) = overrides.max_questions_per_turn {
            self.engine.max_questions_per_turn = value;
        }
        if let Some(value) = overrides.history_window {
            self.engine.history_window = value;
        }
        if let Some(value) = overrides.allow_dangerous_tools {
            self.engine.allow_dangerous_tools = value;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_engine(&self.engine)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("adpilot.toml"), PathBuf::from("config/adpilot.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_engine(engine: &EngineConfig) -> Result<(), ConfigError> {
    if !(1..=5).contains(&engine.max_questions_per_turn) {
        return Err(ConfigError::Validation(
            "engine.max_questions_per_turn must be in range 1..=5".to_string(),
        ));
    }

    if engine.history_window > 50 {
        return Err(ConfigError::Validation(
            "engine.history_window must not exceed 50 messages".to_string(),
        ));
    }

    if !(1..=3).contains(&engine.max_next_steps) {
        return Err(ConfigError::Validation(
            "engine.max_next_steps must be in range 1..=3".to_string(),
        ));
    }

    if !engine.spend_breakdown_threshold.is_finite() || engine.spend_breakdown_threshold < 0.0 {
        return Err(ConfigError::Validation(
            "engine.spend_breakdown_threshold must be a non-negative number".to_string(),
        ));
    }

    if engine.vague_max_words == 0 {
        return Err(ConfigError::Validation(
            "engine.vague_max_words must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    engine: Option<EnginePatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct EnginePatch {
    max_questions_per_turn: Option<usize>,
    history_window: Option<usize>,
    max_next_steps: Option<usize>,
    spend_breakdown_threshold: Option<f64>,
    vague_max_words: Option<usize>,
    allow_dangerous_tools: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;
        ensure(config.engine.max_questions_per_turn == 1, "one question per turn by default")?;
        ensure(config.engine.history_window == 5, "history window defaults to five")?;
        ensure(config.engine.allow_dangerous_tools, "dangerous tools are enabled by default")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )?;
        let gate = config.engine.gate_settings();
        ensure(gate.vague_max_words == 3, "gate settings mirror engine config")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_ADPILOT_WINDOW", "12");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(
                &path,
                r#"
[engine]
history_window = ${TEST_ADPILOT_WINDOW}
allow_dangerous_tools = false
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.engine.history_window == 12, "window should come from interpolation")?;
            ensure(!config.engine.allow_dangerous_tools, "kill switch should be read from file")?;
            Ok(())
        })();

        clear_vars(&["TEST_ADPILOT_WINDOW"]);
        result
    }

    #[test]
    fn missing_interpolation_variable_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        clear_vars(&["TEST_ADPILOT_UNSET"]);

        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let path = dir.path().join("adpilot.toml");
        fs::write(&path, "[logging]\nlevel = \"${TEST_ADPILOT_UNSET}\"\n")
            .map_err(|err| err.to_string())?;

        let outcome = AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() });
        ensure(
            matches!(outcome, Err(ConfigError::MissingEnvInterpolation { ref var }) if var == "TEST_ADPILOT_UNSET"),
            "missing variable should be named in the error",
        )
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_LOG_LEVEL", "warn");
        env::set_var("ADPILOT_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )?;
            Ok(())
        })();

        clear_vars(&["ADPILOT_LOG_LEVEL", "ADPILOT_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_ENGINE_HISTORY_WINDOW", "20");
        env::set_var("ADPILOT_ENGINE_MAX_NEXT_STEPS", "2");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("adpilot.toml");
            fs::write(
                &path,
                r#"
[engine]
history_window = 8
max_next_steps = 1
max_questions_per_turn = 2

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    max_questions_per_turn: Some(3),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.engine.max_questions_per_turn == 3, "override should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.engine.history_window == 20, "env should win over file")?;
            ensure(config.engine.max_next_steps == 2, "env should win over file")?;
            Ok(())
        })();

        clear_vars(&["ADPILOT_ENGINE_HISTORY_WINDOW", "ADPILOT_ENGINE_MAX_NEXT_STEPS"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_ENGINE_MAX_QUESTIONS_PER_TURN", "9");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            let has_message = matches!(
                error,
                ConfigError::Validation(ref message) if message.contains("max_questions_per_turn")
            );
            ensure(has_message, "validation failure should name the offending key")
        })();

        clear_vars(&["ADPILOT_ENGINE_MAX_QUESTIONS_PER_TURN"]);
        result
    }

    #[test]
    fn malformed_env_override_is_rejected() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS", "sometimes");

        let result = (|| -> Result<(), String> {
            let outcome = AppConfig::load(LoadOptions::default());
            ensure(
                matches!(outcome, Err(ConfigError::InvalidEnvOverride { ref key, .. }) if key == "ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS"),
                "malformed boolean should be rejected",
            )
        })();

        clear_vars(&["ADPILOT_ENGINE_ALLOW_DANGEROUS_TOOLS"]);
        result
    }

    #[test]
    fn required_file_must_exist() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let missing = dir.path().join("absent.toml");
        let outcome = AppConfig::load(LoadOptions {
            config_path: Some(missing.clone()),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(outcome, Err(ConfigError::MissingConfigFile(ref path)) if *path == missing),
            "missing required file should be reported",
        )
    }
}
