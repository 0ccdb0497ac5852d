//! Nudger configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::scheduler::ScheduleConfig;

/// Main Nudger configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The single user this companion serves
    pub user: UserConfig,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Telegram bot configuration
    pub telegram: TelegramConfig,

    /// Phase times and grace periods
    pub schedule: ScheduleConfig,

    /// Urgent keywords and resume behaviour
    pub interrupts: InterruptConfig,

    /// Calendar source
    pub calendar: CalendarConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Health socket configuration
    pub health: HealthConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .nudger.yml
        let local_config = PathBuf::from(".nudger.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/nudger/nudger.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("nudger").join("nudger.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialised
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates: Vec<PathBuf> = match config_path {
            Some(path) => vec![path.clone()],
            None => {
                let mut paths = vec![PathBuf::from(".nudger.yml")];
                if let Some(config_dir) = dirs::config_dir() {
                    paths.push(config_dir.join("nudger").join("nudger.yml"));
                }
                paths
            }
        };

        candidates
            .into_iter()
            .find(|p| p.exists())
            .and_then(|p| fs::read_to_string(p).ok())
            .and_then(|content| serde_yaml::from_str::<Self>(&content).ok())
            .and_then(|config| config.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;
        config
            .schedule
            .validate()
            .context("Invalid schedule in config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// The single user this companion serves
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// Identifier used for the storage directory
    pub id: String,

    /// Name used in prompts and greetings
    pub name: String,

    pub age: Option<u32>,

    pub condition: Option<String>,

    /// Goals seeded into a new profile (empty keeps the stock goals)
    pub goals: Vec<String>,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            name: "friend".to_string(),
            age: None,
            condition: Some("ADHD".to_string()),
            goals: Vec::new(),
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("openai" or "anthropic")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 500,
            temperature: 0.7,
            timeout_ms: 30_000,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.api_key_env)
            .with_context(|| format!("LLM API key not found. Set the {} environment variable.", self.api_key_env))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Telegram bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Environment variable containing the bot token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Chat that receives nudges; messages from other chats are ignored
    #[serde(rename = "chat-id")]
    pub chat_id: Option<i64>,

    /// Bot API base URL
    #[serde(rename = "api-base")]
    pub api_base: String,

    /// Long-poll timeout for getUpdates
    #[serde(rename = "poll-timeout-secs")]
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token_env: "TELEGRAM_BOT_TOKEN".to_string(),
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            poll_timeout_secs: 30,
        }
    }
}

impl TelegramConfig {
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env)
            .with_context(|| format!("Telegram bot token not found. Set the {} environment variable.", self.token_env))
    }
}

/// Urgent keyword detection and resume behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterruptConfig {
    /// Case-insensitive substrings that trigger an interrupt
    pub keywords: Vec<String>,

    /// Case-insensitive phrases that end an interrupt
    #[serde(rename = "resume-cues")]
    pub resume_cues: Vec<String>,

    /// Resume automatically after this many minutes; unset means only on cue
    #[serde(rename = "auto-resume-minutes", skip_serializing_if = "Option::is_none")]
    pub auto_resume_minutes: Option<u32>,
}

impl Default for InterruptConfig {
    fn default() -> Self {
        Self {
            keywords: ["help", "urgent", "emergency", "stuck", "overwhelmed", "anxiety", "anxious", "panic"]
                .into_iter()
                .map(String::from)
                .collect(),
            resume_cues: [
                "i'm okay now",
                "im okay now",
                "i'm ok now",
                "feeling better",
                "back on track",
                "i'm good now",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            auto_resume_minutes: None,
        }
    }
}

/// Calendar source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// "none", "file" or "google"
    pub provider: String,

    /// YAML events file for the "file" provider
    pub path: Option<String>,

    /// Calendar id for the "google" provider
    #[serde(rename = "calendar-id")]
    pub calendar_id: String,

    /// Environment variable holding the Google OAuth access token
    #[serde(rename = "token-env")]
    pub token_env: String,

    /// Google Calendar API base URL
    #[serde(rename = "api-base")]
    pub api_base: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            provider: "none".to_string(),
            path: None,
            calendar_id: "primary".to_string(),
            token_env: "GOOGLE_CALENDAR_TOKEN".to_string(),
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Root for per-user data
    #[serde(rename = "data-dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        // Use XDG data directory (~/.local/share/nudger on Linux)
        let data_dir = dirs::data_dir()
            .map(|d| d.join("nudger"))
            .unwrap_or_else(|| PathBuf::from(".nudger"))
            .to_string_lossy()
            .into_owned();

        Self { data_dir }
    }
}

/// Health socket configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    /// Override for the Unix socket path
    #[serde(rename = "socket-path", skip_serializing_if = "Option::is_none")]
    pub socket_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Phase;
    use serial_test::serial;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.user.id, "default");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.calendar.provider, "none");
        assert_eq!(config.schedule.grace_minutes, 10);
        assert!(config.interrupts.keywords.contains(&"overwhelmed".to_string()));
        assert!(config.interrupts.auto_resume_minutes.is_none());
        assert!(config.log_level.is_none());
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
user:
  id: alex
  name: Alex
  age: 30
llm:
  provider: anthropic
  model: claude-haiku
  api-key-env: MY_KEY
  max-tokens: 300
  temperature: 0.8
telegram:
  chat-id: 12345
schedule:
  morning-checkin:
    at: "08:00"
  grace-minutes: 15
interrupts:
  keywords: [sos]
  auto-resume-minutes: 45
calendar:
  provider: file
  path: /tmp/events.yml
log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.user.id, "alex");
        assert_eq!(config.user.age, Some(30));
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.api_key_env, "MY_KEY");
        assert_eq!(config.llm.max_tokens, 300);
        assert_eq!(config.telegram.chat_id, Some(12345));
        assert_eq!(config.telegram.token_env, "TELEGRAM_BOT_TOKEN");
        assert_eq!(
            config.schedule.time_for(Phase::MorningCheckin).format("%H:%M").to_string(),
            "08:00"
        );
        assert_eq!(config.schedule.grace_minutes, 15);
        assert_eq!(config.interrupts.keywords, vec!["sos".to_string()]);
        assert_eq!(config.interrupts.auto_resume_minutes, Some(45));
        assert_eq!(config.calendar.path.as_deref(), Some("/tmp/events.yml"));
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let yaml = r#"
llm:
  model: gpt-4o
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.schedule, ScheduleConfig::default());
    }

    #[test]
    fn test_load_explicit_path_rejects_bad_schedule() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "schedule:\n  midday-checkin:\n    at: \"06:00\"").unwrap();
        let path = file.path().to_path_buf();

        assert!(Config::load(Some(&path)).is_err());
    }

    #[test]
    fn test_load_log_level_from_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "log-level: warn").unwrap();
        let path = file.path().to_path_buf();

        assert_eq!(Config::load_log_level(Some(&path)).as_deref(), Some("warn"));
    }

    #[test]
    #[serial]
    fn test_telegram_token_from_env() {
        let config = TelegramConfig {
            token_env: "NUDGER_TEST_TELEGRAM_TOKEN".to_string(),
            ..Default::default()
        };
        // SAFETY: env access is serialized across tests with #[serial]
        unsafe { std::env::set_var("NUDGER_TEST_TELEGRAM_TOKEN", "123:abc") };
        assert_eq!(config.token().unwrap(), "123:abc");

        unsafe { std::env::remove_var("NUDGER_TEST_TELEGRAM_TOKEN") };
        let err = config.token().unwrap_err();
        assert!(err.to_string().contains("NUDGER_TEST_TELEGRAM_TOKEN"));
    }

    #[test]
    #[serial]
    fn test_llm_api_key_missing() {
        let config = LlmConfig {
            api_key_env: "NUDGER_TEST_MISSING_KEY".to_string(),
            ..Default::default()
        };
        unsafe { std::env::remove_var("NUDGER_TEST_MISSING_KEY") };
        assert!(config.api_key().is_err());
    }
}
