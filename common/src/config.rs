// Configuration management with layered configuration
// defaults -> config/default.toml -> config/local.toml -> APP__* env -> legacy flat env keys

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgConnectOptions;
use std::path::Path;

pub const DEFAULT_UPSTREAM_URL: &str = "https://rezerwacje.duw.pl/status_kolejek/query.php?status";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36";
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub schedule: ScheduleConfig,
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    pub observability: ObservabilityConfig,
    /// Problems found while loading that did not prevent startup
    #[serde(skip)]
    pub load_warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub name: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
}

impl DatabaseConfig {
    /// Connection options built from discrete parts, so passwords need no URL escaping
    pub fn connect_options(&self) -> PgConnectOptions {
        PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub poll_interval_seconds: u64,
    pub work_start_hour: u32,
    pub work_end_hour: u32,
    pub timezone: String,
    pub max_concurrent_cycles: usize,
    pub shutdown_grace_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    pub url: String,
    pub timeout_seconds: u64,
    pub user_agent: String,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
}

/// Rotating egress proxy. `username` may carry a `{session}` (or `%s`) placeholder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub port: String,
}

impl ProxyConfig {
    pub fn is_configured(&self) -> bool {
        !self.address.is_empty() && !self.port.is_empty()
    }
}

/// Telegram credentials; notifications are disabled unless both are present
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: Option<String>,
    #[serde(default)]
    pub chat_id: Option<String>,
    #[serde(default = "default_telegram_api_base")]
    pub api_base: String,
}

fn default_telegram_api_base() -> String {
    DEFAULT_TELEGRAM_API_BASE.to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: default_telegram_api_base(),
        }
    }
}

impl TelegramConfig {
    /// Returns `(bot_token, chat_id)` when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let token = self.bot_token.as_deref().filter(|t| !t.is_empty())?;
        let chat_id = self.chat_id.as_deref().filter(|c| !c.is_empty())?;
        Some((token, chat_id))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

/// Flat environment keys used by existing deployments, mapped to settings paths
const LEGACY_STRING_KEYS: &[(&str, &str)] = &[
    ("DB_HOST", "database.host"),
    ("DB_USER", "database.user"),
    ("DB_PASSWORD", "database.password"),
    ("DB_NAME", "database.name"),
    ("PROXY_USERNAME", "upstream.proxy.username"),
    ("PROXY_PASSWORD", "upstream.proxy.password"),
    ("PROXY_ADDRESS", "upstream.proxy.address"),
    ("PROXY_PORT", "upstream.proxy.port"),
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_CHAT_ID", "telegram.chat_id"),
];

/// Integer keys with the inclusive range the target field can hold
const LEGACY_INTEGER_KEYS: &[(&str, &str, i64, i64)] = &[
    ("DB_PORT", "database.port", 0, u16::MAX as i64),
    ("WORK_START_HOUR", "schedule.work_start_hour", 0, u32::MAX as i64),
    ("WORK_END_HOUR", "schedule.work_end_hour", 0, u32::MAX as i64),
];

impl Settings {
    /// Load configuration from `./config` and the process environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific directory and the process environment
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        Self::load_with_env(config_dir, |key| std::env::var(key).ok())
    }

    /// Load configuration using `lookup` to resolve legacy flat environment keys
    pub fn load_with_env<P, F>(config_dir: P, lookup: F) -> Result<Self, ConfigError>
    where
        P: AsRef<Path>,
        F: Fn(&str) -> Option<String>,
    {
        let config_dir = config_dir.as_ref();
        let defaults = Settings::default();

        let mut builder = Config::builder()
            .set_default("database.host", defaults.database.host)?
            .set_default("database.port", i64::from(defaults.database.port))?
            .set_default("database.user", defaults.database.user)?
            .set_default("database.password", defaults.database.password)?
            .set_default("database.name", defaults.database.name)?
            .set_default(
                "database.max_connections",
                i64::from(defaults.database.max_connections),
            )?
            .set_default(
                "database.min_connections",
                i64::from(defaults.database.min_connections),
            )?
            .set_default(
                "database.connect_timeout_seconds",
                defaults.database.connect_timeout_seconds as i64,
            )?
            .set_default(
                "schedule.poll_interval_seconds",
                defaults.schedule.poll_interval_seconds as i64,
            )?
            .set_default(
                "schedule.work_start_hour",
                i64::from(defaults.schedule.work_start_hour),
            )?
            .set_default(
                "schedule.work_end_hour",
                i64::from(defaults.schedule.work_end_hour),
            )?
            .set_default("schedule.timezone", defaults.schedule.timezone)?
            .set_default(
                "schedule.max_concurrent_cycles",
                defaults.schedule.max_concurrent_cycles as i64,
            )?
            .set_default(
                "schedule.shutdown_grace_seconds",
                defaults.schedule.shutdown_grace_seconds as i64,
            )?
            .set_default("upstream.url", defaults.upstream.url)?
            .set_default(
                "upstream.timeout_seconds",
                defaults.upstream.timeout_seconds as i64,
            )?
            .set_default("upstream.user_agent", defaults.upstream.user_agent)?
            .set_default("telegram.api_base", defaults.telegram.api_base)?
            .set_default("observability.log_level", defaults.observability.log_level)?
            // Checked-in defaults
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Local overrides (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        for (env_key, path) in LEGACY_STRING_KEYS {
            let value = lookup(env_key).filter(|v| !v.is_empty());
            builder = builder.set_override_option(*path, value)?;
        }

        let mut load_warnings = Vec::new();
        for (env_key, path, min, max) in LEGACY_INTEGER_KEYS {
            let Some(raw) = lookup(env_key).filter(|v| !v.is_empty()) else {
                continue;
            };
            match raw.trim().parse::<i64>() {
                Ok(value) if (*min..=*max).contains(&value) => {
                    builder = builder.set_override(*path, value)?;
                }
                Ok(_) => load_warnings.push(format!(
                    "Out of range value for {}: {}, keeping configured default",
                    env_key, raw
                )),
                Err(_) => load_warnings.push(format!(
                    "Invalid integer value for {}: {}, keeping configured default",
                    env_key, raw
                )),
            }
        }

        let mut settings: Settings = builder.build()?.try_deserialize()?;
        settings.load_warnings = load_warnings;

        // An empty proxy section behaves like no proxy at all
        if matches!(&settings.upstream.proxy, Some(proxy) if !proxy.is_configured()) {
            settings.upstream.proxy = None;
        }

        Ok(settings)
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.database.host.is_empty() {
            return Err("Database host cannot be empty".to_string());
        }
        if self.database.name.is_empty() {
            return Err("Database name cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }

        let schedule = &self.schedule;
        if schedule.poll_interval_seconds == 0 {
            return Err("Schedule poll_interval_seconds must be greater than 0".to_string());
        }
        if schedule.work_start_hour > 24 || schedule.work_end_hour > 24 {
            return Err("Working hours must be within 0..=24".to_string());
        }
        if schedule.work_start_hour >= schedule.work_end_hour {
            return Err(format!(
                "work_start_hour ({}) must be earlier than work_end_hour ({})",
                schedule.work_start_hour, schedule.work_end_hour
            ));
        }
        if schedule.max_concurrent_cycles == 0 {
            return Err("Schedule max_concurrent_cycles must be greater than 0".to_string());
        }

        if self.upstream.url.is_empty() {
            return Err("Upstream URL cannot be empty".to_string());
        }
        if self.upstream.timeout_seconds == 0 {
            return Err("Upstream timeout_seconds must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                host: "localhost".to_string(),
                port: 5432,
                user: "postgres".to_string(),
                password: "password".to_string(),
                name: "duw_queue".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
            },
            schedule: ScheduleConfig {
                poll_interval_seconds: 10,
                work_start_hour: 8,
                work_end_hour: 18,
                timezone: "Europe/Warsaw".to_string(),
                max_concurrent_cycles: 16,
                shutdown_grace_seconds: 30,
            },
            upstream: UpstreamConfig {
                url: DEFAULT_UPSTREAM_URL.to_string(),
                timeout_seconds: 30,
                user_agent: DEFAULT_USER_AGENT.to_string(),
                proxy: None,
            },
            telegram: TelegramConfig::default(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                metrics_port: None,
            },
            load_warnings: Vec::new(),
        }
    }
}
