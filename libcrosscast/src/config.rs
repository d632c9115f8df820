//! Configuration management for Crosscast

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::resilience::{CircuitBreakerConfig, RetryConfig};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub retry: RetrySettings,
    #[serde(default)]
    pub breaker: BreakerSettings,
    #[serde(default)]
    pub limiter: LimiterSettings,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub platforms: PlatformsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
}

/// Pacing for the background publish loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Seconds between polls of the approved queue.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Seconds to wait between items within one poll cycle.
    #[serde(default = "default_inter_item_delay_secs")]
    pub inter_item_delay_secs: u64,
    /// Seconds to wait between platforms within one item.
    #[serde(default = "default_inter_platform_delay_secs")]
    pub inter_platform_delay_secs: u64,
    /// Fully-failed cycles before an item is permanently failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_poll_interval_secs() -> u64 {
    30
}

fn default_inter_item_delay_secs() -> u64 {
    5
}

fn default_inter_platform_delay_secs() -> u64 {
    2
}

fn default_max_retries() -> u32 {
    crate::types::MAX_RETRIES
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            inter_item_delay_secs: default_inter_item_delay_secs(),
            inter_platform_delay_secs: default_inter_platform_delay_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn inter_item_delay(&self) -> Duration {
        Duration::from_secs(self.inter_item_delay_secs)
    }

    pub fn inter_platform_delay(&self) -> Duration {
        Duration::from_secs(self.inter_platform_delay_secs)
    }
}

/// Per-request retry and timeout settings for platform API calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_timeout_ms() -> u64 {
    15_000
}

fn default_initial_delay_ms() -> u64 {
    1_000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

impl RetrySettings {
    pub fn to_retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            timeout: Duration::from_millis(self.timeout_ms),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            backoff_multiplier: self.backoff_multiplier,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerSettings {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    60
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            reset_timeout: Duration::from_secs(self.reset_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterSettings {
    /// Maximum sustained request rate per platform.
    #[serde(default = "default_calls_per_second")]
    pub calls_per_second: f64,
}

fn default_calls_per_second() -> f64 {
    1.0
}

impl Default for LimiterSettings {
    fn default() -> Self {
        Self {
            calls_per_second: default_calls_per_second(),
        }
    }
}

/// Daily posting schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Local times of day at which content is generated, "HH:MM".
    #[serde(default = "default_slots")]
    pub slots: Vec<SlotConfig>,
    /// Platforms that scheduled content targets.
    #[serde(default = "default_platforms")]
    pub platforms: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    pub time: String,
    pub name: String,
}

fn default_slots() -> Vec<SlotConfig> {
    vec![
        SlotConfig {
            time: "09:00".to_string(),
            name: "Morning".to_string(),
        },
        SlotConfig {
            time: "14:00".to_string(),
            name: "Afternoon".to_string(),
        },
        SlotConfig {
            time: "19:00".to_string(),
            name: "Evening".to_string(),
        },
    ]
}

fn default_platforms() -> Vec<String> {
    vec!["tiktok".to_string(), "instagram".to_string()]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slots: default_slots(),
            platforms: default_platforms(),
        }
    }
}

/// Credentials and endpoints for the platform posters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformsConfig {
    pub tiktok: Option<TikTokConfig>,
    pub instagram: Option<InstagramConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TikTokConfig {
    pub access_token: String,
    #[serde(default = "default_tiktok_api_base")]
    pub api_base: String,
}

fn default_tiktok_api_base() -> String {
    "https://open.tiktokapis.com/v2".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstagramConfig {
    pub access_token: String,
    pub business_account_id: String,
    #[serde(default = "default_instagram_api_base")]
    pub api_base: String,
}

fn default_instagram_api_base() -> String {
    "https://graph.facebook.com/v19.0".to_string()
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        let config: Config = toml::from_str(&content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            database: DatabaseConfig {
                path: "~/.local/share/crosscast/queue.db".to_string(),
            },
            worker: WorkerConfig::default(),
            retry: RetrySettings::default(),
            breaker: BreakerSettings::default(),
            limiter: LimiterSettings::default(),
            schedule: ScheduleConfig::default(),
            platforms: PlatformsConfig::default(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier".to_string(),
                message: "must be at least 1.0".to_string(),
            }
            .into());
        }
        if self.limiter.calls_per_second <= 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "limiter.calls_per_second".to_string(),
                message: "must be positive".to_string(),
            }
            .into());
        }
        for slot in &self.schedule.slots {
            if crate::scheduler::parse_slot_time(&slot.time).is_none() {
                return Err(ConfigError::InvalidValue {
                    field: "schedule.slots".to_string(),
                    message: format!("'{}' is not a valid HH:MM time", slot.time),
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Resolve the configuration file path following XDG Base Directory spec
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("CROSSCAST_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("crosscast").join("config.toml"))
}

/// Resolve the data directory path following XDG Base Directory spec
pub fn resolve_data_path() -> Result<PathBuf> {
    let data_dir =
        dirs::data_dir().ok_or_else(|| ConfigError::MissingField("data directory".to_string()))?;

    Ok(data_dir.join("crosscast"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_applies_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/tmp/queue.db"
            "#,
        )
        .unwrap();

        assert_eq!(config.worker.poll_interval_secs, 30);
        assert_eq!(config.worker.inter_item_delay_secs, 5);
        assert_eq!(config.worker.inter_platform_delay_secs, 2);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.retry.max_delay_ms, 10000);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.reset_timeout_secs, 60);
        assert!(!config.schedule.enabled);
        assert_eq!(config.schedule.slots.len(), 3);
    }

    #[test]
    fn test_schedule_slot_defaults() {
        let config = Config::default_config();
        let times: Vec<&str> = config
            .schedule
            .slots
            .iter()
            .map(|s| s.time.as_str())
            .collect();
        assert_eq!(times, vec!["09:00", "14:00", "19:00"]);
        let names: Vec<&str> = config
            .schedule
            .slots
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(names, vec!["Morning", "Afternoon", "Evening"]);
    }

    #[test]
    fn test_retry_settings_conversion() {
        let settings = RetrySettings {
            max_retries: 5,
            timeout_ms: 2000,
            initial_delay_ms: 100,
            max_delay_ms: 800,
            backoff_multiplier: 3.0,
        };
        let config = settings.to_retry_config();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.timeout, Duration::from_secs(2));
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.max_delay, Duration::from_millis(800));
        assert_eq!(config.backoff_multiplier, 3.0);
    }

    #[test]
    fn test_invalid_backoff_multiplier_rejected() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/tmp/queue.db"

            [retry]
            backoff_multiplier = 0.5
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_slot_time_rejected() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/tmp/queue.db"

            [[schedule.slots]]
            time = "25:99"
            name = "Bogus"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_resolve_config_path_env_override() {
        std::env::set_var("CROSSCAST_CONFIG", "/tmp/custom.toml");
        let path = resolve_config_path().unwrap();
        assert_eq!(path, PathBuf::from("/tmp/custom.toml"));

        std::env::remove_var("CROSSCAST_CONFIG");
        let path = resolve_config_path().unwrap();
        assert!(path.ends_with("crosscast/config.toml"));
    }

    #[test]
    fn test_platform_config_parsing() {
        let config: Config = toml::from_str(
            r#"
            [database]
            path = "/tmp/queue.db"

            [platforms.tiktok]
            access_token = "tt-token"

            [platforms.instagram]
            access_token = "ig-token"
            business_account_id = "17890000000000000"
            "#,
        )
        .unwrap();

        let tiktok = config.platforms.tiktok.unwrap();
        assert_eq!(tiktok.access_token, "tt-token");
        assert_eq!(tiktok.api_base, "https://open.tiktokapis.com/v2");

        let instagram = config.platforms.instagram.unwrap();
        assert_eq!(instagram.business_account_id, "17890000000000000");
    }
}
