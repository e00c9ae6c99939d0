//! Bridge configuration.
//!
//! Loaded from `TOPICBRIDGE_*` environment variables, or deserialized from
//! any serde format. Only the target group is required.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use topicbridge_core::GroupId;
use topicbridge_observability::LogFormat;

use crate::dispatch::{QueueConfig, RateLimit, QUEUE_SIZE};
use crate::platform::{telegram, Platform};
use crate::scheduler::MAX_INTERVAL;

pub const ENV_PREFIX: &str = "TOPICBRIDGE_";

const DEFAULT_PEER_INTERVAL_MS: u64 = 500;
const DEFAULT_FORUM_INTERVAL_MS: u64 = 1000;
const DEFAULT_RECONCILE_SECS: u64 = 15 * 60;
const DEFAULT_SWEEP_SECS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(String),
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, value: &str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Rate limiting and buffer size of one platform's dispatch queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformQueueConfig {
    pub enabled: bool,
    pub interval_ms: u64,
    pub capacity: usize,
}

impl PlatformQueueConfig {
    pub fn default_for(platform: Platform) -> Self {
        let interval_ms = match platform {
            Platform::Peer => DEFAULT_PEER_INTERVAL_MS,
            Platform::Forum => DEFAULT_FORUM_INTERVAL_MS,
        };
        Self {
            enabled: true,
            interval_ms,
            capacity: QUEUE_SIZE,
        }
    }

    /// Queue settings for `platform`'s worker.
    pub fn queue_config(&self, platform: Platform) -> QueueConfig {
        let rate_limit = if self.enabled {
            RateLimit::every(Duration::from_millis(self.interval_ms))
        } else {
            RateLimit::disabled()
        };
        QueueConfig::default()
            .with_name(platform.queue_name())
            .with_capacity(self.capacity)
            .with_rate_limit(rate_limit)
    }
}

fn default_peer_queue() -> PlatformQueueConfig {
    PlatformQueueConfig::default_for(Platform::Peer)
}

fn default_forum_queue() -> PlatformQueueConfig {
    PlatformQueueConfig::default_for(Platform::Forum)
}

fn default_reconcile_secs() -> u64 {
    DEFAULT_RECONCILE_SECS
}

fn default_sweep_secs() -> u64 {
    DEFAULT_SWEEP_SECS
}

fn default_api_url() -> String {
    telegram::DEFAULT_API_URL.to_string()
}

/// Top-level bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Forum group holding one topic per peer chat.
    pub target_group: GroupId,
    #[serde(default = "default_peer_queue")]
    pub peer_queue: PlatformQueueConfig,
    #[serde(default = "default_forum_queue")]
    pub forum_queue: PlatformQueueConfig,
    #[serde(default = "default_reconcile_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_sweep_secs")]
    pub sweep_interval_secs: u64,
    #[serde(default)]
    pub telegram_token: Option<String>,
    #[serde(default = "default_api_url")]
    pub telegram_api_url: String,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl BridgeConfig {
    /// Defaults for everything but the target group.
    pub fn new(target_group: GroupId) -> Self {
        Self {
            target_group,
            peer_queue: default_peer_queue(),
            forum_queue: default_forum_queue(),
            reconcile_interval_secs: DEFAULT_RECONCILE_SECS,
            sweep_interval_secs: DEFAULT_SWEEP_SECS,
            telegram_token: None,
            telegram_api_url: default_api_url(),
            database_url: None,
            log_format: LogFormat::default(),
        }
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup; keys carry the `TOPICBRIDGE_` prefix.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        };

        let (key, raw) =
            get("TARGET_GROUP").ok_or_else(|| ConfigError::Missing(format!("{ENV_PREFIX}TARGET_GROUP")))?;
        let target_group = raw
            .parse::<GroupId>()
            .map_err(|e| ConfigError::invalid(&key, &raw, e.to_string()))?;

        let mut config = Self::new(target_group);

        for (prefix, queue) in [("PEER", &mut config.peer_queue), ("FORUM", &mut config.forum_queue)] {
            if let Some((key, raw)) = get(&format!("{prefix}_QUEUE_ENABLED")) {
                queue.enabled = parse_bool(&key, &raw)?;
            }
            if let Some((key, raw)) = get(&format!("{prefix}_QUEUE_INTERVAL_MS")) {
                queue.interval_ms = parse_number(&key, &raw)?;
            }
            if let Some((key, raw)) = get(&format!("{prefix}_QUEUE_CAPACITY")) {
                queue.capacity = parse_positive(&key, &raw)?;
            }
        }

        if let Some((key, raw)) = get("RECONCILE_INTERVAL_SECS") {
            config.reconcile_interval_secs = parse_interval_secs(&key, &raw)?;
        }
        if let Some((key, raw)) = get("SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = parse_interval_secs(&key, &raw)?;
        }
        if let Some((_, token)) = get("TELEGRAM_TOKEN") {
            config.telegram_token = Some(token);
        }
        if let Some((_, url)) = get("TELEGRAM_API_URL") {
            config.telegram_api_url = url;
        }
        if let Some((_, url)) = get("DATABASE_URL") {
            config.database_url = Some(url);
        }
        if let Some((_, format)) = get("LOG_FORMAT") {
            config.log_format = LogFormat::from_name(&format);
        }

        Ok(config)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, raw, "expected a boolean")),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.parse::<T>()
        .map_err(|e| ConfigError::invalid(key, raw, e.to_string()))
}

fn parse_positive<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    T::Err: std::fmt::Display,
{
    let value: T = parse_number(key, raw)?;
    if value <= T::default() {
        return Err(ConfigError::invalid(key, raw, "must be greater than zero"));
    }
    Ok(value)
}

fn parse_interval_secs(key: &str, raw: &str) -> Result<u64, ConfigError> {
    let secs: u64 = parse_positive(key, raw)?;
    let max = MAX_INTERVAL.as_secs();
    if secs > max {
        return Err(ConfigError::invalid(
            key,
            raw,
            format!("must be at most {max} seconds"),
        ));
    }
    Ok(secs)
}
