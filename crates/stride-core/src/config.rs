//! StrideConfig - runtime settings.
//!
//! Sources, later wins:
//! 1. built-in defaults
//! 2. a JSON file (`from_json_file`), every field optional
//! 3. `STRIDE_*` environment variables (`apply_env`)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::app::dispatcher::DispatchConfig;
use crate::domain::BackoffPolicy;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config file {path}: {message}")]
    Io { path: String, message: String },
    #[error("parsing config: {0}")]
    Parse(String),
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchSection {
    pub period_secs: u64,
    pub lock_name: String,
    pub lock_ttl_secs: u64,
}

impl Default for DispatchSection {
    fn default() -> Self {
        Self {
            period_secs: 600,
            lock_name: "process_all_workouts".to_string(),
            lock_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySection {
    pub max_attempts: u32,
    pub base_secs: u64,
    pub cap_secs: u64,
}

impl Default for RetrySection {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_secs: 10,
            cap_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorSection {
    /// Per-item lease around processing. Off keeps duplicate deliveries
    /// racing (last write wins).
    pub item_lock: bool,
    pub item_lock_ttl_secs: u64,
}

impl Default for ProcessorSection {
    fn default() -> Self {
        Self {
            item_lock: false,
            item_lock_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerSection {
    pub concurrency: usize,
    pub poll_timeout_ms: u64,
}

impl Default for WorkerSection {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_timeout_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrideConfig {
    pub dispatch: DispatchSection,
    pub retry: RetrySection,
    pub processor: ProcessorSection,
    pub worker: WorkerSection,
    /// Coordination store; unset means the in-memory store.
    pub redis_url: Option<String>,
}

impl StrideConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `STRIDE_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("STRIDE_DISPATCH_PERIOD_SECS") {
            self.dispatch.period_secs = parse("STRIDE_DISPATCH_PERIOD_SECS", &v)?;
        }
        if let Some(v) = lookup("STRIDE_LOCK_TTL_SECS") {
            self.dispatch.lock_ttl_secs = parse("STRIDE_LOCK_TTL_SECS", &v)?;
        }
        if let Some(v) = lookup("STRIDE_MAX_ATTEMPTS") {
            self.retry.max_attempts = parse("STRIDE_MAX_ATTEMPTS", &v)?;
        }
        if let Some(v) = lookup("STRIDE_RETRY_BASE_SECS") {
            self.retry.base_secs = parse("STRIDE_RETRY_BASE_SECS", &v)?;
        }
        if let Some(v) = lookup("STRIDE_RETRY_CAP_SECS") {
            self.retry.cap_secs = parse("STRIDE_RETRY_CAP_SECS", &v)?;
        }
        if let Some(v) = lookup("STRIDE_ITEM_LOCK") {
            self.processor.item_lock = parse_bool("STRIDE_ITEM_LOCK", &v)?;
        }
        if let Some(v) = lookup("STRIDE_WORKER_CONCURRENCY") {
            self.worker.concurrency = parse("STRIDE_WORKER_CONCURRENCY", &v)?;
        }
        if let Some(v) = lookup("STRIDE_REDIS_URL") {
            self.redis_url = Some(v).filter(|url| !url.is_empty());
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dispatch.period_secs == 0 {
            return Err(ConfigError::Invalid("dispatch.period_secs must be > 0".into()));
        }
        if self.dispatch.lock_ttl_secs == 0 {
            return Err(ConfigError::Invalid("dispatch.lock_ttl_secs must be > 0".into()));
        }
        if self.dispatch.lock_name.is_empty() {
            return Err(ConfigError::Invalid("dispatch.lock_name must not be empty".into()));
        }
        if self.processor.item_lock && self.processor.item_lock_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "processor.item_lock_ttl_secs must be > 0".into(),
            ));
        }
        if self.retry.cap_secs < self.retry.base_secs {
            return Err(ConfigError::Invalid(
                "retry.cap_secs must be >= retry.base_secs".into(),
            ));
        }
        if self.worker.concurrency == 0 {
            return Err(ConfigError::Invalid("worker.concurrency must be > 0".into()));
        }
        Ok(())
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy::new(
            self.retry.max_attempts,
            Duration::from_secs(self.retry.base_secs),
            Duration::from_secs(self.retry.cap_secs),
        )
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            lock_name: self.dispatch.lock_name.clone(),
            lock_ttl: Duration::from_secs(self.dispatch.lock_ttl_secs),
        }
    }

    pub fn dispatch_period(&self) -> Duration {
        Duration::from_secs(self.dispatch.period_secs)
    }

    pub fn item_lock_ttl(&self) -> Duration {
        Duration::from_secs(self.processor.item_lock_ttl_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.worker.poll_timeout_ms)
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = StrideConfig::default();
        assert_eq!(config.dispatch_period(), Duration::from_secs(600));
        assert_eq!(config.dispatch_config(), DispatchConfig::default());
        assert_eq!(config.backoff_policy(), BackoffPolicy::default());
        assert!(!config.processor.item_lock);
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.redis_url, None);
        config.validate().unwrap();
    }

    #[test]
    fn partial_json_keeps_other_defaults() {
        let config =
            StrideConfig::from_json_str(r#"{ "retry": { "max_attempts": 5 }, "processor": { "item_lock": true } }"#)
                .unwrap();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_secs, 10);
        assert!(config.processor.item_lock);
        assert_eq!(config.dispatch.lock_name, "process_all_workouts");
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(
            StrideConfig::from_json_str("{ nope"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        assert!(matches!(
            StrideConfig::from_json_file("/definitely/not/here.json"),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = StrideConfig::default();
        config
            .apply_overrides(lookup(&[
                ("STRIDE_DISPATCH_PERIOD_SECS", "30"),
                ("STRIDE_MAX_ATTEMPTS", "0"),
                ("STRIDE_ITEM_LOCK", "true"),
                ("STRIDE_WORKER_CONCURRENCY", "8"),
                ("STRIDE_REDIS_URL", "redis://127.0.0.1/"),
            ]))
            .unwrap();

        assert_eq!(config.dispatch.period_secs, 30);
        assert_eq!(config.retry.max_attempts, 0);
        assert!(config.processor.item_lock);
        assert_eq!(config.worker.concurrency, 8);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1/"));
        // never retry is a valid setting
        config.validate().unwrap();
    }

    #[rstest]
    #[case("STRIDE_LOCK_TTL_SECS", "ten")]
    #[case("STRIDE_MAX_ATTEMPTS", "-1")]
    #[case("STRIDE_ITEM_LOCK", "maybe")]
    fn bad_env_value_is_rejected(#[case] key: &str, #[case] value: &str) {
        let mut config = StrideConfig::default();
        let err = config.apply_overrides(lookup(&[(key, value)])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key: k, .. } if k == key));
    }

    #[rstest]
    #[case(r#"{ "dispatch": { "period_secs": 0 } }"#)]
    #[case(r#"{ "dispatch": { "lock_ttl_secs": 0 } }"#)]
    #[case(r#"{ "retry": { "base_secs": 60, "cap_secs": 10 } }"#)]
    #[case(r#"{ "worker": { "concurrency": 0 } }"#)]
    fn validate_rejects(#[case] raw: &str) {
        let config = StrideConfig::from_json_str(raw).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
