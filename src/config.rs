use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::info;

use crate::error::ConfigError;

pub const DEFAULT_PERSPECTIVE_URL: &str =
    "https://commentanalyzer.googleapis.com/v1alpha1/comments:analyze";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_address: String,
    pub moderation: ModerationConfig,
}

#[derive(Debug, Clone)]
pub struct ModerationConfig {
    pub api_url: String,
    pub api_key: Option<String>,
    /// Scores strictly above this value are rejected.
    pub threshold: f64,
    pub timeout: Duration,
    /// Reject fields whose classification failed instead of letting them through.
    pub fail_closed: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_PERSPECTIVE_URL.to_string(),
            api_key: None,
            threshold: 0.7,
            timeout: Duration::from_secs(10),
            fail_closed: false,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = ModerationConfig::default();

        let threshold: f64 = try_load(&lookup, "TOXICITY_THRESHOLD", defaults.threshold)?;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(ConfigError::Invalid {
                key: "TOXICITY_THRESHOLD",
                reason: format!("{} is outside [0, 1]", threshold),
            });
        }

        let timeout_secs: u64 = try_load(&lookup, "MODERATION_TIMEOUT_SECS", defaults.timeout.as_secs())?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "MODERATION_TIMEOUT_SECS",
                reason: "timeout must be at least one second".to_string(),
            });
        }

        let api_key = lookup("PERSPECTIVE_API_KEY").filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            info!("PERSPECTIVE_API_KEY not set, classifier calls will fail and moderation falls back to its failure policy");
        }

        Ok(Self {
            database_url: try_load(&lookup, "DATABASE_URL", "sqlite:weigh_in.db".to_string())?,
            db_max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            bind_address: try_load(&lookup, "BIND_ADDRESS", "0.0.0.0:5001".to_string())?,
            moderation: ModerationConfig {
                api_url: try_load(&lookup, "PERSPECTIVE_URL", defaults.api_url)?,
                api_key,
                threshold,
                timeout: Duration::from_secs(timeout_secs),
                fail_closed: try_load(&lookup, "MODERATION_FAIL_CLOSED", defaults.fail_closed)?,
            },
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => {
            info!("{} not set, using default: {}", key, default);
            Ok(default)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.database_url, "sqlite:weigh_in.db");
        assert_eq!(config.bind_address, "0.0.0.0:5001");
        assert_eq!(config.moderation.threshold, 0.7);
        assert_eq!(config.moderation.timeout, Duration::from_secs(10));
        assert!(!config.moderation.fail_closed);
        assert!(config.moderation.api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("TOXICITY_THRESHOLD", "0.5"),
            ("MODERATION_FAIL_CLOSED", "true"),
            ("PERSPECTIVE_API_KEY", "secret"),
            ("MODERATION_TIMEOUT_SECS", "3"),
        ])
        .unwrap();
        assert_eq!(config.moderation.threshold, 0.5);
        assert!(config.moderation.fail_closed);
        assert_eq!(config.moderation.api_key.as_deref(), Some("secret"));
        assert_eq!(config.moderation.timeout, Duration::from_secs(3));
    }

    #[test]
    fn threshold_outside_unit_interval_is_rejected() {
        let err = load(&[("TOXICITY_THRESHOLD", "1.5")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "TOXICITY_THRESHOLD", .. }));
    }

    #[test]
    fn unparsable_value_is_rejected() {
        let err = load(&[("MODERATION_FAIL_CLOSED", "maybe")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "MODERATION_FAIL_CLOSED", .. }));
    }
}
