//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Work and break durations (minutes, fractional allowed)
//! - Notification preferences
//!
//! Configuration is stored at `~/.config/pomato/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::data_dir;
use crate::error::ConfigError;

/// Countdown durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Work period length in minutes.
    #[serde(default = "default_work_minutes")]
    pub work_minutes: f64,
    /// Break length in minutes.
    #[serde(default = "default_break_minutes")]
    pub break_minutes: f64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/pomato/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
}

// Default functions
fn default_work_minutes() -> f64 {
    20.0
}
fn default_break_minutes() -> f64 {
    5.0
}
fn default_true() -> bool {
    true
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            work_minutes: default_work_minutes(),
            break_minutes: default_break_minutes(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timer: TimerConfig::default(),
            notifications: NotificationsConfig::default(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if parts.peek().is_none() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            let is_leaf = parts.peek().is_none();
            if is_leaf {
                let obj = current.as_object_mut().ok_or_else(unknown)?;
                let existing = obj.get(part).ok_or_else(unknown)?;

                let new_value = match existing {
                    serde_json::Value::Bool(_) => serde_json::Value::Bool(
                        value
                            .parse::<bool>()
                            .map_err(|_| invalid(format!("'{value}' is not true or false")))?,
                    ),
                    serde_json::Value::Number(_) => {
                        let n = value
                            .parse::<f64>()
                            .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?;
                        serde_json::Number::from_f64(n)
                            .map(serde_json::Value::Number)
                            .ok_or_else(|| invalid(format!("'{value}' is not a finite number")))?
                    }
                    _ => serde_json::Value::String(value.into()),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current.get_mut(part).ok_or_else(unknown)?;
        }

        Err(unknown())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the default file first if none exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed or
    /// holds invalid values, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::path()?;
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| {
                    ConfigError::LoadFailed {
                        path,
                        message: e.to_string(),
                    }
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(_) => {
                let cfg = Self::default();
                cfg.save()?;
                Ok(cfg)
            }
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::path()?;
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed {
            path: path.clone(),
            message: e.to_string(),
        })?;
        std::fs::write(&path, content).map_err(|e| ConfigError::SaveFailed {
            path,
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Reject durations a countdown could not run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_minutes("timer.work_minutes", self.timer.work_minutes)?;
        validate_minutes("timer.break_minutes", self.timer.break_minutes)?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key, in memory only; callers
    /// decide when to `save()`. The updated config is validated as a whole
    /// before it replaces the old one.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown, the value cannot be parsed,
    /// or the resulting config is invalid.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        let mut json = serde_json::to_value(&*self).map_err(|e| invalid(e.to_string()))?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| invalid(e.to_string()))?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }
}

// A phase never spans more than a day.
const MAX_PHASE_MINUTES: f64 = 24.0 * 60.0;

fn validate_minutes(key: &str, minutes: f64) -> Result<(), ConfigError> {
    if !minutes.is_finite() || minutes <= 0.0 {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("{minutes} is not a positive number of minutes"),
        });
    }
    if minutes > MAX_PHASE_MINUTES {
        return Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!(
                "{minutes} exceeds the longest supported phase ({MAX_PHASE_MINUTES} minutes)"
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.timer.work_minutes, 20.0);
        assert_eq!(parsed.timer.break_minutes, 5.0);
        assert!(parsed.notifications.enabled);
    }

    #[test]
    fn empty_file_fills_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed, Config::default());
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.work_minutes").as_deref(), Some("20.0"));
        assert_eq!(cfg.get("notifications.enabled").as_deref(), Some("true"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_fractional_minutes() {
        let mut cfg = Config::default();
        cfg.set("timer.break_minutes", "2.5").unwrap();
        assert_eq!(cfg.timer.break_minutes, 2.5);
        cfg.set("timer.work_minutes", "15").unwrap();
        assert_eq!(cfg.timer.work_minutes, 15.0);
    }

    #[test]
    fn set_updates_bool() {
        let mut cfg = Config::default();
        cfg.set("notifications.enabled", "false").unwrap();
        assert!(!cfg.notifications.enabled);
        assert!(cfg.set("notifications.enabled", "maybe").is_err());
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(cfg.set("", "1").is_err());
    }

    #[test]
    fn set_rejects_nonpositive_durations() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.work_minutes", "0").is_err());
        assert!(cfg.set("timer.work_minutes", "-3").is_err());
        assert!(cfg.set("timer.work_minutes", "nan").is_err());
        // Rejected sets leave the config untouched.
        assert_eq!(cfg.timer.work_minutes, 20.0);
    }

    #[test]
    fn set_rejects_durations_beyond_a_day() {
        let mut cfg = Config::default();
        assert!(cfg.set("timer.work_minutes", "1e15").is_err());
        assert!(cfg.set("timer.break_minutes", "1441").is_err());
        assert_eq!(cfg, Config::default());
        assert!(cfg.set("timer.work_minutes", "1440").is_ok());
    }

    #[test]
    fn validate_accepts_fractional_minutes() {
        let cfg = Config {
            timer: TimerConfig {
                work_minutes: 0.05,
                break_minutes: 7.5,
            },
            notifications: NotificationsConfig::default(),
        };
        assert!(cfg.validate().is_ok());
    }
}
