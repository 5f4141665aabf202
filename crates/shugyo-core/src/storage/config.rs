//! TOML-based application configuration.
//!
//! Stores user preferences:
//! - Practice/rest lengths and the rest accounting policy
//! - Sound and vibration preferences
//! - History tagging and calendar offset
//!
//! Configuration is stored at `~/.config/shugyo/config.toml`.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::ConfigError;
use crate::history::{display_offset, BodyPart, DEFAULT_UTC_OFFSET_HOURS};
use crate::timer::{ControllerConfig, RestAccounting, DEFAULT_GUARD_MS, MAX_GUARD_MS};

/// Timer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default = "default_practice_secs")]
    pub practice_secs: u64,
    #[serde(default = "default_rest_secs")]
    pub rest_secs: u64,
    #[serde(default = "default_guard_ms")]
    pub guard_ms: u64,
    #[serde(default)]
    pub rest_accounting: RestAccounting,
    /// Start the next session as soon as `session run` opens.
    #[serde(default)]
    pub auto_start: bool,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default = "default_true")]
    pub sound: bool,
    #[serde(default = "default_true")]
    pub vibrate: bool,
    #[serde(default = "default_50")]
    pub volume: u32,
}

/// History configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Tag attached to records written by finished sessions.
    #[serde(default)]
    pub body_part: BodyPart,
    /// Offset used to group records into calendar days.
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/shugyo/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub history: HistoryConfig,
}

fn default_practice_secs() -> u64 {
    60
}
fn default_rest_secs() -> u64 {
    30
}
fn default_guard_ms() -> u64 {
    DEFAULT_GUARD_MS
}
fn default_true() -> bool {
    true
}
fn default_50() -> u32 {
    50
}
fn default_utc_offset_hours() -> i32 {
    DEFAULT_UTC_OFFSET_HOURS
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            practice_secs: default_practice_secs(),
            rest_secs: default_rest_secs(),
            guard_ms: default_guard_ms(),
            rest_accounting: RestAccounting::default(),
            auto_start: false,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            sound: true,
            vibrate: true,
            volume: default_50(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            body_part: BodyPart::default(),
            utc_offset_hours: default_utc_offset_hours(),
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

        let (parent, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };
        if leaf.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        if let Some(parent) = parent {
            for part in parent.split('.') {
                current = current.get_mut(part).ok_or_else(unknown)?;
            }
        }
        let obj = current.as_object_mut().ok_or_else(unknown)?;
        let existing = obj.get(leaf).ok_or_else(unknown)?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => {
                if let Ok(n) = value.parse::<u64>() {
                    serde_json::Value::Number(n.into())
                } else if let Ok(n) = value.parse::<i64>() {
                    serde_json::Value::Number(n.into())
                } else {
                    return Err(invalid(format!("cannot parse '{value}' as integer")));
                }
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    /// Path of the config file inside the data directory.
    ///
    /// # Errors
    /// Returns an error if the data directory cannot be created.
    pub fn path() -> Result<PathBuf, ConfigError> {
        let dir = data_dir().map_err(|e| ConfigError::LoadFailed {
            path: PathBuf::from("~/.config/shugyo"),
            message: e.to_string(),
        })?;
        Ok(dir.join("config.toml"))
    }

    /// Load from disk, writing defaults if the file does not exist yet.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed or fails
    /// validation, or if the default config cannot be written.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// [`Config::load`] against an explicit path.
    ///
    /// # Errors
    /// See [`Config::load`].
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseFailed(e.to_string()))?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Persist to disk.
    ///
    /// # Errors
    /// Returns an error if the config cannot be serialized or written.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    /// # Errors
    /// See [`Config::save`].
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
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

    /// Set a value by dot-separated key without saving.
    ///
    /// Nothing changes if the key is unknown or the result fails validation.
    ///
    /// # Errors
    /// [`ConfigError::UnknownKey`] or [`ConfigError::InvalidValue`].
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
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

    /// Set a value by key and save.
    ///
    /// # Errors
    /// See [`Config::apply`] and [`Config::save`].
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        self.apply(key, value)?;
        self.save()
    }

    /// Restore defaults and save.
    ///
    /// # Errors
    /// See [`Config::save`].
    pub fn reset(&mut self) -> Result<(), ConfigError> {
        *self = Self::default();
        self.save()
    }

    /// Flattened `(key, value)` pairs for every leaf setting.
    pub fn entries(&self) -> Vec<(String, String)> {
        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            collect_entries(&json, String::new(), &mut out);
        }
        out
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// [`ConfigError::InvalidValue`] naming the first offending key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |key: &str, message: &str| -> Result<(), ConfigError> {
            Err(ConfigError::InvalidValue {
                key: key.to_string(),
                message: message.to_string(),
            })
        };
        if self.timer.practice_secs == 0 {
            return invalid("timer.practice_secs", "must be at least 1 second");
        }
        if self.timer.rest_secs == 0 {
            return invalid("timer.rest_secs", "must be at least 1 second");
        }
        if self.timer.guard_ms > MAX_GUARD_MS {
            return invalid("timer.guard_ms", "must be below 1000 (one second)");
        }
        if self.notifications.volume > 100 {
            return invalid("notifications.volume", "must be between 0 and 100");
        }
        if !(-12..=14).contains(&self.history.utc_offset_hours) {
            return invalid("history.utc_offset_hours", "must be between -12 and 14");
        }
        Ok(())
    }

    /// Controller settings derived from this config.
    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            practice_secs: self.timer.practice_secs,
            rest_secs: self.timer.rest_secs,
            guard_ms: self.timer.guard_ms,
            rest_accounting: self.timer.rest_accounting,
            body_part: self.history.body_part,
        }
    }

    /// Calendar offset for history statistics.
    pub fn display_offset(&self) -> chrono::FixedOffset {
        display_offset(self.history.utc_offset_hours)
    }
}

fn collect_entries(value: &serde_json::Value, prefix: String, out: &mut Vec<(String, String)>) {
    match value {
        serde_json::Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{prefix}.{k}")
                };
                collect_entries(v, key, out);
            }
        }
        serde_json::Value::String(s) => out.push((prefix, s.clone())),
        other => out.push((prefix, other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_default_values() {
        let cfg = Config::default();
        assert_eq!(cfg.timer.practice_secs, 60);
        assert_eq!(cfg.timer.rest_secs, 30);
        assert_eq!(cfg.timer.guard_ms, 150);
        assert_eq!(cfg.timer.rest_accounting, RestAccounting::CompletedRests);
        assert!(!cfg.timer.auto_start);
        assert!(cfg.notifications.sound);
        assert!(cfg.notifications.vibrate);
        assert_eq!(cfg.history.body_part, BodyPart::Chest);
        assert_eq!(cfg.history.utc_offset_hours, 9);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let cfg: Config = toml::from_str("[timer]\npractice_secs = 120\n").unwrap();
        assert_eq!(cfg.timer.practice_secs, 120);
        assert_eq!(cfg.timer.rest_secs, 30);
        assert_eq!(cfg.notifications.volume, 50);
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.practice_secs").as_deref(), Some("60"));
        assert_eq!(cfg.get("notifications.sound").as_deref(), Some("true"));
        assert_eq!(cfg.get("history.body_part").as_deref(), Some("chest"));
        assert_eq!(
            cfg.get("timer.rest_accounting").as_deref(),
            Some("completed_rests")
        );
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn apply_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.apply("timer.rest_secs", "45").unwrap();
        cfg.apply("notifications.vibrate", "false").unwrap();
        cfg.apply("history.body_part", "leg").unwrap();
        cfg.apply("history.utc_offset_hours", "-5").unwrap();
        cfg.apply("timer.rest_accounting", "preceding_cycles").unwrap();
        assert_eq!(cfg.timer.rest_secs, 45);
        assert!(!cfg.notifications.vibrate);
        assert_eq!(cfg.history.body_part, BodyPart::Leg);
        assert_eq!(cfg.history.utc_offset_hours, -5);
        assert_eq!(cfg.timer.rest_accounting, RestAccounting::PrecedingCycles);
    }

    #[test]
    fn apply_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(
            cfg.apply("nosection.key", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn apply_rejects_invalid_values_without_changes() {
        let mut cfg = Config::default();
        assert!(cfg.apply("notifications.sound", "loud").is_err());
        assert!(cfg.apply("timer.practice_secs", "0").is_err());
        assert!(cfg.apply("timer.practice_secs", "1.5").is_err());
        assert!(cfg.apply("history.body_part", "tail").is_err());
        assert!(cfg.apply("history.utc_offset_hours", "20").is_err());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn guard_window_must_close_within_one_second() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.apply("timer.guard_ms", "2000"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.apply("timer.guard_ms", "1000").is_err());
        cfg.apply("timer.guard_ms", "999").unwrap();
        assert_eq!(cfg.controller_config().guard_ms, 999);
    }

    #[test]
    fn controller_config_follows_settings() {
        let mut cfg = Config::default();
        cfg.apply("timer.practice_secs", "90").unwrap();
        cfg.apply("history.body_part", "back").unwrap();
        let cc = cfg.controller_config();
        assert_eq!(cc.practice_secs, 90);
        assert_eq!(cc.rest_secs, 30);
        assert_eq!(cc.body_part, BodyPart::Back);
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut edited = cfg.clone();
        edited.apply("timer.rest_secs", "20").unwrap();
        edited.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timer.rest_secs, 20);
    }

    #[test]
    fn load_from_rejects_out_of_range_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[timer]\nrest_secs = 0\n").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn entries_lists_every_leaf() {
        let entries = Config::default().entries();
        assert!(entries
            .iter()
            .any(|(k, v)| k == "timer.guard_ms" && v == "150"));
        assert!(entries.iter().any(|(k, _)| k == "history.utc_offset_hours"));
    }
}
