//! Configuration for the filter engine and subscription registry.

use crate::compile::TimestampType;
use serde::de::Error;

/// Registry and compiler settings.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Notifications buffered per topic before slow receivers start lagging.
    #[serde(default = "Config::default_notification_buffer")]
    pub notification_buffer: usize,

    /// Declared type of timestamp columns, selecting the SQL cast.
    #[serde(default)]
    pub timestamp_type: TimestampType,

    /// Re-check filters that need relational context against the store.
    #[serde(default = "Config::default_store_fallback")]
    pub store_fallback: bool,
}

impl Config {
    const fn default_notification_buffer() -> usize {
        256
    }

    const fn default_store_fallback() -> bool {
        true
    }

    pub fn with_notification_buffer(mut self, capacity: usize) -> Self {
        assert!(capacity > 0, "Notification buffer must be greater than zero");

        if capacity > 65_536 {
            log::warn!(
                "Notification buffer of {} is very large; every topic keeps up to that many \
                payloads for its slowest receiver.",
                capacity
            );
        }

        self.notification_buffer = capacity;
        self
    }

    pub fn with_timestamp_type(mut self, timestamp_type: TimestampType) -> Self {
        self.timestamp_type = timestamp_type;
        self
    }

    pub fn with_store_fallback(mut self, enabled: bool) -> Self {
        self.store_fallback = enabled;
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.notification_buffer == 0 {
            return Err("Notification buffer must be greater than zero".to_string());
        }
        Ok(())
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let config: Config = serde_json::from_str(json)?;
        if let Err(e) = config.validate() {
            return Err(Error::custom(e));
        }
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    #[cfg(feature = "toml")]
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let config: Config = toml::from_str(toml_str)?;
        if let Err(e) = config.validate() {
            return Err(toml::de::Error::custom(e));
        }
        Ok(config)
    }

    #[cfg(feature = "toml")]
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            notification_buffer: Self::default_notification_buffer(),
            timestamp_type: TimestampType::default(),
            store_fallback: Self::default_store_fallback(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.notification_buffer, 256);
        assert_eq!(config.timestamp_type, TimestampType::WithTimeZone);
        assert!(config.store_fallback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default()
            .with_notification_buffer(16)
            .with_timestamp_type(TimestampType::WithoutTimeZone);
        let json = config.to_json().unwrap();
        assert!(json.contains("\"without_time_zone\""));
        let back = Config::from_json(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_config_partial_json_uses_defaults() {
        let config = Config::from_json(r#"{"store_fallback": false}"#).unwrap();
        assert!(!config.store_fallback);
        assert_eq!(config.notification_buffer, 256);
    }

    #[test]
    fn test_config_validation() {
        assert!(Config::from_json(r#"{"notification_buffer": 0}"#).is_err());
        assert!(Config::from_json(r#"{"unknown": 1}"#).is_err());
    }

    #[test]
    #[should_panic(expected = "Notification buffer must be greater than zero")]
    fn test_zero_buffer_panics() {
        let _ = Config::default().with_notification_buffer(0);
    }

    #[cfg(feature = "toml")]
    #[test]
    fn test_config_toml() {
        let config = Config::from_toml("notification_buffer = 8\ntimestamp_type = \"with_time_zone\"\n")
            .unwrap();
        assert_eq!(config.notification_buffer, 8);
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_toml(&text).unwrap(), config);
    }
}
