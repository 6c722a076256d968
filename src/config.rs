//! Relay configuration

use crate::channel::CHANNEL_NAME;
use crate::encoder::LIVE_VITALS_METHOD;
use crate::error::RelayError;
use crate::schema::LIVE_VITALS_PATH;
use serde::{Deserialize, Serialize};

/// Names shared by convention between the wearable, the relay, and the host
/// application. Every field falls back to its default when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Host channel the envelopes are delivered on
    pub channel_name: String,
    /// Method invoked on the channel
    pub method: String,
    /// Data item path the wearable publishes vitals under
    pub vitals_path: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            channel_name: CHANNEL_NAME.to_string(),
            method: LIVE_VITALS_METHOD.to_string(),
            vitals_path: LIVE_VITALS_PATH.to_string(),
        }
    }
}

impl RelayConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(json: &str) -> Result<Self, RelayError> {
        let config: RelayConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.channel_name.trim().is_empty() {
            return Err(RelayError::ConfigError("channel_name is empty".to_string()));
        }
        if self.method.trim().is_empty() {
            return Err(RelayError::ConfigError("method is empty".to_string()));
        }
        if !self.vitals_path.starts_with('/') {
            return Err(RelayError::ConfigError(format!(
                "vitals_path must start with '/', got {:?}",
                self.vitals_path
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.channel_name, "com.example.wearos/data");
        assert_eq!(config.method, "liveVitals");
        assert_eq!(config.vitals_path, "/live_vitals");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = RelayConfig::from_json(r#"{"vitals_path":"/vitals/live"}"#).unwrap();
        assert_eq!(config.vitals_path, "/vitals/live");
        assert_eq!(config.method, "liveVitals");
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(RelayConfig::from_json(r#"{"method":" "}"#).is_err());
        assert!(RelayConfig::from_json(r#"{"channel_name":""}"#).is_err());
        assert!(RelayConfig::from_json(r#"{"vitals_path":"live_vitals"}"#).is_err());
        assert!(RelayConfig::from_json("not json").is_err());
    }
}
