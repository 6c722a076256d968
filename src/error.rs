//! Error types for Synheart Relay
//!
//! None of these escape the relay path: the listener and the channel bridge
//! fold them into [`crate::relay::BatchReport`] and [`crate::channel::Delivery`].

use thiserror::Error;

/// Errors raised by the fallible edges of the relay
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Dispatch failed: {0}")]
    DispatchError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
