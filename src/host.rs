//! Host engine lifecycle
//!
//! The host engine calls [`EngineLifecycle::configure_engine`] once per
//! engine (re)creation. That is the only place the bridge is rebound.

use crate::channel::{ChannelBridge, MethodChannel};
use crate::config::RelayConfig;
use crate::error::RelayError;
use std::sync::Arc;

/// Transport the host engine exposes for platform-to-application messages
pub trait BinaryMessenger: Send + Sync {
    fn send(&self, channel: &str, method: &str, payload: &str) -> Result<(), RelayError>;
}

/// Channel addressed by name over an engine's messenger
pub struct NamedChannel {
    name: String,
    messenger: Arc<dyn BinaryMessenger>,
}

impl NamedChannel {
    pub fn new(name: &str, messenger: Arc<dyn BinaryMessenger>) -> Self {
        Self {
            name: name.to_string(),
            messenger,
        }
    }
}

impl MethodChannel for NamedChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke_method(&self, method: &str, payload: &str) -> Result<(), RelayError> {
        self.messenger.send(&self.name, method, payload)
    }
}

/// Hook the host runtime calls whenever it configures a fresh engine
pub trait EngineLifecycle {
    fn configure_engine(&self, messenger: Arc<dyn BinaryMessenger>);
}

/// Host-side owner of the bridge binding
#[derive(Debug, Clone)]
pub struct HostActivity {
    bridge: Arc<ChannelBridge>,
    channel_name: String,
}

impl HostActivity {
    pub fn new(bridge: Arc<ChannelBridge>) -> Self {
        Self::with_config(bridge, &RelayConfig::default())
    }

    pub fn with_config(bridge: Arc<ChannelBridge>, config: &RelayConfig) -> Self {
        Self {
            bridge,
            channel_name: config.channel_name.clone(),
        }
    }

    /// Activity bound to the process-wide bridge
    pub fn shared() -> Self {
        Self::new(ChannelBridge::shared())
    }
}

impl EngineLifecycle for HostActivity {
    fn configure_engine(&self, messenger: Arc<dyn BinaryMessenger>) {
        let channel = NamedChannel::new(&self.channel_name, messenger);
        self.bridge.rebind(Arc::new(channel));
    }
}
