//! Synheart Relay - Live wearable vitals into the host application
//!
//! The relay listens for data-layer change notifications from a companion
//! wearable, extracts heart rate, SpO2 and blood pressure, encodes them into a
//! fixed-schema envelope and forwards it over the host's method channel:
//! data layer → [`VitalsRelay`] → [`encoder::encode`] → [`ChannelBridge`] → host.
//!
//! Delivery is best-effort. Nothing is buffered while the channel is
//! unbound and no failure ever reaches the data layer.

pub mod channel;
pub mod config;
pub mod encoder;
pub mod error;
pub mod host;
pub mod relay;
pub mod schema;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use channel::{ChannelBridge, Delivery, MethodChannel, RecordingChannel, CHANNEL_NAME};
pub use config::RelayConfig;
pub use encoder::{encode, Envelope, LIVE_VITALS_METHOD};
pub use error::RelayError;
pub use host::{BinaryMessenger, EngineLifecycle, HostActivity};
pub use relay::{BatchReport, DataListener, VitalsRelay};
pub use types::{VitalsSample, SENTINEL};

// Schema exports
pub use schema::{ChangeKind, ChangeNotification, DataEventBuffer, DataMap, LIVE_VITALS_PATH};

/// Relay version
pub const RELAY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by diagnostics
pub const PRODUCER_NAME: &str = "synheart-relay";
