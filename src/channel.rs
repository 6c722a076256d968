//! Channel bridge
//!
//! The bridge holds the outbound channel the host engine most recently
//! configured. The data-layer listener may start before the engine exists, so
//! a send while nothing is bound is a silent no-op, and a dispatch failure is
//! folded into [`Delivery::Dropped`]. Vitals are periodic: the next sample
//! supersedes a dropped one.

use crate::encoder::Envelope;
use crate::error::RelayError;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Well-known name of the host channel live vitals are delivered on
pub const CHANNEL_NAME: &str = "com.example.wearos/data";

/// A named outbound pipe into the host application layer
pub trait MethodChannel: Send + Sync {
    /// Channel name, for diagnostics
    fn name(&self) -> &str;

    /// Deliver `payload` to `method` on the far side
    fn invoke_method(&self, method: &str, payload: &str) -> Result<(), RelayError>;
}

/// Outcome of a best-effort send
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// Handed to the bound channel
    Dispatched,
    /// No channel bound; nothing happened
    Unbound,
    /// The bound channel refused or failed the dispatch
    Dropped,
}

static SHARED: Lazy<Arc<ChannelBridge>> = Lazy::new(|| Arc::new(ChannelBridge::new()));

/// Holder of the current outbound channel reference
///
/// `send` and `rebind` each take the lock for a single read or write; the
/// dispatch itself runs outside the lock.
pub struct ChannelBridge {
    current: RwLock<Option<Arc<dyn MethodChannel>>>,
}

impl Default for ChannelBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ChannelBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = self.current.read().as_ref().map(|c| c.name().to_string());
        f.debug_struct("ChannelBridge").field("bound", &bound).finish()
    }
}

impl ChannelBridge {
    /// Create an unbound bridge
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// The process-wide bridge shared by the listener and the engine hook
    pub fn shared() -> Arc<ChannelBridge> {
        Arc::clone(&SHARED)
    }

    /// Replace the current channel. Last writer wins.
    pub fn rebind(&self, channel: Arc<dyn MethodChannel>) {
        debug!(channel = channel.name(), "rebinding host channel");
        *self.current.write() = Some(channel);
    }

    pub fn is_bound(&self) -> bool {
        self.current.read().is_some()
    }

    /// Dispatch `envelope` to the bound channel, if any. Never fails.
    pub fn send(&self, envelope: &Envelope) -> Delivery {
        let channel = self.current.read().clone();
        let Some(channel) = channel else {
            return Delivery::Unbound;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            channel.invoke_method(&envelope.method, &envelope.payload)
        }));

        match outcome {
            Ok(Ok(())) => Delivery::Dispatched,
            Ok(Err(_)) | Err(_) => Delivery::Dropped,
        }
    }
}

/// One dispatch observed by a [`RecordingChannel`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    pub channel: String,
    pub method: String,
    pub payload: String,
    pub dispatched_at: DateTime<Utc>,
}

/// In-process channel that keeps every dispatch it accepts
#[derive(Debug)]
pub struct RecordingChannel {
    name: String,
    dispatches: Mutex<Vec<Dispatch>>,
    failing: AtomicBool,
}

impl Default for RecordingChannel {
    fn default() -> Self {
        Self::new(CHANNEL_NAME)
    }
}

impl RecordingChannel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            dispatches: Mutex::new(Vec::new()),
            failing: AtomicBool::new(false),
        }
    }

    /// Make subsequent dispatches fail, as a channel whose remote end is not
    /// ready yet would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.dispatches.lock().clone()
    }

    /// Payloads in dispatch order
    pub fn payloads(&self) -> Vec<String> {
        self.dispatches
            .lock()
            .iter()
            .map(|d| d.payload.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.dispatches.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatches.lock().is_empty()
    }
}

impl MethodChannel for RecordingChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke_method(&self, method: &str, payload: &str) -> Result<(), RelayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(RelayError::ChannelUnavailable(format!(
                "{} has no listener",
                self.name
            )));
        }

        self.dispatches.lock().push(Dispatch {
            channel: self.name.clone(),
            method: method.to_string(),
            payload: payload.to_string(),
            dispatched_at: Utc::now(),
        });
        Ok(())
    }
}
