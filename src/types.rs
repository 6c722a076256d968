//! Core types for the vitals relay
//!
//! A [`VitalsSample`] is the value that flows from the data-layer listener
//! through the encoder to the host channel.

use serde::{Deserialize, Serialize};

/// Reserved value for a measurement that is absent or unreadable
pub const SENTINEL: i32 = -1;

/// Attribute keys read from a live vitals data item, in envelope order
pub const HEART_RATE_KEY: &str = "heartRate";
pub const SPO2_KEY: &str = "spo2";
pub const BP_SYSTOLIC_KEY: &str = "bpSystolic";
pub const BP_DIASTOLIC_KEY: &str = "bpDiastolic";

/// One measurement snapshot from the wearable
///
/// Every field is either a measured value or [`SENTINEL`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VitalsSample {
    /// Beats per minute
    pub heart_rate: i32,
    /// Oxygen saturation (percent)
    pub spo2: i32,
    /// Systolic blood pressure (mmHg)
    pub bp_systolic: i32,
    /// Diastolic blood pressure (mmHg)
    pub bp_diastolic: i32,
}

impl Default for VitalsSample {
    fn default() -> Self {
        Self::absent()
    }
}

impl VitalsSample {
    pub fn new(heart_rate: i32, spo2: i32, bp_systolic: i32, bp_diastolic: i32) -> Self {
        Self {
            heart_rate,
            spo2,
            bp_systolic,
            bp_diastolic,
        }
    }

    /// A sample with every field set to the sentinel
    pub fn absent() -> Self {
        Self::new(SENTINEL, SENTINEL, SENTINEL, SENTINEL)
    }
}
