//! Envelope encoding
//!
//! This module turns a [`VitalsSample`] into the canonical message forwarded
//! over the host channel. The payload is a flat JSON object with the keys
//! `heartRate, spo2, bpSystolic, bpDiastolic` in that order; absent
//! measurements stay in place as the sentinel so the consumer always sees the
//! same schema.

use crate::error::RelayError;
use crate::types::VitalsSample;
use serde::{Deserialize, Serialize};

/// Method name invoked on the host channel for every envelope
pub const LIVE_VITALS_METHOD: &str = "liveVitals";

/// Canonical serialized form of a [`VitalsSample`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Channel method the payload is delivered to
    pub method: String,
    /// Flat JSON object in fixed key order
    pub payload: String,
}

impl Envelope {
    /// Parse an envelope payload back into a sample.
    ///
    /// Strict: all four keys must be present as integers.
    pub fn decode(payload: &str) -> Result<VitalsSample, RelayError> {
        let sample: VitalsSample = serde_json::from_str(payload)?;
        Ok(sample)
    }

    /// Decode this envelope's own payload
    pub fn sample(&self) -> Result<VitalsSample, RelayError> {
        Self::decode(&self.payload)
    }
}

/// Encode a sample into an envelope for the `liveVitals` method.
///
/// Total and deterministic: the same sample always yields the same bytes.
pub fn encode(sample: &VitalsSample) -> Envelope {
    encode_for(sample, LIVE_VITALS_METHOD)
}

/// Encode a sample for a caller-chosen channel method
pub fn encode_for(sample: &VitalsSample, method: &str) -> Envelope {
    // Integers only, so the object is written directly instead of through a
    // fallible serializer.
    let payload = format!(
        "{{\"heartRate\":{},\"spo2\":{},\"bpSystolic\":{},\"bpDiastolic\":{}}}",
        sample.heart_rate, sample.spo2, sample.bp_systolic, sample.bp_diastolic
    );

    Envelope {
        method: method.to_string(),
        payload,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SENTINEL;

    #[test]
    fn test_encode_fixed_key_order() {
        let envelope = encode(&VitalsSample::new(72, 98, 120, 80));

        assert_eq!(envelope.method, "liveVitals");
        assert_eq!(
            envelope.payload,
            r#"{"heartRate":72,"spo2":98,"bpSystolic":120,"bpDiastolic":80}"#
        );
    }

    #[test]
    fn test_encode_keeps_sentinels() {
        let envelope = encode(&VitalsSample::new(64, SENTINEL, SENTINEL, 79));

        assert_eq!(
            envelope.payload,
            r#"{"heartRate":64,"spo2":-1,"bpSystolic":-1,"bpDiastolic":79}"#
        );
    }

    #[test]
    fn test_payload_is_valid_json() {
        let envelope = encode(&VitalsSample::new(i32::MIN, 0, i32::MAX, SENTINEL));
        let value: serde_json::Value = serde_json::from_str(&envelope.payload).unwrap();

        assert_eq!(value["heartRate"], i64::from(i32::MIN));
        assert_eq!(value["bpSystolic"], i64::from(i32::MAX));
        assert_eq!(value["bpDiastolic"], -1);
        assert_eq!(value.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_payload_matches_serde_form() {
        for sample in [
            VitalsSample::new(72, 98, 120, 80),
            VitalsSample::new(55, SENTINEL, 101, SENTINEL),
            VitalsSample::absent(),
        ] {
            assert_eq!(serde_json::to_string(&sample).unwrap(), encode(&sample).payload);
        }
    }

    #[test]
    fn test_decode_reads_back_sample() {
        let sample = VitalsSample::new(58, 97, 118, 76);
        let envelope = encode(&sample);

        assert_eq!(envelope.sample().unwrap(), sample);
    }

    #[test]
    fn test_decode_rejects_missing_key() {
        let result = Envelope::decode(r#"{"heartRate":72,"spo2":98,"bpSystolic":120}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_encode_for_custom_method() {
        let envelope = encode_for(&VitalsSample::absent(), "vitals");
        assert_eq!(envelope.method, "vitals");
        assert!(envelope.payload.contains("\"spo2\":-1"));
    }
}
