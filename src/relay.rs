//! Vitals relay
//!
//! The data-layer listener. For every batch it:
//! 1. Skips notifications that are not a change to the vitals path
//! 2. Reads the four vitals attributes, falling back to the sentinel
//! 3. Encodes the sample and hands the envelope to the channel bridge
//!
//! Nothing escapes `on_data_changed`: element errors skip the element, a
//! panic ends the batch early, and the batch is released exactly once on
//! every path.

use crate::channel::{ChannelBridge, Delivery};
use crate::config::RelayConfig;
use crate::encoder::{encode_for, Envelope};
use crate::schema::{ChangeNotification, DataEventBuffer};
use crate::types::{
    VitalsSample, BP_DIASTOLIC_KEY, BP_SYSTOLIC_KEY, HEART_RATE_KEY, SENTINEL, SPO2_KEY,
};
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Entry point the data-layer runtime calls with each batch
pub trait DataListener {
    fn on_data_changed(&self, buffer: &mut dyn DataEventBuffer) -> BatchReport;
}

/// What happened to one batch
///
/// Purely observational; the relay has no failure result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Elements in the batch
    pub received: usize,
    /// Wrong kind or wrong path
    pub ignored: usize,
    /// Elements that failed to materialize
    pub undecodable: usize,
    /// Envelopes handed to the bridge
    pub forwarded: usize,
    /// Envelopes the bound channel accepted
    pub dispatched: usize,
    /// Envelopes sent while no channel was bound
    pub unbound: usize,
    /// Envelopes the bound channel failed
    pub dropped: usize,
    /// False when processing was cut short by a panic
    pub completed: bool,
}

impl BatchReport {
    fn record(&mut self, delivery: Delivery) {
        self.forwarded += 1;
        match delivery {
            Delivery::Dispatched => self.dispatched += 1,
            Delivery::Unbound => self.unbound += 1,
            Delivery::Dropped => self.dropped += 1,
        }
    }
}

/// Releases the batch when dropped
struct ReleaseGuard<'a> {
    buffer: &'a mut dyn DataEventBuffer,
}

impl Drop for ReleaseGuard<'_> {
    fn drop(&mut self) {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.buffer.release()));
        if outcome.is_err() {
            warn!("notification batch release panicked");
        }
    }
}

/// Listener that forwards live vitals to the host channel
#[derive(Debug, Clone)]
pub struct VitalsRelay {
    bridge: Arc<ChannelBridge>,
    config: RelayConfig,
}

impl VitalsRelay {
    pub fn new(bridge: Arc<ChannelBridge>) -> Self {
        Self::with_config(bridge, RelayConfig::default())
    }

    pub fn with_config(bridge: Arc<ChannelBridge>, config: RelayConfig) -> Self {
        Self { bridge, config }
    }

    /// Relay bound to the process-wide bridge
    pub fn shared() -> Self {
        Self::new(ChannelBridge::shared())
    }

    /// Sample carried by `notification`, or `None` if it is not a change to
    /// the vitals path.
    pub fn decode(&self, notification: &ChangeNotification) -> Option<VitalsSample> {
        if !notification.is_change_to(&self.config.vitals_path) {
            return None;
        }

        let attrs = &notification.attributes;
        Some(VitalsSample {
            heart_rate: attrs.get_int(HEART_RATE_KEY, SENTINEL),
            spo2: attrs.get_int(SPO2_KEY, SENTINEL),
            bp_systolic: attrs.get_int(BP_SYSTOLIC_KEY, SENTINEL),
            bp_diastolic: attrs.get_int(BP_DIASTOLIC_KEY, SENTINEL),
        })
    }

    /// Encode the sample for the configured method
    pub fn envelope(&self, sample: &VitalsSample) -> Envelope {
        encode_for(sample, &self.config.method)
    }

    /// Forward a single notification. `None` when it was ignored.
    pub fn forward(&self, notification: &ChangeNotification) -> Option<Delivery> {
        let sample = self.decode(notification)?;
        Some(self.bridge.send(&self.envelope(&sample)))
    }

    fn process(&self, buffer: &dyn DataEventBuffer, report: &mut BatchReport) {
        report.received = buffer.len();

        for index in 0..report.received {
            let notification = match buffer.get(index) {
                Ok(n) => n,
                Err(e) => {
                    debug!(index, error = %e, "skipping undecodable notification");
                    report.undecodable += 1;
                    continue;
                }
            };

            match self.forward(&notification) {
                Some(delivery) => report.record(delivery),
                None => report.ignored += 1,
            }
        }
    }
}

impl DataListener for VitalsRelay {
    fn on_data_changed(&self, buffer: &mut dyn DataEventBuffer) -> BatchReport {
        let guard = ReleaseGuard { buffer };
        let mut report = BatchReport::default();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.process(&*guard.buffer, &mut report)
        }));
        report.completed = outcome.is_ok();
        if !report.completed {
            warn!(
                forwarded = report.forwarded,
                "notification batch aborted by panic"
            );
        }

        drop(guard);
        trace!(?report, "notification batch released");
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RecordingChannel;
    use crate::error::RelayError;
    use crate::schema::{ChangeKind, DataMap, JsonEventBuffer, VecEventBuffer};
    use pretty_assertions::assert_eq;

    fn vitals(hr: i32, spo2: i32, sys: i32, dia: i32) -> ChangeNotification {
        ChangeNotification::new(
            "/live_vitals",
            ChangeKind::Changed,
            DataMap::new()
                .with("heartRate", hr)
                .with("spo2", spo2)
                .with("bpSystolic", sys)
                .with("bpDiastolic", dia),
        )
    }

    fn bound_relay() -> (VitalsRelay, Arc<RecordingChannel>) {
        let bridge = Arc::new(ChannelBridge::new());
        let channel = Arc::new(RecordingChannel::default());
        bridge.rebind(channel.clone());
        (VitalsRelay::new(bridge), channel)
    }

    /// Buffer whose second element panics on access
    struct PanickingBuffer {
        releases: usize,
    }

    impl DataEventBuffer for PanickingBuffer {
        fn len(&self) -> usize {
            3
        }

        fn get(&self, index: usize) -> Result<ChangeNotification, RelayError> {
            if index == 1 {
                panic!("data item vanished");
            }
            Ok(vitals(70, 97, 115, 75))
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    /// Buffer whose release panics after recording the attempt
    struct PanickingReleaseBuffer {
        inner: VecEventBuffer,
        release_attempts: usize,
    }

    impl DataEventBuffer for PanickingReleaseBuffer {
        fn len(&self) -> usize {
            self.inner.len()
        }

        fn get(&self, index: usize) -> Result<ChangeNotification, RelayError> {
            self.inner.get(index)
        }

        fn release(&mut self) {
            self.release_attempts += 1;
            panic!("data layer already closed the batch");
        }
    }

    #[test]
    fn test_forwards_live_vitals() {
        let (relay, channel) = bound_relay();
        let mut buffer = VecEventBuffer::from(vec![vitals(72, 98, 120, 80)]);

        let report = relay.on_data_changed(&mut buffer);

        let dispatches = channel.dispatches();
        assert_eq!(dispatches.len(), 1);
        assert_eq!(dispatches[0].method, "liveVitals");
        assert_eq!(
            dispatches[0].payload,
            r#"{"heartRate":72,"spo2":98,"bpSystolic":120,"bpDiastolic":80}"#
        );
        assert_eq!(report.forwarded, 1);
        assert_eq!(report.dispatched, 1);
        assert!(report.completed);
        assert_eq!(buffer.release_count(), 1);
    }

    #[test]
    fn test_missing_attributes_become_sentinel() {
        let (relay, channel) = bound_relay();
        let notification = ChangeNotification::new(
            "/live_vitals",
            ChangeKind::Changed,
            DataMap::new().with("heartRate", 81).with("spo2", "n/a"),
        );
        let mut buffer = VecEventBuffer::from(vec![notification]);

        relay.on_data_changed(&mut buffer);

        assert_eq!(
            channel.payloads(),
            vec![r#"{"heartRate":81,"spo2":-1,"bpSystolic":-1,"bpDiastolic":-1}"#.to_string()]
        );
    }

    #[test]
    fn test_ignores_other_paths_and_kinds() {
        let (relay, channel) = bound_relay();
        let mut deleted = vitals(72, 98, 120, 80);
        deleted.kind = ChangeKind::Deleted;
        let mut other_kind = vitals(72, 98, 120, 80);
        other_kind.kind = ChangeKind::Other;
        let mut other_path = vitals(72, 98, 120, 80);
        other_path.path = "/step_count".to_string();

        let mut buffer = VecEventBuffer::from(vec![deleted, other_kind, other_path]);
        let report = relay.on_data_changed(&mut buffer);

        assert!(channel.is_empty());
        assert_eq!(
            report,
            BatchReport {
                received: 3,
                ignored: 3,
                completed: true,
                ..BatchReport::default()
            }
        );
        assert_eq!(buffer.release_count(), 1);
    }

    #[test]
    fn test_malformed_element_is_skipped_and_batch_released_once() {
        let (relay, channel) = bound_relay();
        let ndjson = r#"{"path":"/live_vitals","kind":"changed","attributes":{"heartRate":72,"spo2":98,"bpSystolic":120,"bpDiastolic":80}}
{"path":"/live_vitals","kind":"changed","attributes":"corrupt"}
{"path":"/live_vitals","kind":"changed","attributes":{"heartRate":75,"spo2":96,"bpSystolic":118,"bpDiastolic":79}}"#;
        let mut buffer = JsonEventBuffer::from_ndjson(ndjson);

        let report = relay.on_data_changed(&mut buffer);

        assert_eq!(
            channel.payloads(),
            vec![
                r#"{"heartRate":72,"spo2":98,"bpSystolic":120,"bpDiastolic":80}"#.to_string(),
                r#"{"heartRate":75,"spo2":96,"bpSystolic":118,"bpDiastolic":79}"#.to_string(),
            ]
        );
        assert_eq!(report.undecodable, 1);
        assert_eq!(report.forwarded, 2);
        assert_eq!(buffer.release_count(), 1);
    }

    #[test]
    fn test_panic_is_contained_and_batch_released() {
        let (relay, channel) = bound_relay();
        let mut buffer = PanickingBuffer { releases: 0 };

        let report = relay.on_data_changed(&mut buffer);

        assert!(!report.completed);
        assert_eq!(report.forwarded, 1);
        assert_eq!(channel.len(), 1);
        assert_eq!(buffer.releases, 1);
    }

    #[test]
    fn test_panicking_release_is_contained() {
        let (relay, channel) = bound_relay();
        let mut buffer = PanickingReleaseBuffer {
            inner: VecEventBuffer::from(vec![vitals(72, 98, 120, 80)]),
            release_attempts: 0,
        };

        let outcome =
            panic::catch_unwind(AssertUnwindSafe(|| relay.on_data_changed(&mut buffer)));

        let report = outcome.expect("release panic reached the caller");
        assert!(report.completed);
        assert_eq!(report.dispatched, 1);
        assert_eq!(channel.len(), 1);
        assert_eq!(buffer.release_attempts, 1);
    }

    #[test]
    fn test_unbound_bridge_drops_silently() {
        let relay = VitalsRelay::new(Arc::new(ChannelBridge::new()));
        let mut buffer = VecEventBuffer::from(vec![vitals(72, 98, 120, 80)]);

        let report = relay.on_data_changed(&mut buffer);

        assert_eq!(report.forwarded, 1);
        assert_eq!(report.unbound, 1);
        assert!(report.completed);
        assert_eq!(buffer.release_count(), 1);
    }

    #[test]
    fn test_failing_channel_counts_dropped() {
        let (relay, channel) = bound_relay();
        channel.set_failing(true);
        let mut buffer =
            VecEventBuffer::from(vec![vitals(72, 98, 120, 80), vitals(73, 98, 121, 81)]);

        let report = relay.on_data_changed(&mut buffer);

        assert_eq!(report.dropped, 2);
        assert!(report.completed);
    }

    #[test]
    fn test_batch_order_is_preserved() {
        let (relay, channel) = bound_relay();
        let mut buffer = VecEventBuffer::from(
            (60..65)
                .map(|hr| vitals(hr, 98, 120, 80))
                .collect::<Vec<_>>(),
        );

        relay.on_data_changed(&mut buffer);

        let rates: Vec<i32> = channel
            .dispatches()
            .iter()
            .map(|d| Envelope::decode(&d.payload).unwrap().heart_rate)
            .collect();
        assert_eq!(rates, vec![60, 61, 62, 63, 64]);
    }

    #[test]
    fn test_empty_batch_still_released() {
        let (relay, _channel) = bound_relay();
        let mut buffer = VecEventBuffer::new();

        let report = relay.on_data_changed(&mut buffer);

        assert_eq!(report.received, 0);
        assert_eq!(buffer.release_count(), 1);
    }

    #[test]
    fn test_custom_vitals_path() {
        let bridge = Arc::new(ChannelBridge::new());
        let config = RelayConfig {
            vitals_path: "/vitals/live".to_string(),
            ..RelayConfig::default()
        };
        let relay = VitalsRelay::with_config(bridge, config);

        let mut n = vitals(72, 98, 120, 80);
        assert_eq!(relay.decode(&n), None);

        n.path = "/vitals/live".to_string();
        assert_eq!(relay.decode(&n), Some(VitalsSample::new(72, 98, 120, 80)));
    }
}
