//! Scoped notification batches
//!
//! The data layer hands the listener a batch that it owns and that must be
//! released exactly once when the listener is done with it. Elements are
//! materialized on access, which is where a corrupt element surfaces.

use crate::error::RelayError;
use crate::schema::notification::{ChangeNotification, RawNotification};
use serde_json::Value;

/// A batch of change notifications owned by the data layer
pub trait DataEventBuffer {
    /// Number of elements in the batch
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Materialize the element at `index`
    fn get(&self, index: usize) -> Result<ChangeNotification, RelayError>;

    /// Hand the batch back to the data layer
    fn release(&mut self);
}

fn released_error() -> RelayError {
    RelayError::MalformedNotification("buffer already released".to_string())
}

fn out_of_range(index: usize, len: usize) -> RelayError {
    RelayError::MalformedNotification(format!("index {index} out of range for batch of {len}"))
}

#[derive(Debug, Clone)]
enum Entry {
    Ready(ChangeNotification),
    Malformed(String),
}

/// In-memory batch of already decoded notifications
#[derive(Debug, Clone, Default)]
pub struct VecEventBuffer {
    entries: Vec<Entry>,
    release_count: usize,
}

impl VecEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notification: ChangeNotification) {
        self.entries.push(Entry::Ready(notification));
    }

    /// Add an element that fails to materialize with `reason`
    pub fn push_malformed(&mut self, reason: &str) {
        self.entries.push(Entry::Malformed(reason.to_string()));
    }

    /// How many times the batch has been released
    pub fn release_count(&self) -> usize {
        self.release_count
    }
}

impl From<Vec<ChangeNotification>> for VecEventBuffer {
    fn from(notifications: Vec<ChangeNotification>) -> Self {
        Self {
            entries: notifications.into_iter().map(Entry::Ready).collect(),
            release_count: 0,
        }
    }
}

impl DataEventBuffer for VecEventBuffer {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<ChangeNotification, RelayError> {
        if self.release_count > 0 {
            return Err(released_error());
        }
        match self.entries.get(index) {
            Some(Entry::Ready(n)) => Ok(n.clone()),
            Some(Entry::Malformed(reason)) => {
                Err(RelayError::MalformedNotification(reason.clone()))
            }
            None => Err(out_of_range(index, self.entries.len())),
        }
    }

    fn release(&mut self) {
        self.release_count += 1;
    }
}

/// Batch backed by JSON notification records
///
/// Accepts either a JSON array of records or NDJSON (one record per line).
/// A line that is not valid JSON is kept as an element that fails to
/// materialize, so one bad record never hides the rest of the batch.
#[derive(Debug, Clone, Default)]
pub struct JsonEventBuffer {
    entries: Vec<Result<Value, String>>,
    release_count: usize,
}

impl JsonEventBuffer {
    /// Parse NDJSON. Blank lines are skipped.
    pub fn from_ndjson(ndjson: &str) -> Self {
        let entries = ndjson
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(line_num, line)| {
                serde_json::from_str::<Value>(line.trim())
                    .map_err(|e| format!("Failed to parse line {}: {}", line_num + 1, e))
            })
            .collect();

        Self {
            entries,
            release_count: 0,
        }
    }

    /// Parse a JSON array of records
    pub fn from_array(json: &str) -> Result<Self, RelayError> {
        let records: Vec<Value> = serde_json::from_str(json)?;
        Ok(Self {
            entries: records.into_iter().map(Ok).collect(),
            release_count: 0,
        })
    }

    /// Pick array or NDJSON parsing from the first non-blank character
    pub fn parse(input: &str) -> Result<Self, RelayError> {
        if input.trim_start().starts_with('[') {
            Self::from_array(input)
        } else {
            Ok(Self::from_ndjson(input))
        }
    }

    pub fn release_count(&self) -> usize {
        self.release_count
    }
}

impl DataEventBuffer for JsonEventBuffer {
    fn len(&self) -> usize {
        self.entries.len()
    }

    fn get(&self, index: usize) -> Result<ChangeNotification, RelayError> {
        if self.release_count > 0 {
            return Err(released_error());
        }
        let value = match self.entries.get(index) {
            Some(Ok(value)) => value.clone(),
            Some(Err(reason)) => return Err(RelayError::MalformedNotification(reason.clone())),
            None => return Err(out_of_range(index, self.entries.len())),
        };

        let raw: RawNotification = serde_json::from_value(value)?;
        ChangeNotification::try_from(raw)
    }

    fn release(&mut self) {
        self.release_count += 1;
    }
}
