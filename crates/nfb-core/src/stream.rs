//! Stream metadata and the backend traits used by the stream connector
//!
//! A backend knows how to find channel-multiplexed sample streams on the
//! network (LSL, or the in-process simulator) and how to open a pulling
//! connection to one of them. Channel selection policy lives above this layer.

use crate::error::NfbResult;
use crate::sample::SampleFrame;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Stream type carried by event/marker-only streams
pub const MARKER_STREAM_TYPE: &str = "Markers";

/// Metadata identifying a discovered stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Human readable stream name
    pub name: String,
    /// Content type ("EEG", "Markers", ...)
    #[serde(rename = "type")]
    pub stream_type: String,
    /// Number of channels per frame
    #[serde(rename = "channels")]
    pub channel_count: usize,
    /// Declared sampling rate in Hz (0 for irregular streams)
    #[serde(rename = "srate")]
    pub nominal_srate: f64,
    /// Unique identifier of the producing device/application
    pub source_id: String,
    /// Channel labels from the stream description, when the producer declares them
    #[serde(skip)]
    pub channel_labels: Option<Vec<String>>,
}

impl StreamDescriptor {
    /// Position of a channel label, if labels are declared
    pub fn label_position(&self, label: &str) -> Option<usize> {
        self.channel_labels
            .as_ref()
            .and_then(|labels| labels.iter().position(|l| l == label))
    }
}

/// Type/rate predicate used to select streams
#[derive(Debug, Clone, PartialEq)]
pub struct StreamQuery {
    /// Streams of this type are never selected
    pub excluded_type: Option<String>,
    /// Nominal rate must be strictly greater than this value
    pub min_nominal_srate: Option<f64>,
}

impl StreamQuery {
    /// Continuous signal streams: no marker streams, positive nominal rate
    pub fn signal_streams() -> Self {
        StreamQuery {
            excluded_type: Some(MARKER_STREAM_TYPE.to_string()),
            min_nominal_srate: Some(0.0),
        }
    }

    /// Every visible stream
    pub fn all() -> Self {
        StreamQuery {
            excluded_type: None,
            min_nominal_srate: None,
        }
    }

    /// Check a descriptor against the predicate
    pub fn matches(&self, descriptor: &StreamDescriptor) -> bool {
        let type_ok = self
            .excluded_type
            .as_deref()
            .map_or(true, |excluded| descriptor.stream_type != excluded);
        let rate_ok = self
            .min_nominal_srate
            .map_or(true, |min| descriptor.nominal_srate > min);
        type_ok && rate_ok
    }

    /// XPath predicate understood by LSL resolvers (empty means "any")
    pub fn predicate(&self) -> String {
        let mut clauses = Vec::new();
        if let Some(ref excluded) = self.excluded_type {
            clauses.push(format!("type != '{}'", excluded));
        }
        if let Some(min) = self.min_nominal_srate {
            clauses.push(format!("nominal_srate > {}", min));
        }
        clauses.join(" and ")
    }
}

impl Default for StreamQuery {
    fn default() -> Self {
        Self::signal_streams()
    }
}

/// Discovery backend: finds streams and opens pulling connections
pub trait StreamDiscovery: Send + Sync {
    /// Resolve streams matching `query`, blocking for at most `timeout`.
    ///
    /// An empty vector means nothing was found; `Err` is reserved for
    /// backend failures.
    fn resolve(&self, query: &StreamQuery, timeout: Duration) -> NfbResult<Vec<StreamDescriptor>>;

    /// Open a pulling connection with clock-synchronization correction enabled.
    fn open(&self, descriptor: &StreamDescriptor) -> NfbResult<Box<dyn SampleSource>>;
}

/// Pull-based sample source bound to one stream
pub trait SampleSource: Send {
    /// Non-blocking pull of at most `max_samples` frames.
    ///
    /// `Ok(vec![])` means no data is currently available; `Err` means the
    /// stream is gone and the connection must be dropped.
    fn pull(&mut self, max_samples: usize) -> NfbResult<Vec<SampleFrame>>;
}
