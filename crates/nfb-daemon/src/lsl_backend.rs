//! Lab Streaming Layer discovery backend
//!
//! LSL calls are synchronous; the connector runs `resolve` and `open` on the
//! blocking pool, and `pull` never waits.

use lsl::{Pullable, StreamInfo, StreamInlet};
use nfb_core::{
    NfbError, NfbResult, SampleFrame, SampleSource, StreamDescriptor, StreamDiscovery, StreamQuery,
};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Seconds of data buffered inside an inlet before LSL drops samples
const INLET_BUFFER_SECS: i32 = 360;

/// Upper bound on re-resolving a stream by source id when opening it
const OPEN_TIMEOUT: f64 = 2.0;

pub struct LslDiscovery;

impl LslDiscovery {
    pub fn new() -> Self {
        LslDiscovery
    }
}

impl Default for LslDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

fn discovery_error(error: impl std::fmt::Debug) -> NfbError {
    NfbError::Discovery {
        reason: format!("{:?}", error),
    }
}

/// `<desc><channels><channel><label>` entries, if the producer declares them
fn channel_labels(info: &StreamInfo) -> Option<Vec<String>> {
    let mut labels = Vec::new();
    let mut channel = info.desc().child("channels").child("channel");
    while channel.is_valid() {
        labels.push(channel.child_value_named("label"));
        channel = channel.next_sibling();
    }

    if labels.is_empty() {
        None
    } else {
        Some(labels)
    }
}

fn describe(info: &StreamInfo) -> StreamDescriptor {
    StreamDescriptor {
        name: info.stream_name(),
        stream_type: info.stream_type(),
        channel_count: info.channel_count().max(0) as usize,
        nominal_srate: info.nominal_srate(),
        source_id: info.source_id(),
        channel_labels: channel_labels(info),
    }
}

impl StreamDiscovery for LslDiscovery {
    fn resolve(&self, query: &StreamQuery, timeout: Duration) -> NfbResult<Vec<StreamDescriptor>> {
        let predicate = query.predicate();
        let wait = timeout.as_secs_f64();
        debug!(predicate = %predicate, "resolving LSL streams");

        let streams = if predicate.is_empty() {
            lsl::resolve_streams(wait)
        } else {
            lsl::resolve_bypred(&predicate, 1, wait)
        }
        .map_err(discovery_error)?;

        Ok(streams
            .iter()
            .map(describe)
            .filter(|d| query.matches(d))
            .collect())
    }

    fn open(&self, descriptor: &StreamDescriptor) -> NfbResult<Box<dyn SampleSource>> {
        let predicate = format!("source_id='{}'", descriptor.source_id);
        let info = lsl::resolve_bypred(&predicate, 1, OPEN_TIMEOUT)
            .map_err(discovery_error)?
            .into_iter()
            .next()
            .ok_or_else(|| NfbError::stream_lost(&descriptor.name, "stream vanished before opening"))?;

        let inlet = StreamInlet::new(&info, INLET_BUFFER_SECS, 0, true)
            .map_err(|e| NfbError::stream_lost(&descriptor.name, format!("{:?}", e)))?;
        inlet
            .set_postprocessing(&[lsl::ProcessingOption::ClockSync])
            .map_err(|e| NfbError::stream_lost(&descriptor.name, format!("{:?}", e)))?;

        Ok(Box::new(LslInlet {
            inlet,
            name: descriptor.name.clone(),
            pending: VecDeque::new(),
        }))
    }
}

/// Non-blocking inlet; chunks larger than requested are held back for the next pull
pub struct LslInlet {
    inlet: StreamInlet,
    name: String,
    pending: VecDeque<SampleFrame>,
}

impl SampleSource for LslInlet {
    fn pull(&mut self, max_samples: usize) -> NfbResult<Vec<SampleFrame>> {
        if self.pending.len() < max_samples {
            let (samples, timestamps): (Vec<Vec<f64>>, Vec<f64>) = self
                .inlet
                .pull_chunk()
                .map_err(|e| NfbError::stream_lost(&self.name, format!("{:?}", e)))?;

            self.pending.extend(
                samples
                    .into_iter()
                    .zip(timestamps)
                    .map(|(values, timestamp)| SampleFrame::new(timestamp, values)),
            );
        }

        let take = max_samples.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }
}
