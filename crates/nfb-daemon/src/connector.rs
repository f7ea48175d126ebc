//! Stream connector: discovery, channel selection and pulling
//!
//! Discovery never reports "nothing found" as an error; absence of a stream is
//! an expected operating condition and is returned as `None`. Channel indices
//! are re-derived on every connection since a rediscovered stream may have a
//! different layout than the previous one.

use nfb_core::{
    NfbError, NfbResult, SampleSource, StreamDescriptor, StreamDiscovery, StreamQuery,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::task;
use tracing::{debug, info, warn};

/// Canonical label of the left motor channel
pub const LEFT_LABEL: &str = "C3";
/// Canonical label of the right motor channel
pub const RIGHT_LABEL: &str = "C4";

/// (channel count, (left index, right index)) for known headsets
const KNOWN_LAYOUTS: [(usize, (usize, usize)); 3] = [(8, (1, 3)), (14, (3, 5)), (32, (7, 11))];

/// Positions guessed when neither labels nor a known layout apply
const FALLBACK_POSITIONS: (usize, usize) = (1, 3);

/// How a channel mapping was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionTier {
    /// Both canonical labels found in the stream metadata
    Labels,
    /// Channel count matched a known hardware layout
    KnownLayout,
    /// Clamped default positions
    Fallback,
}

impl ResolutionTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionTier::Labels => "labels",
            ResolutionTier::KnownLayout => "known-layout",
            ResolutionTier::Fallback => "fallback",
        }
    }
}

/// Indices of the two monitored channels within a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMap {
    pub left: usize,
    pub right: usize,
    pub tier: ResolutionTier,
}

impl ChannelMap {
    /// Apply the label / layout / fallback policy to a stream
    pub fn resolve(descriptor: &StreamDescriptor) -> NfbResult<Self> {
        let count = descriptor.channel_count;
        if count == 0 {
            return Err(NfbError::InvalidStream {
                stream: descriptor.name.clone(),
                reason: "stream declares no channels".to_string(),
            });
        }

        if let (Some(left), Some(right)) = (
            descriptor.label_position(LEFT_LABEL),
            descriptor.label_position(RIGHT_LABEL),
        ) {
            return Ok(ChannelMap {
                left,
                right,
                tier: ResolutionTier::Labels,
            });
        }

        if let Some(&(_, (left, right))) = KNOWN_LAYOUTS.iter().find(|(n, _)| *n == count) {
            return Ok(ChannelMap {
                left,
                right,
                tier: ResolutionTier::KnownLayout,
            });
        }

        let (left, right) = FALLBACK_POSITIONS;
        Ok(ChannelMap {
            left: left.min(count - 1),
            right: right.min(count - 1),
            tier: ResolutionTier::Fallback,
        })
    }

    /// Both monitored channels read the same stream channel
    pub fn is_degenerate(&self) -> bool {
        self.left == self.right
    }

    /// Minimum frame width that contains both channels
    pub fn required_width(&self) -> usize {
        self.left.max(self.right) + 1
    }
}

/// Finds streams through a discovery backend and opens connections
#[derive(Clone)]
pub struct StreamConnector {
    backend: Arc<dyn StreamDiscovery>,
}

impl StreamConnector {
    pub fn new(backend: Arc<dyn StreamDiscovery>) -> Self {
        StreamConnector { backend }
    }

    /// Resolve every stream matching `query`; backend failures are returned
    pub async fn list(
        &self,
        query: &StreamQuery,
        timeout: Duration,
    ) -> NfbResult<Vec<StreamDescriptor>> {
        let backend = Arc::clone(&self.backend);
        let query = query.clone();

        task::spawn_blocking(move || backend.resolve(&query, timeout))
            .await
            .map_err(|e| NfbError::Discovery {
                reason: format!("discovery task failed: {}", e),
            })?
    }

    /// First stream matching `query` within `timeout`, or `None`
    pub async fn discover(
        &self,
        query: &StreamQuery,
        timeout: Duration,
    ) -> Option<StreamDescriptor> {
        match self.list(query, timeout).await {
            Ok(streams) => {
                if streams.len() > 1 {
                    debug!(found = streams.len(), "multiple streams matched, using the first");
                }
                streams.into_iter().next()
            }
            Err(e) => {
                warn!(error = %e, "stream discovery failed");
                None
            }
        }
    }

    /// Resolve the channel mapping and open a pulling connection
    pub async fn connect(&self, descriptor: StreamDescriptor) -> NfbResult<ActiveConnection> {
        let channels = ChannelMap::resolve(&descriptor)?;

        match channels.tier {
            ResolutionTier::Fallback => warn!(
                stream = %descriptor.name,
                channels = descriptor.channel_count,
                left = channels.left,
                right = channels.right,
                "no channel labels or known layout, guessing channel positions"
            ),
            tier => debug!(tier = tier.as_str(), "channel positions resolved"),
        }
        if channels.is_degenerate() {
            warn!(
                stream = %descriptor.name,
                index = channels.left,
                "both monitored channels map to one stream channel; laterality will read 0"
            );
        }

        let backend = Arc::clone(&self.backend);
        let target = descriptor.clone();
        let inlet = task::spawn_blocking(move || backend.open(&target))
            .await
            .map_err(|e| NfbError::Discovery {
                reason: format!("connection task failed: {}", e),
            })??;

        info!(
            stream = %descriptor.name,
            channels = descriptor.channel_count,
            srate = descriptor.nominal_srate,
            left = channels.left,
            right = channels.right,
            tier = channels.tier.as_str(),
            "connected to EEG stream"
        );

        Ok(ActiveConnection {
            descriptor,
            channels,
            inlet,
        })
    }
}

/// An open stream plus its resolved channel mapping
pub struct ActiveConnection {
    descriptor: StreamDescriptor,
    channels: ChannelMap,
    inlet: Box<dyn SampleSource>,
}

impl ActiveConnection {
    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn channels(&self) -> ChannelMap {
        self.channels
    }

    /// Non-blocking pull of at most `max_samples` (left, right) readings.
    ///
    /// An empty vector means no data is available yet. A frame too narrow for
    /// the channel mapping is treated like any other read failure.
    pub fn pull(&mut self, max_samples: usize) -> NfbResult<Vec<(f64, f64)>> {
        let frames = self.inlet.pull(max_samples)?;
        let channels = self.channels;
        let name = &self.descriptor.name;

        frames
            .iter()
            .map(|frame| {
                let pick = |index: usize| {
                    frame.channel(index).map_err(|_| {
                        NfbError::stream_lost(
                            name,
                            format!(
                                "frame carries {} channels, mapping needs {}",
                                frame.channel_count(),
                                channels.required_width()
                            ),
                        )
                    })
                };
                Ok((pick(channels.left)?, pick(channels.right)?))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nfb_core::SampleFrame;
    use nfb_simulation::VirtualStreamRegistry;

    fn descriptor(count: usize, labels: Option<Vec<&str>>) -> StreamDescriptor {
        StreamDescriptor {
            name: "eeg".to_string(),
            stream_type: "EEG".to_string(),
            channel_count: count,
            nominal_srate: 250.0,
            source_id: format!("dev-{}", count),
            channel_labels: labels.map(|l| l.into_iter().map(String::from).collect()),
        }
    }

    #[test]
    fn test_labels_take_priority() {
        let desc = descriptor(8, Some(vec!["C4", "x", "y", "z", "C3", "a", "b", "c"]));
        let map = ChannelMap::resolve(&desc).unwrap();
        assert_eq!((map.left, map.right), (4, 0));
        assert_eq!(map.tier, ResolutionTier::Labels);
    }

    #[test]
    fn test_partial_labels_fall_through_to_layout() {
        let mut labels = vec!["ch"; 14];
        labels[0] = "C3";
        let map = ChannelMap::resolve(&descriptor(14, Some(labels))).unwrap();
        assert_eq!((map.left, map.right), (3, 5));
        assert_eq!(map.tier, ResolutionTier::KnownLayout);
    }

    #[test]
    fn test_known_layouts() {
        for (count, expected) in [(8, (1, 3)), (14, (3, 5)), (32, (7, 11))] {
            let map = ChannelMap::resolve(&descriptor(count, None)).unwrap();
            assert_eq!((map.left, map.right), expected);
        }
    }

    #[test]
    fn test_fallback_clamps() {
        let map = ChannelMap::resolve(&descriptor(16, None)).unwrap();
        assert_eq!((map.left, map.right, map.tier), (1, 3, ResolutionTier::Fallback));

        let map = ChannelMap::resolve(&descriptor(3, None)).unwrap();
        assert_eq!((map.left, map.right), (1, 2));
        assert!(!map.is_degenerate());

        let map = ChannelMap::resolve(&descriptor(2, None)).unwrap();
        assert_eq!((map.left, map.right), (1, 1));
        assert!(map.is_degenerate());

        let map = ChannelMap::resolve(&descriptor(1, None)).unwrap();
        assert_eq!((map.left, map.right), (0, 0));
        assert_eq!(map.required_width(), 1);
    }

    #[test]
    fn test_zero_channels_rejected() {
        let err = ChannelMap::resolve(&descriptor(0, None)).unwrap_err();
        assert!(matches!(err, NfbError::InvalidStream { .. }));
    }

    #[tokio::test]
    async fn test_discover_returns_none_when_absent() {
        let connector = StreamConnector::new(Arc::new(VirtualStreamRegistry::new()));
        let found = connector
            .discover(&StreamQuery::signal_streams(), Duration::from_millis(20))
            .await;
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_connect_and_pull_pairs() {
        let registry = VirtualStreamRegistry::new();
        let stream = registry.announce(descriptor(4, Some(vec!["Fz", "C3", "Cz", "C4"])));
        let connector = StreamConnector::new(Arc::new(registry));

        let desc = connector
            .discover(&StreamQuery::signal_streams(), Duration::from_millis(20))
            .await
            .unwrap();
        let mut connection = connector.connect(desc).await.unwrap();
        assert_eq!(connection.channels().tier, ResolutionTier::Labels);

        assert!(connection.pull(10).unwrap().is_empty());

        stream.push_frames(vec![
            SampleFrame::new(0.0, vec![9.0, 1.0, 9.0, 2.0]),
            SampleFrame::new(0.004, vec![9.0, 3.0, 9.0, 4.0]),
        ]);
        assert_eq!(connection.pull(10).unwrap(), vec![(1.0, 2.0), (3.0, 4.0)]);
    }

    #[tokio::test]
    async fn test_pull_keeps_double_precision() {
        let registry = VirtualStreamRegistry::new();
        let stream = registry.announce(descriptor(4, Some(vec!["Fz", "C3", "Cz", "C4"])));
        let connector = StreamConnector::new(Arc::new(registry));
        let mut connection = connector.connect(descriptor(4, None)).await.unwrap();

        // Neither value survives a round trip through f32
        let left = 1.000_000_001;
        let right = -2.5e-9;
        assert_ne!(left as f32 as f64, left);
        stream.push_frames(vec![SampleFrame::new(0.0, vec![0.0, left, 0.0, right])]);

        assert_eq!(connection.pull(1).unwrap(), vec![(left, right)]);
    }

    #[tokio::test]
    async fn test_short_frame_is_a_read_failure() {
        let registry = VirtualStreamRegistry::new();
        let stream = registry.announce(descriptor(8, None));
        let connector = StreamConnector::new(Arc::new(registry));

        let mut connection = connector.connect(descriptor(8, None)).await.unwrap();
        stream.push_frames(vec![SampleFrame::new(0.0, vec![1.0, 2.0])]);

        let err = connection.pull(10).unwrap_err();
        assert!(matches!(err, NfbError::StreamLost { .. }));
    }
}
