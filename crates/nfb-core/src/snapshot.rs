//! FeedbackSnapshot: the externally published state record
//!
//! The snapshot is serialized as a single JSON object and replaced wholesale
//! on every publish tick. Readers (the stimulus front end, dashboards) poll
//! the file and rely on the field names below.

use crate::error::{NfbError, NfbResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Status published before each discovery attempt
pub const STATUS_SEARCHING: &str = "Searching for EEG stream...";
/// Status published when discovery timed out
pub const STATUS_NO_STREAM: &str = "No EEG stream found";
/// Status published after a read failure
pub const STATUS_DISCONNECTED: &str = "Stream disconnected";
/// Status published while the window is below the estimation threshold
pub const STATUS_BUFFERING: &str = "Buffering...";
/// Final status left behind on graceful shutdown
pub const STATUS_STOPPED: &str = "Feedback processor stopped";

/// Band powers of one monitored channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelPowers {
    pub mu_power: f64,
    pub beta_power: f64,
}

impl ChannelPowers {
    pub fn new(mu_power: f64, beta_power: f64) -> Self {
        ChannelPowers {
            mu_power: round4(mu_power),
            beta_power: round4(beta_power),
        }
    }
}

/// Per-channel section of the snapshot, keyed by electrode label
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedbackChannels {
    #[serde(rename = "C3")]
    pub c3: ChannelPowers,
    #[serde(rename = "C4")]
    pub c4: ChannelPowers,
}

/// Complete published state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSnapshot {
    /// Unix time of publication in seconds
    pub timestamp: f64,
    pub connected: bool,
    pub stream_name: Option<String>,
    pub channels: FeedbackChannels,
    /// Signed right/left asymmetry in [-1, 1]
    pub laterality_index: f64,
    /// Normalized decrease of mu power relative to baseline, in [0, 1]
    pub mu_suppression: f64,
    /// Operator-facing status or error message
    pub error: Option<String>,
}

impl FeedbackSnapshot {
    /// Snapshot for a loop that has no stream
    pub fn disconnected(status: &str) -> Self {
        FeedbackSnapshot {
            timestamp: unix_now(),
            connected: false,
            stream_name: None,
            channels: FeedbackChannels::default(),
            laterality_index: 0.0,
            mu_suppression: 0.0,
            error: Some(status.to_string()),
        }
    }

    /// Snapshot for a connected stream whose window is not yet usable
    pub fn buffering(stream_name: &str) -> Self {
        FeedbackSnapshot {
            timestamp: unix_now(),
            connected: true,
            stream_name: Some(stream_name.to_string()),
            channels: FeedbackChannels::default(),
            laterality_index: 0.0,
            mu_suppression: 0.0,
            error: Some(STATUS_BUFFERING.to_string()),
        }
    }

    /// Snapshot carrying a valid reading; values are rounded to 4 decimals
    pub fn connected(
        stream_name: &str,
        channels: FeedbackChannels,
        laterality_index: f64,
        mu_suppression: f64,
    ) -> Self {
        FeedbackSnapshot {
            timestamp: unix_now(),
            connected: true,
            stream_name: Some(stream_name.to_string()),
            channels,
            laterality_index: round4(laterality_index),
            mu_suppression: round4(mu_suppression),
            error: None,
        }
    }

    /// Serialize to the on-disk JSON representation
    pub fn to_json(&self) -> NfbResult<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| NfbError::Io {
            path: String::from("<snapshot>"),
            reason: e.to_string(),
        })
    }

    /// Read a published snapshot back from disk
    pub fn load(path: impl AsRef<Path>) -> NfbResult<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| NfbError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| NfbError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

/// Round to the 4 decimals carried by the published format
pub fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
