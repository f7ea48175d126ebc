//! Mu-rhythm modulation patterns
//!
//! A pattern maps elapsed stream time to a gain applied to the mu rhythm on
//! the motor channels. A gain of 1.0 is resting amplitude; motor imagery
//! desynchronizes the rhythm and shows up as a lower gain.

use serde::{Deserialize, Serialize};

/// Gain schedule for the motor-channel mu rhythm
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MuPattern {
    /// Fixed gain
    Constant { level: f64 },
    /// Rest blocks at full gain alternating with imagery blocks.
    /// `suppression` is the fractional amplitude drop during imagery.
    Alternating {
        rest_secs: f64,
        imagery_secs: f64,
        suppression: f64,
    },
    /// Linear change from `start_level` to `end_level`, then hold
    Ramp {
        start_level: f64,
        end_level: f64,
        duration_secs: f64,
    },
}

impl MuPattern {
    /// Amplitude gain at `time` seconds after stream start
    pub fn level_at(&self, time: f64) -> f64 {
        match *self {
            MuPattern::Constant { level } => level,

            MuPattern::Alternating {
                rest_secs,
                imagery_secs,
                suppression,
            } => {
                let cycle = rest_secs + imagery_secs;
                if cycle <= 0.0 || time.rem_euclid(cycle) < rest_secs {
                    1.0
                } else {
                    (1.0 - suppression).clamp(0.0, 1.0)
                }
            }

            MuPattern::Ramp {
                start_level,
                end_level,
                duration_secs,
            } => {
                if duration_secs <= 0.0 || time >= duration_secs {
                    end_level
                } else {
                    start_level + (end_level - start_level) * (time / duration_secs)
                }
            }
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MuPattern::Constant { .. } => "Constant mu amplitude",
            MuPattern::Alternating { .. } => "Alternating rest / imagery blocks",
            MuPattern::Ramp { .. } => "Gradual mu ramp",
        }
    }

    /// Rest/imagery cycle used by the demo stream
    pub fn demo() -> Self {
        MuPattern::Alternating {
            rest_secs: 8.0,
            imagery_secs: 4.0,
            suppression: 0.5,
        }
    }
}

impl Default for MuPattern {
    fn default() -> Self {
        MuPattern::Constant { level: 1.0 }
    }
}
