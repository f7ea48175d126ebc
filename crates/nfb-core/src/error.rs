//! Error handling for the neurofeedback engine
//!
//! None of these errors are fatal to the processing loop; they describe
//! why a tick degraded (no stream, lost stream, skipped publish).

use core::fmt;

/// Result type alias for neurofeedback operations
pub type NfbResult<T> = Result<T, NfbError>;

/// Error type shared by all workspace crates
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum NfbError {
    /// Configuration values are out of range or inconsistent
    InvalidConfig {
        /// Description of the configuration error
        reason: String,
    },

    /// Stream metadata cannot be used (no channels, bad rate, ...)
    InvalidStream {
        /// Name of the offending stream
        stream: String,
        /// Description of the metadata problem
        reason: String,
    },

    /// The stream vanished or failed mid-read
    StreamLost {
        /// Name of the lost stream
        stream: String,
        /// Backend-reported cause
        reason: String,
    },

    /// The discovery backend itself failed (distinct from "nothing found")
    Discovery {
        /// Backend-reported cause
        reason: String,
    },

    /// Spectral estimation could not be carried out
    Spectral {
        /// Description of the failure
        reason: String,
    },

    /// Filesystem or serialization failure
    Io {
        /// Path involved in the failed operation
        path: String,
        /// Underlying error description
        reason: String,
    },
}

impl NfbError {
    /// Convenience constructor for configuration errors
    pub fn config(reason: impl Into<String>) -> Self {
        NfbError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Convenience constructor for lost-stream errors
    pub fn stream_lost(stream: impl Into<String>, reason: impl Into<String>) -> Self {
        NfbError::StreamLost {
            stream: stream.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for NfbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NfbError::InvalidConfig { reason } => {
                write!(f, "Invalid configuration: {}", reason)
            }
            NfbError::InvalidStream { stream, reason } => {
                write!(f, "Unusable stream '{}': {}", stream, reason)
            }
            NfbError::StreamLost { stream, reason } => {
                write!(f, "Stream '{}' lost: {}", stream, reason)
            }
            NfbError::Discovery { reason } => {
                write!(f, "Stream discovery failed: {}", reason)
            }
            NfbError::Spectral { reason } => {
                write!(f, "Spectral estimation failed: {}", reason)
            }
            NfbError::Io { path, reason } => {
                write!(f, "I/O error on {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for NfbError {}

/// Convenience macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)+) => {
        $crate::error::NfbError::InvalidConfig {
            reason: format!($($arg)+),
        }
    };
}
