//! NFB-Daemon: the real-time feedback engine
//!
//! Stream connection and channel selection, atomic snapshot publishing and
//! the fixed-cadence processing loop that ties them to the spectral pipeline.

pub mod cli;
pub mod connector;
pub mod engine;
#[cfg(feature = "lsl-support")]
pub mod lsl_backend;
pub mod publisher;
pub mod shutdown;

pub use connector::{ActiveConnection, ChannelMap, ResolutionTier, StreamConnector};
pub use engine::{EngineState, FeedbackEngine, TickOutcome};
pub use publisher::StatePublisher;
