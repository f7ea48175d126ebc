//! NFB-Core: Foundation types for the mu-rhythm neurofeedback engine
//!
//! Sample frames, stream metadata, backend traits and the published
//! feedback snapshot shared by every other crate in the workspace.

pub mod error;
pub mod sample;
pub mod snapshot;
pub mod stream;

pub use error::{NfbError, NfbResult};
pub use sample::SampleFrame;
pub use snapshot::{ChannelPowers, FeedbackChannels, FeedbackSnapshot};
pub use stream::{SampleSource, StreamDescriptor, StreamDiscovery, StreamQuery};
