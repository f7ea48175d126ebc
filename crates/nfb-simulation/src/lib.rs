//! NFB-Simulation: Synthetic EEG streams for development and testing
//!
//! A seedable EEG generator with mu-rhythm modulation, an in-process stream
//! registry that stands in for a network discovery backend, and a paced
//! producer that feeds it in real time.

pub mod eeg_simulator;
pub mod producer;
pub mod signal_patterns;
pub mod virtual_stream;

pub use eeg_simulator::*;
pub use producer::*;
pub use signal_patterns::*;
pub use virtual_stream::*;
