//! Real-time producer feeding a simulated EEG stream

use crate::eeg_simulator::{EegConfig, EegSimulator};
use crate::virtual_stream::{VirtualStream, VirtualStreamRegistry};
use nfb_core::NfbResult;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Name and source id of the demo stream
pub const SIMULATED_STREAM_NAME: &str = "SimulatedEEG";
pub const SIMULATED_SOURCE_ID: &str = "nfb-sim-0";

/// Paces an [`EegSimulator`] against wall-clock time
pub struct SimulatedProducer {
    simulator: EegSimulator,
    stream: VirtualStream,
    chunk_interval: Duration,
}

impl SimulatedProducer {
    pub fn new(simulator: EegSimulator, stream: VirtualStream, chunk_interval: Duration) -> Self {
        SimulatedProducer {
            simulator,
            stream,
            chunk_interval,
        }
    }

    /// Push frames until `shutdown` flips to true or its sender is dropped.
    ///
    /// Each tick tops the stream up to the number of samples owed since start,
    /// so timer jitter never drifts the effective sample rate.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> NfbResult<()> {
        let rate = self.simulator.config().sampling_rate;
        let mut ticker = interval(self.chunk_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let start = Instant::now();

        info!(
            rate,
            chunk_ms = self.chunk_interval.as_millis() as u64,
            pattern = self.simulator.config().pattern.description(),
            "simulated EEG stream started"
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let owed = (start.elapsed().as_secs_f64() * rate).floor() as u64;
                    let missing = owed.saturating_sub(self.simulator.samples_generated()) as usize;
                    if missing == 0 {
                        continue;
                    }

                    let frames = self.simulator.generate(missing)?;
                    debug!(frames = frames.len(), "simulated chunk pushed");
                    self.stream.push_frames(frames);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            seconds = self.simulator.elapsed(),
            "simulated EEG stream stopped"
        );
        Ok(())
    }
}

/// Announce the demo stream on `registry` and start feeding it in the background
pub fn start_simulated_stream(
    registry: &VirtualStreamRegistry,
    config: EegConfig,
    shutdown: watch::Receiver<bool>,
) -> NfbResult<JoinHandle<()>> {
    let simulator = EegSimulator::new(config)?;
    let stream = registry.announce(simulator.descriptor(SIMULATED_STREAM_NAME, SIMULATED_SOURCE_ID));
    let producer = SimulatedProducer::new(simulator, stream, Duration::from_millis(40));

    Ok(tokio::spawn(async move {
        if let Err(e) = producer.run(shutdown).await {
            warn!("simulated stream error: {}", e);
        }
    }))
}
