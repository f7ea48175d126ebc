//! Processing loop: the orchestrator of the feedback engine
//!
//! `SEARCHING -> BUFFERING -> READY`, with any read failure dropping straight
//! back to `SEARCHING`. Every tick publishes, so external readers always see a
//! recent heartbeat regardless of how much data arrived.

use crate::connector::{ActiveConnection, StreamConnector};
use crate::publisher::StatePublisher;
use nfb_core::snapshot::{
    STATUS_DISCONNECTED, STATUS_NO_STREAM, STATUS_SEARCHING, STATUS_STOPPED,
};
use nfb_core::{FeedbackSnapshot, NfbResult, StreamDescriptor, StreamQuery};
use nfb_processing::{BaselineState, FeedbackConfig, MuRhythmProcessor, ProcessingOutcome};
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

/// Orchestrator state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Searching,
    Buffering,
    Ready,
}

/// What the loop should do after a tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Wait for the next update interval
    Continue,
    /// No stream; wait the retry interval before searching again
    Retry,
    /// Stream lost; search again immediately
    Reconnect,
}

/// Per-connection state, dropped wholesale on disconnect
struct Session {
    connection: ActiveConnection,
    processor: MuRhythmProcessor,
}

pub struct FeedbackEngine {
    config: FeedbackConfig,
    query: StreamQuery,
    connector: StreamConnector,
    publisher: StatePublisher,
    session: Option<Session>,
    state: EngineState,
}

impl FeedbackEngine {
    pub fn new(config: FeedbackConfig, connector: StreamConnector, publisher: StatePublisher) -> Self {
        FeedbackEngine {
            config,
            query: StreamQuery::signal_streams(),
            connector,
            publisher,
            session: None,
            state: EngineState::Searching,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Baseline of the current connection, `None` while disconnected
    pub fn baseline(&self) -> Option<BaselineState> {
        self.session.as_ref().map(|s| s.processor.baseline())
    }

    pub fn stream_name(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.connection.name())
    }

    pub fn publisher(&self) -> &StatePublisher {
        &self.publisher
    }

    /// Run one iteration of the state machine
    pub async fn tick(&mut self) -> TickOutcome {
        if self.session.is_none() {
            return self.search().await;
        }

        let (snapshot, outcome) = self.process();
        self.publisher.publish(&snapshot);
        outcome
    }

    async fn search(&mut self) -> TickOutcome {
        self.state = EngineState::Searching;
        self.publisher
            .publish(&FeedbackSnapshot::disconnected(STATUS_SEARCHING));

        let Some(descriptor) = self
            .connector
            .discover(&self.query, self.config.discovery_timeout())
            .await
        else {
            debug!("no EEG stream found");
            self.publisher
                .publish(&FeedbackSnapshot::disconnected(STATUS_NO_STREAM));
            return TickOutcome::Retry;
        };

        match self.open_session(descriptor).await {
            Ok(session) => {
                self.session = Some(session);
                self.state = EngineState::Buffering;
                TickOutcome::Continue
            }
            Err(e) => {
                warn!(error = %e, "could not connect to stream");
                self.publisher
                    .publish(&FeedbackSnapshot::disconnected(&e.to_string()));
                TickOutcome::Retry
            }
        }
    }

    async fn open_session(&self, descriptor: StreamDescriptor) -> NfbResult<Session> {
        let sample_rate = self.config.effective_sample_rate(descriptor.nominal_srate);
        if (sample_rate - descriptor.nominal_srate).abs() > f64::EPSILON {
            warn!(
                configured = sample_rate,
                nominal = descriptor.nominal_srate,
                "configured sample rate differs from the stream's nominal rate"
            );
        }

        let processor = MuRhythmProcessor::new(&self.config, sample_rate)?;
        let connection = self.connector.connect(descriptor).await?;

        Ok(Session {
            connection,
            processor,
        })
    }

    /// Pull, buffer and estimate for the connected stream
    fn process(&mut self) -> (FeedbackSnapshot, TickOutcome) {
        let Some(session) = self.session.as_mut() else {
            return (
                FeedbackSnapshot::disconnected(STATUS_DISCONNECTED),
                TickOutcome::Reconnect,
            );
        };

        let capacity = session.processor.capacity();
        let readings = match session.connection.pull(capacity) {
            Ok(readings) => readings,
            Err(e) => {
                warn!(stream = %session.connection.name(), error = %e, "stream lost");
                self.session = None;
                self.state = EngineState::Searching;
                return (
                    FeedbackSnapshot::disconnected(STATUS_DISCONNECTED),
                    TickOutcome::Reconnect,
                );
            }
        };

        for (left, right) in readings {
            session.processor.push(left, right);
        }

        let name = session.connection.name();
        let snapshot = match session.processor.update() {
            Ok(ProcessingOutcome::Buffering { filled, required }) => {
                debug!(filled, required, "buffering");
                self.state = EngineState::Buffering;
                FeedbackSnapshot::buffering(name)
            }
            Ok(ProcessingOutcome::Ready(metrics)) => {
                self.state = EngineState::Ready;
                FeedbackSnapshot::connected(
                    name,
                    metrics.channels(),
                    metrics.laterality_index,
                    metrics.mu_suppression,
                )
            }
            Err(e) => {
                warn!(error = %e, "estimation skipped");
                FeedbackSnapshot {
                    error: Some(e.to_string()),
                    ..FeedbackSnapshot::buffering(name)
                }
            }
        };

        (snapshot, TickOutcome::Continue)
    }

    /// Drive ticks until `shutdown` turns true (or its sender goes away),
    /// then leave a final "stopped" snapshot behind. Publishing `false` on
    /// the channel neither stops the loop nor shortens the current wait.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.config.update_interval().as_millis() as u64,
            output = %self.publisher.destination().display(),
            "feedback engine started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let started = Instant::now();
            let outcome = tokio::select! {
                outcome = self.tick() => outcome,
                _ = shutdown.wait_for(|stop| *stop) => break,
            };

            let deadline = match outcome {
                TickOutcome::Continue => started + self.config.update_interval(),
                TickOutcome::Retry => Instant::now() + self.config.retry_interval(),
                TickOutcome::Reconnect => continue,
            };

            tokio::select! {
                _ = sleep_until(deadline) => {}
                _ = shutdown.wait_for(|stop| *stop) => break,
            }
        }

        self.session = None;
        self.state = EngineState::Searching;
        self.publisher
            .publish(&FeedbackSnapshot::disconnected(STATUS_STOPPED));
        info!(
            snapshots = self.publisher.published_count(),
            "feedback processor stopped"
        );
    }
}

