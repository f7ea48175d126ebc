//! End-to-end behaviour of the feedback engine against a simulated stream

use nfb_core::snapshot::{
    STATUS_BUFFERING, STATUS_DISCONNECTED, STATUS_NO_STREAM, STATUS_STOPPED,
};
use nfb_core::{
    FeedbackSnapshot, NfbError, NfbResult, SampleSource, StreamDescriptor, StreamDiscovery,
    StreamQuery,
};
use nfb_daemon::{EngineState, FeedbackEngine, StatePublisher, StreamConnector, TickOutcome};
use nfb_processing::{BaselineState, FeedbackConfig};
use nfb_simulation::{
    start_simulated_stream, EegConfig, EegSimulator, MuPattern, VirtualStream,
    VirtualStreamRegistry,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};

/// 256 Hz with a one second window puts 10 Hz exactly on a bin
const FS: f64 = 256.0;
/// Samples arriving per 250 ms tick
const TICK_SAMPLES: usize = 64;
const WINDOW: usize = 256;

fn config(baseline_secs: f64) -> FeedbackConfig {
    FeedbackConfig {
        baseline_duration_secs: baseline_secs,
        discovery_timeout_secs: 0.05,
        retry_interval_secs: 0.05,
        ..FeedbackConfig::default()
    }
}

fn eeg_config() -> EegConfig {
    EegConfig {
        sampling_rate: FS,
        noise_std: 0.0,
        seed: Some(3),
        ..EegConfig::default()
    }
}

struct Rig {
    engine: FeedbackEngine,
    registry: VirtualStreamRegistry,
    stream: Option<VirtualStream>,
    simulator: EegSimulator,
    path: PathBuf,
    _dir: TempDir,
}

impl Rig {
    fn new(baseline_secs: f64, with_stream: bool) -> Self {
        Self::with_config(config(baseline_secs), with_stream)
    }

    fn with_config(config: FeedbackConfig, with_stream: bool) -> Self {
        let registry = VirtualStreamRegistry::new();
        let simulator = EegSimulator::new(eeg_config()).unwrap();
        let stream = with_stream.then(|| registry.announce(simulator.descriptor("TestEEG", "test-eeg")));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feedback.json");
        let engine = FeedbackEngine::new(
            config,
            StreamConnector::new(Arc::new(registry.clone())),
            StatePublisher::new(&path),
        );

        Rig {
            engine,
            registry,
            stream,
            simulator,
            path,
            _dir: dir,
        }
    }

    fn stream(&self) -> &VirtualStream {
        self.stream.as_ref().expect("rig has no stream")
    }

    fn feed(&mut self, samples: usize) {
        let frames = self.simulator.generate(samples).unwrap();
        self.stream().push_frames(frames);
    }

    fn snapshot(&self) -> FeedbackSnapshot {
        FeedbackSnapshot::load(&self.path).unwrap()
    }

    /// Connect, fill one window and run ticks until the baseline is established
    async fn calibrate(&mut self) -> f64 {
        assert_eq!(self.engine.tick().await, TickOutcome::Continue);
        self.feed(WINDOW);
        loop {
            assert_eq!(self.engine.tick().await, TickOutcome::Continue);
            if let Some(BaselineState::Established { mean }) = self.engine.baseline() {
                return mean;
            }
            self.feed(TICK_SAMPLES);
        }
    }
}

#[tokio::test]
async fn baseline_establishes_with_zero_suppression() {
    let mut rig = Rig::new(5.0, true);

    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert!(rig.engine.is_connected());
    assert_eq!(rig.engine.baseline(), Some(BaselineState::Uninitialized));

    rig.feed(WINDOW);
    let mut ticks = 0;
    for _ in 0..20 {
        assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
        ticks += 1;
        if ticks < 20 {
            assert_eq!(
                rig.engine.baseline(),
                Some(BaselineState::Accumulating { collected: ticks })
            );
            assert_eq!(rig.snapshot().mu_suppression, 0.0);
            rig.feed(TICK_SAMPLES);
        }
    }

    assert_eq!(rig.engine.state(), EngineState::Ready);
    assert!(matches!(
        rig.engine.baseline(),
        Some(BaselineState::Established { .. })
    ));

    let snapshot = rig.snapshot();
    assert!(snapshot.connected);
    assert_eq!(snapshot.stream_name.as_deref(), Some("TestEEG"));
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.mu_suppression, 0.0);
    assert!(snapshot.laterality_index.abs() < 1e-3);
    assert!(snapshot.channels.c3.mu_power > snapshot.channels.c3.beta_power);
    assert!(snapshot.channels.c4.mu_power > 0.0);
}

#[tokio::test]
async fn halved_mu_power_reads_half_suppression() {
    let mut rig = Rig::new(5.0, true);
    let baseline = rig.calibrate().await;

    rig.simulator.set_pattern(MuPattern::Constant {
        level: 0.5_f64.sqrt(),
    });
    rig.feed(WINDOW);
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);

    let snapshot = rig.snapshot();
    assert!(
        (snapshot.mu_suppression - 0.5).abs() < 0.01,
        "suppression {}",
        snapshot.mu_suppression
    );
    assert_eq!(
        rig.engine.baseline(),
        Some(BaselineState::Established { mean: baseline })
    );
}

#[tokio::test]
async fn missing_stream_is_reported_and_retried() {
    let mut rig = Rig::new(5.0, false);

    for _ in 0..3 {
        assert_eq!(rig.engine.tick().await, TickOutcome::Retry);
        assert_eq!(rig.engine.state(), EngineState::Searching);

        let snapshot = rig.snapshot();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.stream_name, None);
        assert_eq!(snapshot.error.as_deref(), Some(STATUS_NO_STREAM));
    }

    // A stream appearing later is picked up on the next attempt
    rig.stream = Some(rig.registry.announce(rig.simulator.descriptor("Late", "late-eeg")));
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert_eq!(rig.engine.stream_name(), Some("Late"));
}

#[tokio::test]
async fn read_failure_resets_connection_and_baseline() {
    let mut rig = Rig::new(1.0, true);
    rig.calibrate().await;

    rig.stream().fail_next_pull();
    assert_eq!(rig.engine.tick().await, TickOutcome::Reconnect);
    assert_eq!(rig.engine.state(), EngineState::Searching);
    assert_eq!(rig.engine.baseline(), None);

    let snapshot = rig.snapshot();
    assert!(!snapshot.connected);
    assert_eq!(snapshot.error.as_deref(), Some(STATUS_DISCONNECTED));

    // Rediscovery resumes with fresh buffers and an empty baseline
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert_eq!(rig.engine.baseline(), Some(BaselineState::Uninitialized));

    rig.feed(WINDOW);
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert_eq!(
        rig.engine.baseline(),
        Some(BaselineState::Accumulating { collected: 1 })
    );

    let snapshot = rig.snapshot();
    assert!(snapshot.connected);
    assert_eq!(snapshot.error, None);
    assert_eq!(snapshot.mu_suppression, 0.0);
}

#[tokio::test]
async fn short_window_publishes_buffering() {
    let mut rig = Rig::new(5.0, true);
    rig.engine.tick().await;

    rig.feed(WINDOW / 2 - 1);
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert_eq!(rig.engine.state(), EngineState::Buffering);

    let snapshot = rig.snapshot();
    assert!(snapshot.connected);
    assert_eq!(snapshot.error.as_deref(), Some(STATUS_BUFFERING));
    assert_eq!(snapshot.channels.c3.mu_power, 0.0);
    assert_eq!(rig.engine.baseline(), Some(BaselineState::Uninitialized));

    rig.feed(1);
    rig.engine.tick().await;
    assert_eq!(rig.engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn empty_pull_still_publishes() {
    let mut rig = Rig::new(5.0, true);
    rig.engine.tick().await;
    rig.feed(WINDOW);
    rig.engine.tick().await;
    let first = rig.snapshot();

    // No new data: the same window is re-analyzed and republished
    sleep(Duration::from_millis(5)).await;
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    let second = rig.snapshot();
    assert!(second.timestamp > first.timestamp);
    assert_eq!(second.channels, first.channels);
}

#[tokio::test]
async fn offline_stream_is_rediscovered_when_it_returns() {
    let mut rig = Rig::new(5.0, true);
    rig.engine.tick().await;
    rig.feed(WINDOW);
    rig.engine.tick().await;

    rig.stream().disconnect();
    assert_eq!(rig.engine.tick().await, TickOutcome::Reconnect);
    assert_eq!(rig.engine.tick().await, TickOutcome::Retry);
    assert_eq!(rig.snapshot().error.as_deref(), Some(STATUS_NO_STREAM));

    rig.stream().reconnect();
    assert_eq!(rig.engine.tick().await, TickOutcome::Continue);
    assert!(rig.engine.is_connected());
}

#[tokio::test]
async fn run_loop_retries_until_shutdown() {
    let mut rig = Rig::new(5.0, false);
    let (tx, rx) = watch::channel(false);

    let stop = async {
        sleep(Duration::from_millis(300)).await;
        tx.send(true).unwrap();
    };
    tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(rig.engine.run(rx), stop);
    })
    .await
    .expect("engine did not stop");

    let snapshot = rig.snapshot();
    assert!(!snapshot.connected);
    assert_eq!(snapshot.error.as_deref(), Some(STATUS_STOPPED));
}

#[tokio::test]
async fn run_loop_processes_live_stream() {
    let registry = VirtualStreamRegistry::new();
    let (tx, rx) = watch::channel(false);
    start_simulated_stream(&registry, eeg_config(), rx.clone()).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedback.json");
    let mut engine = FeedbackEngine::new(
        config(0.5),
        StreamConnector::new(Arc::new(registry)),
        StatePublisher::new(&path),
    );

    let stop = async {
        sleep(Duration::from_millis(1500)).await;
        assert!(engine_published(&path));
        tx.send(true).unwrap();
    };
    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(engine.run(rx), stop);
    })
    .await
    .expect("engine did not stop");

    assert_eq!(engine.state(), EngineState::Searching);
    let snapshot = FeedbackSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.error.as_deref(), Some(STATUS_STOPPED));
}

/// Backend whose resolver fails instantly, counting every attempt
#[derive(Default)]
struct FailingDiscovery {
    attempts: AtomicUsize,
}

impl FailingDiscovery {
    fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl StreamDiscovery for FailingDiscovery {
    fn resolve(&self, _query: &StreamQuery, _timeout: Duration) -> NfbResult<Vec<StreamDescriptor>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(NfbError::Discovery {
            reason: "resolver unavailable".to_string(),
        })
    }

    fn open(&self, descriptor: &StreamDescriptor) -> NfbResult<Box<dyn SampleSource>> {
        Err(NfbError::stream_lost(&descriptor.name, "resolver unavailable"))
    }
}

#[tokio::test]
async fn failing_discovery_waits_the_retry_interval() {
    let backend = Arc::new(FailingDiscovery::default());
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("feedback.json");
    let mut engine = FeedbackEngine::new(
        config(5.0),
        StreamConnector::new(backend.clone()),
        StatePublisher::new(&path),
    );
    let (tx, rx) = watch::channel(false);

    // A `false` update mid-wait must neither stop the loop nor cut the wait short
    let driver = async {
        sleep(Duration::from_millis(150)).await;
        let before = backend.attempts();
        tx.send(false).unwrap();
        sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();
        before
    };
    let (_, before) = tokio::time::timeout(Duration::from_secs(5), async {
        tokio::join!(engine.run(rx), driver)
    })
    .await
    .expect("engine did not stop");

    // 300 ms at a 50 ms retry interval is about six attempts
    let attempts = backend.attempts();
    assert!(attempts >= 3, "only {} discovery attempts", attempts);
    assert!(attempts <= 9, "{} discovery attempts in 300 ms", attempts);
    assert!(attempts > before, "loop stopped on a false shutdown update");

    let snapshot = FeedbackSnapshot::load(&path).unwrap();
    assert_eq!(snapshot.error.as_deref(), Some(STATUS_STOPPED));
}

/// Run the engine for `duration`, optionally flooding the stream, and
/// return how many snapshots it published
async fn publishes_during(rig: &mut Rig, duration: Duration, flood: bool) -> u64 {
    let (tx, rx) = watch::channel(false);
    let Rig {
        engine,
        stream,
        simulator,
        ..
    } = rig;
    let stream = stream.as_ref().expect("rig has no stream");

    let driver = async {
        let stop_at = Instant::now() + duration;
        while Instant::now() < stop_at {
            if flood {
                stream.push_frames(simulator.generate(512).unwrap());
            }
            sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
    };
    tokio::time::timeout(duration * 5, async {
        tokio::join!(engine.run(rx), driver);
    })
    .await
    .expect("engine did not stop");

    engine.publisher().published_count()
}

#[tokio::test]
async fn tick_cadence_ignores_data_arrival() {
    let cadence = FeedbackConfig {
        update_interval_secs: 0.1,
        ..config(5.0)
    };
    let run_for = Duration::from_secs(1);

    let mut silent = Rig::with_config(cadence.clone(), true);
    let quiet_count = publishes_during(&mut silent, run_for, false).await;

    let mut flooded = Rig::with_config(cadence, true);
    let flood_count = publishes_during(&mut flooded, run_for, true).await;
    assert!(flooded.stream().queued() > WINDOW);

    // One search, about ten 100 ms ticks and the final stop
    for count in [quiet_count, flood_count] {
        assert!((6..=14).contains(&count), "{} snapshots in one second", count);
    }
    assert!(
        quiet_count.abs_diff(flood_count) <= 3,
        "silent {} vs flooded {}",
        quiet_count,
        flood_count
    );
}

fn engine_published(path: &std::path::Path) -> bool {
    FeedbackSnapshot::load(path).map_or(false, |s| s.connected)
}
