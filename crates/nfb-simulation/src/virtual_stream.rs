//! In-process stream registry
//!
//! `VirtualStreamRegistry` implements the discovery backend traits without a
//! network. Producers announce streams and push frames; consumers resolve and
//! pull exactly as they would against a real backend. Streams can be taken
//! offline or made to fail a read, which is how connection loss is exercised.

use nfb_core::{
    NfbError, NfbResult, SampleFrame, SampleSource, StreamDescriptor, StreamDiscovery, StreamQuery,
};
use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

/// Frames retained per stream before the oldest are dropped
pub const DEFAULT_QUEUE_LIMIT: usize = 8192;

struct Announced {
    descriptor: StreamDescriptor,
    queue: VecDeque<SampleFrame>,
    online: bool,
    generation: u64,
    fail_next_pull: bool,
}

#[derive(Default)]
struct RegistryState {
    streams: Vec<Announced>,
}

impl RegistryState {
    fn find_mut(&mut self, source_id: &str) -> Option<&mut Announced> {
        self.streams
            .iter_mut()
            .find(|s| s.descriptor.source_id == source_id)
    }

    fn online_matching(&self, query: &StreamQuery) -> Vec<StreamDescriptor> {
        self.streams
            .iter()
            .filter(|s| s.online && query.matches(&s.descriptor))
            .map(|s| s.descriptor.clone())
            .collect()
    }
}

#[derive(Default)]
struct Shared {
    state: Mutex<RegistryState>,
    announced: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Discovery backend backed by in-memory queues
#[derive(Clone)]
pub struct VirtualStreamRegistry {
    shared: Arc<Shared>,
    queue_limit: usize,
}

impl VirtualStreamRegistry {
    pub fn new() -> Self {
        Self::with_queue_limit(DEFAULT_QUEUE_LIMIT)
    }

    pub fn with_queue_limit(queue_limit: usize) -> Self {
        VirtualStreamRegistry {
            shared: Arc::new(Shared::default()),
            queue_limit: queue_limit.max(1),
        }
    }

    /// Make a stream visible to discovery, replacing any stream with the same source id
    pub fn announce(&self, descriptor: StreamDescriptor) -> VirtualStream {
        let source_id = descriptor.source_id.clone();
        {
            let mut state = self.shared.lock();
            state.streams.retain(|s| s.descriptor.source_id != source_id);
            state.streams.push(Announced {
                descriptor,
                queue: VecDeque::new(),
                online: true,
                generation: 0,
                fail_next_pull: false,
            });
        }
        self.shared.announced.notify_all();
        debug!(source_id = %source_id, "virtual stream announced");

        VirtualStream {
            shared: Arc::clone(&self.shared),
            source_id,
            queue_limit: self.queue_limit,
        }
    }

    /// Number of streams currently online
    pub fn online_count(&self) -> usize {
        self.shared.lock().streams.iter().filter(|s| s.online).count()
    }
}

impl Default for VirtualStreamRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamDiscovery for VirtualStreamRegistry {
    fn resolve(&self, query: &StreamQuery, timeout: Duration) -> NfbResult<Vec<StreamDescriptor>> {
        let guard = self.shared.lock();
        let (state, _) = self
            .shared
            .announced
            .wait_timeout_while(guard, timeout, |state| {
                state.online_matching(query).is_empty()
            })
            .unwrap_or_else(PoisonError::into_inner);

        Ok(state.online_matching(query))
    }

    fn open(&self, descriptor: &StreamDescriptor) -> NfbResult<Box<dyn SampleSource>> {
        let mut state = self.shared.lock();
        let stream = state
            .find_mut(&descriptor.source_id)
            .filter(|s| s.online)
            .ok_or_else(|| NfbError::stream_lost(&descriptor.name, "stream is not online"))?;

        Ok(Box::new(VirtualInlet {
            shared: Arc::clone(&self.shared),
            source_id: descriptor.source_id.clone(),
            name: descriptor.name.clone(),
            generation: stream.generation,
        }))
    }
}

/// Producer-side handle to an announced stream
#[derive(Clone)]
pub struct VirtualStream {
    shared: Arc<Shared>,
    source_id: String,
    queue_limit: usize,
}

impl VirtualStream {
    fn with_stream<T>(&self, f: impl FnOnce(&mut Announced) -> T) -> Option<T> {
        let mut state = self.shared.lock();
        state.find_mut(&self.source_id).map(f)
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Queue frames for consumers; frames pushed while offline are discarded
    pub fn push_frames(&self, frames: Vec<SampleFrame>) {
        let limit = self.queue_limit;
        self.with_stream(|stream| {
            if !stream.online {
                return;
            }
            stream.queue.extend(frames);
            let excess = stream.queue.len().saturating_sub(limit);
            stream.queue.drain(..excess);
        });
    }

    /// Frames waiting to be pulled
    pub fn queued(&self) -> usize {
        self.with_stream(|stream| stream.queue.len()).unwrap_or(0)
    }

    /// Take the stream offline; open inlets fail from now on
    pub fn disconnect(&self) {
        self.with_stream(|stream| {
            stream.online = false;
            stream.generation += 1;
            stream.queue.clear();
        });
        debug!(source_id = %self.source_id, "virtual stream went offline");
    }

    /// Bring an offline stream back; previously opened inlets stay invalid
    pub fn reconnect(&self) {
        self.with_stream(|stream| stream.online = true);
        self.shared.announced.notify_all();
        debug!(source_id = %self.source_id, "virtual stream back online");
    }

    /// Make the next pull on this stream fail once
    pub fn fail_next_pull(&self) {
        self.with_stream(|stream| stream.fail_next_pull = true);
    }
}

/// Consumer-side connection to a virtual stream.
///
/// Inlets opened on the same stream share one queue.
pub struct VirtualInlet {
    shared: Arc<Shared>,
    source_id: String,
    name: String,
    generation: u64,
}

impl SampleSource for VirtualInlet {
    fn pull(&mut self, max_samples: usize) -> NfbResult<Vec<SampleFrame>> {
        let mut state = self.shared.lock();
        let stream = match state.find_mut(&self.source_id) {
            Some(stream) if stream.online && stream.generation == self.generation => stream,
            _ => return Err(NfbError::stream_lost(&self.name, "stream went offline")),
        };

        if stream.fail_next_pull {
            stream.fail_next_pull = false;
            return Err(NfbError::stream_lost(&self.name, "read failed"));
        }

        let take = max_samples.min(stream.queue.len());
        Ok(stream.queue.drain(..take).collect())
    }
}
