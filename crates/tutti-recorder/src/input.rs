//! Live capture input.

use arc_swap::ArcSwap;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One block of planar samples, one `Vec` per channel.
pub type AudioBlock = Vec<Vec<f32>>;

/// Unique identifier for an input track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackId(pub u64);

impl TrackId {
    pub fn generate() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub id: TrackId,
    pub label: String,
}

struct Inner {
    sample_rate: u32,
    channel_count: Option<u16>,
    tracks: ArcSwap<Vec<TrackInfo>>,
    revision: AtomicU64,
    subscribers: Mutex<Vec<Sender<AudioBlock>>>,
    overflowed: AtomicU64,
}

/// A multichannel source of sample blocks.
///
/// Blocks pushed into the input are fanned out to every subscriber. A
/// subscriber that falls behind loses blocks; the losses are counted in
/// [`overflowed`](Self::overflowed). Cloning yields another handle to the
/// same input.
#[derive(Clone)]
pub struct MediaInput {
    inner: Arc<Inner>,
}

impl MediaInput {
    /// An input with one track.
    pub fn new(sample_rate: u32, channel_count: u16) -> Self {
        let input = Self::without_tracks(sample_rate, Some(channel_count));
        input.add_track("default");
        input
    }

    /// An input with no tracks. `channel_count: None` leaves the layout to
    /// the consumer.
    pub fn without_tracks(sample_rate: u32, channel_count: Option<u16>) -> Self {
        Self {
            inner: Arc::new(Inner {
                sample_rate,
                channel_count,
                tracks: ArcSwap::from_pointee(Vec::new()),
                revision: AtomicU64::new(0),
                subscribers: Mutex::new(Vec::new()),
                overflowed: AtomicU64::new(0),
            }),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channel_count(&self) -> Option<u16> {
        self.inner.channel_count
    }

    /// Lock-free snapshot of the current tracks.
    pub fn tracks(&self) -> Arc<Vec<TrackInfo>> {
        self.inner.tracks.load_full()
    }

    pub fn has_tracks(&self) -> bool {
        !self.inner.tracks.load().is_empty()
    }

    /// Incremented on every track change.
    pub fn track_revision(&self) -> u64 {
        self.inner.revision.load(Ordering::Acquire)
    }

    pub fn add_track(&self, label: impl Into<String>) -> TrackId {
        let track = TrackInfo {
            id: TrackId::generate(),
            label: label.into(),
        };
        let id = track.id;
        self.inner.tracks.rcu(|tracks| {
            let mut tracks = (**tracks).clone();
            tracks.push(track.clone());
            tracks
        });
        self.inner.revision.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(track = id.0, "input track added");
        id
    }

    /// Returns `false` if no such track exists.
    pub fn remove_track(&self, id: TrackId) -> bool {
        let previous = self.inner.tracks.rcu(|tracks| {
            tracks
                .iter()
                .filter(|track| track.id != id)
                .cloned()
                .collect::<Vec<_>>()
        });
        let removed = previous.iter().any(|track| track.id == id);
        if removed {
            self.inner.revision.fetch_add(1, Ordering::AcqRel);
            tracing::debug!(track = id.0, "input track removed");
        }
        removed
    }

    /// Receive blocks pushed from now on, queueing at most `capacity`.
    pub fn subscribe(&self, capacity: usize) -> Receiver<AudioBlock> {
        let (tx, rx) = bounded(capacity.max(1));
        self.inner.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.lock().len()
    }

    /// Deliver a block to every subscriber. Returns how many received it.
    pub fn push(&self, block: AudioBlock) -> usize {
        let mut subscribers = self.inner.subscribers.lock();
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(block.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                self.inner.overflowed.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        delivered
    }

    /// Blocks dropped because a subscriber's queue was full.
    pub fn overflowed(&self) -> u64 {
        self.inner.overflowed.load(Ordering::Relaxed)
    }
}

/// Split interleaved samples into a planar block. A trailing partial frame
/// is dropped.
pub fn deinterleave(samples: &[f32], channel_count: usize) -> AudioBlock {
    let channel_count = channel_count.max(1);
    let frames = samples.len() / channel_count;
    let mut block = vec![Vec::with_capacity(frames); channel_count];
    for frame in samples.chunks_exact(channel_count) {
        for (channel, &sample) in block.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    block
}

impl std::fmt::Debug for MediaInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaInput")
            .field("sample_rate", &self.inner.sample_rate)
            .field("channel_count", &self.inner.channel_count)
            .field("tracks", &self.tracks().len())
            .finish()
    }
}
