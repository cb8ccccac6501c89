//! Event types for the polymix diagnostics system
//!
//! Every anomaly the synchronizer recovers from is reported out-of-band as a
//! structured event, in addition to being logged. The driver only ever sees
//! a progress/no-progress result from a mix cycle; observers that care about
//! *why* a cycle did or did not produce output subscribe here.
//!
//! # Architecture
//!
//! - **EventBus** (tokio::broadcast): one-to-many, lossy by design. The mix
//!   path must never block on a slow observer, so emission uses
//!   `emit_lossy()` and full channels drop the oldest events.
//! - Events are serde-serializable (tagged by `type`) so they can be shipped
//!   to a log collector or UI unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Diagnostic events emitted by the mixing synchronizer.
///
/// All variants are recoverable conditions; none abort the engine. Each
/// carries the timestamp at which the condition was detected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MixerEvent {
    /// The output clock was implausibly far behind real time and was reset.
    ///
    /// This happens when the pipeline was paused or stalled: the next block
    /// would be dated in the past, so the clock re-derives its start from
    /// the buffered data instead.
    StaleOutputReset {
        /// The rejected next-start date (microseconds)
        next_start_us: i64,
        /// Monotonic "now" at detection time (microseconds)
        now_us: i64,
        /// When the reset occurred
        timestamp: DateTime<Utc>,
    },

    /// An input buffer ended entirely before the mixing window and was dropped.
    PacketInPast {
        /// Stream whose queue held the stale buffer
        stream_id: Uuid,
        /// How far behind the window start the buffer ended (microseconds)
        lateness_us: i64,
        /// When the drop occurred
        timestamp: DateTime<Utc>,
    },

    /// A stream's recorded consumption offset drifted from the expected
    /// offset by more than one frame and was snapped back.
    StartOffsetMismatch {
        /// Stream whose offset drifted
        stream_id: Uuid,
        /// Expected minus recorded offset, in bytes
        delta_bytes: i64,
        /// When the correction occurred
        timestamp: DateTime<Utc>,
    },

    /// A timestamp discontinuity was found between consecutive buffers in
    /// one queue; everything before the gap was dropped.
    BufferHole {
        /// Stream whose queue had the hole
        stream_id: Uuid,
        /// Size of the gap (microseconds)
        gap_us: i64,
        /// When the drop occurred
        timestamp: DateTime<Utc>,
    },

    /// The output block could not be allocated. The cycle was abandoned;
    /// queue state already committed (stale/hole drops) stands.
    AllocationFailed {
        /// Bytes the mixing capability asked for
        requested_bytes: usize,
        /// When the failure occurred
        timestamp: DateTime<Utc>,
    },

    /// One output block was mixed and forwarded to the sink.
    BlockMixed {
        /// Window start date (microseconds)
        start_us: i64,
        /// Window end date (microseconds)
        end_us: i64,
        /// Frames in the block
        frames: u64,
        /// When the block was produced
        timestamp: DateTime<Utc>,
    },
}

impl MixerEvent {
    /// Event type name, matching the serde tag.
    pub fn event_type(&self) -> &'static str {
        match self {
            MixerEvent::StaleOutputReset { .. } => "StaleOutputReset",
            MixerEvent::PacketInPast { .. } => "PacketInPast",
            MixerEvent::StartOffsetMismatch { .. } => "StartOffsetMismatch",
            MixerEvent::BufferHole { .. } => "BufferHole",
            MixerEvent::AllocationFailed { .. } => "AllocationFailed",
            MixerEvent::BlockMixed { .. } => "BlockMixed",
        }
    }
}

/// Broadcast bus for mixer diagnostics.
///
/// Wraps `tokio::sync::broadcast`. Subscribing after events were emitted
/// does not replay them.
pub struct EventBus {
    tx: broadcast::Sender<MixerEvent>,
    capacity: usize,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events.
    pub fn subscribe(&self) -> broadcast::Receiver<MixerEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers.
    ///
    /// Returns `Err` if no subscriber is listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MixerEvent) -> Result<usize, broadcast::error::SendError<MixerEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring the no-subscriber case.
    ///
    /// This is the form the mix path uses: diagnostics must never make a
    /// cycle fail.
    pub fn emit_lossy(&self, event: MixerEvent) {
        let _ = self.tx.send(event);
    }

    /// Current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Configured channel capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
