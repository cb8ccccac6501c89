//! The mixing synchronizer
//!
//! Decides when enough timestamped data exists across all input queues to
//! produce one fixed-size output block, reconciles each queue against the
//! chosen window, and hands the aligned data to the mixing capability.
//!
//! # Algorithm (one cycle)
//!
//! 1. **Start date.** If the output clock is set but dated before "now",
//!    the pipeline stalled: reset it. If unset, the start is the *maximum*
//!    of every queue's head `start_us`, the latest of the earliest
//!    available samples, so no queue is asked for data it does not have.
//!    Any empty queue means no progress.
//! 2. **End date.** `start + block_frames * 1_000_000 / output_rate`,
//!    truncating.
//! 3. **Reconciliation**, per queue: drop buffers ending before the window
//!    (packet in the past), align the consumption cursor with a one-frame
//!    tolerance (linear streams), then walk the queue verifying contiguous
//!    coverage through the window end, dropping everything before a hole.
//! 4. **Mix.** Allocate the block, let the capability consume the windows,
//!    advance the clock to the window end, release the lock, hand the block
//!    to the sink.
//!
//! Drops performed during a failed cycle are committed, not rolled back:
//! they are safe and idempotent to repeat, and rolling them back would just
//! re-drop the same data next call.
//!
//! # Concurrency
//!
//! One mutex guards the output clock and every queue. Producers take it
//! only to append; a cycle holds it for bounded in-memory work and releases
//! it before the sink call, so device I/O never serializes against appends.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, error, warn};
use uuid::Uuid;

use polymix_common::{timing, EventBus, MixerEvent};

use crate::audio::{InputQueue, StreamFormat, TimedBuffer};
use crate::config::MixerConfig;
use crate::error::{Error, Result};
use crate::sync::capability::MixCapability;
use crate::sync::clock::OutputClock;
use crate::sync::sink::OutputSink;

/// Monotonic "now" in microseconds; injectable so tests control lateness.
type ClockSource = Box<dyn Fn() -> i64 + Send + Sync>;

/// The lock-guarded composite: all structural mutation of queues and clock
/// happens through one acquisition of this state.
struct MixerState {
    queues: Vec<InputQueue>,
    clock: OutputClock,
}

/// Multi-stream mixing synchronizer.
///
/// Reactive and pull-based: an external driver polls
/// [`try_mix_once`](Self::try_mix_once) (or drains with
/// [`run_until_idle`](Self::run_until_idle)) and stops when no progress is
/// reported.
pub struct Synchronizer {
    state: Mutex<MixerState>,
    config: MixerConfig,
    capability: Box<dyn MixCapability>,
    sink: Arc<dyn OutputSink>,
    events: Arc<EventBus>,
    now: ClockSource,
}

impl Synchronizer {
    /// Create a synchronizer using the process monotonic clock.
    pub fn new(
        config: MixerConfig,
        capability: Box<dyn MixCapability>,
        sink: Arc<dyn OutputSink>,
        events: Arc<EventBus>,
    ) -> Result<Self> {
        Self::with_clock_source(config, capability, sink, events, Box::new(timing::monotonic_us))
    }

    /// Create a synchronizer with an explicit clock source.
    pub fn with_clock_source(
        config: MixerConfig,
        capability: Box<dyn MixCapability>,
        sink: Arc<dyn OutputSink>,
        events: Arc<EventBus>,
        now: ClockSource,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(MixerState {
                queues: Vec::new(),
                clock: OutputClock::new(),
            }),
            config,
            capability,
            sink,
            events,
            now,
        })
    }

    /// Register a new input stream, returning its identifier.
    pub fn add_stream(&self, format: StreamFormat) -> Uuid {
        let id = Uuid::new_v4();
        let mut state = self.lock_state();
        state.queues.push(InputQueue::new(id, format));
        debug!(stream_id = %id, "registered input stream");
        id
    }

    /// Append a timed buffer to one stream's queue (producer entry point).
    ///
    /// Takes the mixer lock only for the push. Buffers must arrive in
    /// non-decreasing `start_us` order per stream; violations are not
    /// rejected; they surface as buffer holes.
    pub fn append(&self, stream_id: Uuid, buffer: TimedBuffer) -> Result<()> {
        let mut state = self.lock_state();
        let queue = state
            .queues
            .iter_mut()
            .find(|q| q.id() == stream_id)
            .ok_or(Error::StreamNotFound(stream_id))?;
        queue.push_back(buffer);
        Ok(())
    }

    /// Attempt one mix-and-emit cycle.
    ///
    /// Returns `true` if a block was produced and forwarded, `false` if the
    /// data is insufficient or ill-formed. Never blocks; callers poll.
    pub fn try_mix_once(&self) -> bool {
        let mut state = self.lock_state();

        let Some((start, end)) = self.resolve_window(&mut state) else {
            return false;
        };

        for i in 0..state.queues.len() {
            if !self.reconcile_queue(&mut state.queues[i], start, end) {
                return false;
            }
        }

        let prepared = {
            let representative = state.queues.first().and_then(|q| q.head());
            self.capability.prepare(&self.config, end - start, representative)
        };
        let mut block = match prepared {
            Ok(block) => block,
            Err(e) => {
                // Passthrough blocks are sized from the input buffer, not
                // the output framing; report what was actually requested.
                let requested_bytes = match &e {
                    Error::Allocation { requested_bytes, .. } => *requested_bytes,
                    _ => self.config.block_bytes(),
                };
                error!("output block allocation failed: {e}");
                self.events.emit_lossy(MixerEvent::AllocationFailed {
                    requested_bytes,
                    timestamp: Utc::now(),
                });
                return false;
            }
        };
        block.start_us = start;
        block.end_us = end;

        self.capability.mix(&mut state.queues, &mut block);
        state.clock.advance_to(end);

        // Sink I/O must not serialize against producer appends.
        drop(state);

        self.events.emit_lossy(MixerEvent::BlockMixed {
            start_us: start,
            end_us: end,
            frames: block.frames,
            timestamp: Utc::now(),
        });
        self.sink.play(block);
        true
    }

    /// Drive the synchronizer until no further cycle makes progress.
    ///
    /// Returns the number of blocks produced. This is the driver loop: call
    /// it whenever new data may have arrived.
    pub fn run_until_idle(&self) -> usize {
        let mut blocks = 0;
        while self.try_mix_once() {
            blocks += 1;
        }
        blocks
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, MixerState> {
        self.state.lock().expect("mixer state lock poisoned")
    }

    /// Step 1 and 2: choose the `[start, end)` window for this cycle.
    fn resolve_window(&self, state: &mut MixerState) -> Option<(i64, i64)> {
        let now = (self.now)();
        let mut start = state.clock.get();

        if let Some(next_start) = start {
            if next_start < now {
                // The output is _very_ late. This only happens when the
                // pipeline was paused or stalled; re-derive from data.
                warn!(
                    next_start_us = next_start,
                    now_us = now,
                    "output date is out of range, clearing clock"
                );
                self.events.emit_lossy(MixerEvent::StaleOutputReset {
                    next_start_us: next_start,
                    now_us: now,
                    timestamp: Utc::now(),
                });
                state.clock.reset();
                start = None;
            }
        }

        if start.is_none() {
            // Latest start date available across all queues; every queue
            // must have data for the cycle to run at all.
            let mut max_start: Option<i64> = None;
            for queue in &state.queues {
                let head = queue.head()?;
                max_start = Some(max_start.map_or(head.start_us, |m| m.max(head.start_us)));
            }
            start = max_start;
        }

        let start = start?;
        Some((start, start + self.config.block_duration_us()))
    }

    /// Step 3: reconcile one queue against the window. Returns whether the
    /// queue can cover `[start, end)`. Drops performed here are committed.
    fn reconcile_queue(&self, queue: &mut InputQueue, start: i64, end: i64) -> bool {
        // (a) Drop buffers entirely before the window.
        while let Some(head) = queue.head() {
            if head.end_us >= start {
                break;
            }
            let lateness_us = start - head.end_us;
            warn!(
                stream_id = %queue.id(),
                lateness_us,
                "the mixer got a packet in the past, dropping"
            );
            self.events.emit_lossy(MixerEvent::PacketInPast {
                stream_id: queue.id(),
                lateness_us,
                timestamp: Utc::now(),
            });
            queue.pop_front();
        }
        let Some(head) = queue.head() else {
            return false;
        };

        // (b) Align the consumption cursor (linear streams only).
        let format = queue.format();
        if format.linear {
            let expected = format
                .bytes_for((start - head.start_us).max(0))
                .min(head.len() as u64);
            match queue.mix_offset() {
                None => {
                    // bytes_for() truncates at byte granularity; when the
                    // window start is off this stream's frame grid the raw
                    // offset would land mid-sample. The cursor is never
                    // allowed off the frame grid.
                    let snapped = timing::snap_to_frame(expected, format.bytes_per_frame);
                    queue.set_mix_offset(Some(snapped as usize));
                }
                Some(recorded) => {
                    let delta = expected as i64 - recorded as i64;
                    if delta.abs() > format.bytes_per_frame as i64 {
                        warn!(
                            stream_id = %queue.id(),
                            delta_bytes = delta,
                            "mixer start isn't output start"
                        );
                        self.events.emit_lossy(MixerEvent::StartOffsetMismatch {
                            stream_id: queue.id(),
                            delta_bytes: delta,
                            timestamp: Utc::now(),
                        });
                        // Snap to the nearest frame multiple, truncating.
                        let snapped = timing::snap_to_frame(expected, format.bytes_per_frame);
                        queue.set_mix_offset(Some(snapped as usize));
                    }
                }
            }
        }

        // (c) Verify contiguous coverage through the window end, dropping
        // everything before the first hole found and re-walking.
        loop {
            let Some(head) = queue.head() else {
                return false;
            };
            if head.end_us >= end {
                return true;
            }

            let mut prev_end = head.end_us;
            let mut hole: Option<(usize, i64)> = None;
            let mut covered = false;
            for (index, buffer) in queue.iter().enumerate().skip(1) {
                if buffer.start_us != prev_end {
                    hole = Some((index, buffer.start_us - prev_end));
                    break;
                }
                if buffer.end_us >= end {
                    covered = true;
                    break;
                }
                prev_end = buffer.end_us;
            }

            match hole {
                Some((index, gap_us)) => {
                    warn!(
                        stream_id = %queue.id(),
                        gap_us,
                        dropped = index,
                        "buffer hole, dropping packets"
                    );
                    self.events.emit_lossy(MixerEvent::BufferHole {
                        stream_id: queue.id(),
                        gap_us,
                        timestamp: Utc::now(),
                    });
                    queue.drop_front(index);
                    // Coverage restarts from the buffer after the hole.
                }
                None => return covered,
            }
        }
    }
}
