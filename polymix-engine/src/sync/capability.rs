//! Mixing capabilities
//!
//! The synchronizer decides *when* a block can be produced; a capability
//! decides *how* the aligned input windows become output bytes. Two
//! implementations cover the two framing families:
//!
//! - [`SumMixer`]: linear f32 sample addition across all queues.
//! - [`PassthroughMixer`]: compressed passthrough; the head buffer of the
//!   first queue becomes the output block without touching sample data.
//!
//! A capability's `mix` is handed mutable access to every input queue and is
//! responsible for leaving queue bookkeeping consistent: bytes it folds into
//! the block are consumed via the queue's cursor, and fully used buffers are
//! popped.

use crate::audio::{InputQueue, OutputBlock, TimedBuffer};
use crate::config::MixerConfig;
use crate::error::{Error, Result};

/// Pluggable mixing routine.
pub trait MixCapability: Send + Sync {
    /// Allocate an output block covering `duration_us`.
    ///
    /// `representative` is the head buffer of the first input queue, used by
    /// passthrough implementations to size the block from the input framing.
    /// Allocation failure is reported as `Error::Allocation`; it aborts the
    /// cycle but nothing else.
    fn prepare(
        &self,
        config: &MixerConfig,
        duration_us: i64,
        representative: Option<&TimedBuffer>,
    ) -> Result<OutputBlock>;

    /// Consume the aligned window from every queue and fill the block's
    /// payload. Called only after reconciliation verified every queue covers
    /// the window.
    fn mix(&self, queues: &mut [InputQueue], out: &mut OutputBlock);
}

fn alloc_payload(bytes: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    payload
        .try_reserve_exact(bytes)
        .map_err(|e| Error::Allocation {
            requested_bytes: bytes,
            reason: e.to_string(),
        })?;
    payload.resize(bytes, 0);
    Ok(payload)
}

/// Linear sample-summing mixer for interleaved f32 payloads.
///
/// Output starts silent and each stream's window is added in. Streams are
/// assumed pre-scaled upstream; no volume or clipping logic lives here.
#[derive(Debug, Default)]
pub struct SumMixer;

impl SumMixer {
    pub fn new() -> Self {
        Self
    }
}

fn sum_into(out: &mut [u8], input: &[u8]) {
    debug_assert_eq!(input.len() % 4, 0, "f32 payload split mid-sample");
    for (o, i) in out.chunks_exact_mut(4).zip(input.chunks_exact(4)) {
        let a = f32::from_ne_bytes([o[0], o[1], o[2], o[3]]);
        let b = f32::from_ne_bytes([i[0], i[1], i[2], i[3]]);
        o.copy_from_slice(&(a + b).to_ne_bytes());
    }
}

impl MixCapability for SumMixer {
    fn prepare(
        &self,
        config: &MixerConfig,
        _duration_us: i64,
        _representative: Option<&TimedBuffer>,
    ) -> Result<OutputBlock> {
        let bytes = config.block_bytes();
        Ok(OutputBlock {
            payload: alloc_payload(bytes)?,
            start_us: 0,
            end_us: 0,
            frames: config.block_frames,
        })
    }

    fn mix(&self, queues: &mut [InputQueue], out: &mut OutputBlock) {
        let len = out.payload.len();
        for queue in queues.iter_mut() {
            debug_assert!(queue.format().linear, "SumMixer requires linear streams");
            let mut pos = 0usize;
            let payload = &mut out.payload;
            queue.consume_linear(len, |chunk| {
                sum_into(&mut payload[pos..pos + chunk.len()], chunk);
                pos += chunk.len();
            });
        }
    }
}

/// Passthrough mixer for non-linear (compressed) streams.
///
/// Consumes exactly one head buffer per cycle from the first queue and moves
/// its payload into the output block, no copy, no sample arithmetic. Meant
/// for single-input passthrough pipelines.
#[derive(Debug, Default)]
pub struct PassthroughMixer;

impl PassthroughMixer {
    pub fn new() -> Self {
        Self
    }
}

impl MixCapability for PassthroughMixer {
    fn prepare(
        &self,
        config: &MixerConfig,
        _duration_us: i64,
        representative: Option<&TimedBuffer>,
    ) -> Result<OutputBlock> {
        // Sized from the input buffer: compressed frames dictate their own
        // length, not the output framing.
        let bytes = representative.map(|b| b.len()).unwrap_or(0);
        Ok(OutputBlock {
            payload: alloc_payload(bytes)?,
            start_us: 0,
            end_us: 0,
            frames: config.block_frames,
        })
    }

    fn mix(&self, queues: &mut [InputQueue], out: &mut OutputBlock) {
        if let Some(head) = queues.first_mut().and_then(|q| q.take_head()) {
            out.payload = head.into_payload();
        }
    }
}
