//! Output sinks
//!
//! A sink receives each finished output block. The handoff is
//! fire-and-forget: the synchronizer has already released its lock when
//! `play` runs, so a slow sink delays only the driver, never the producers.

use std::sync::Mutex;

use tracing::trace;

use crate::audio::OutputBlock;

/// Consumer of finished output blocks.
pub trait OutputSink: Send + Sync {
    /// Take ownership of one block. No return value; failures are the
    /// sink's own concern.
    fn play(&self, block: OutputBlock);
}

/// Discards every block. Useful as a default and in benchmarks.
#[derive(Debug, Default)]
pub struct NullSink;

impl OutputSink for NullSink {
    fn play(&self, block: OutputBlock) {
        trace!(
            start_us = block.start_us,
            end_us = block.end_us,
            "discarding output block"
        );
    }
}

/// Accumulates blocks for inspection. Used by tests and the demo binary.
#[derive(Debug, Default)]
pub struct CollectingSink {
    blocks: Mutex<Vec<OutputBlock>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks received so far.
    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    /// True if no block has been received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drain all received blocks.
    pub fn take_all(&self) -> Vec<OutputBlock> {
        std::mem::take(&mut *self.blocks.lock().unwrap())
    }
}

impl OutputSink for CollectingSink {
    fn play(&self, block: OutputBlock) {
        self.blocks.lock().unwrap().push(block);
    }
}
