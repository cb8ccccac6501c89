//! Audio data structures: timed buffers, output blocks, input queues.

pub mod queue;
pub mod types;

pub use queue::InputQueue;
pub use types::{OutputBlock, StreamFormat, TimedBuffer};
