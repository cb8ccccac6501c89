//! # Polymix Engine
//!
//! Multi-stream audio mixing synchronizer.
//!
//! **Purpose:** Given several independently-produced, timestamped streams of
//! decoded audio, decide when enough contiguous data exists to produce one
//! fixed-size output block, reconcile timing drift and discontinuities
//! between streams, and hand the aligned data to a pluggable mixing
//! capability.
//!
//! **Architecture:** One coarse lock guards the output clock and all input
//! queues for the duration of a mix cycle. Producers append timestamped
//! buffers under the same lock (briefly); an external driver polls
//! [`Synchronizer::try_mix_once`] until it reports no progress. Sample
//! arithmetic, device output, and decoding live behind the
//! [`MixCapability`](sync::MixCapability) and
//! [`OutputSink`](sync::OutputSink) seams.

pub mod audio;
pub mod config;
pub mod error;
pub mod sync;

pub use config::MixerConfig;
pub use error::{Error, Result};
pub use sync::Synchronizer;
