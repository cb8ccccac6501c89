//! The mixing synchronizer and its pluggable seams.

pub mod capability;
pub mod clock;
pub mod sink;
pub mod synchronizer;

pub use capability::{MixCapability, PassthroughMixer, SumMixer};
pub use clock::OutputClock;
pub use sink::{CollectingSink, NullSink, OutputSink};
pub use synchronizer::Synchronizer;
