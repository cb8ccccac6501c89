//! # Polymix Common Library
//!
//! Shared code for the polymix audio mixing synchronizer:
//! - Microsecond timing arithmetic (window durations, byte conversions)
//! - Structured event types (MixerEvent enum) and the EventBus

pub mod events;
pub mod timing;

pub use events::{EventBus, MixerEvent};
