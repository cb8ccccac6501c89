//! Output clock
//!
//! Tracks the date the next produced output block must begin at. `None`
//! means "derive from the earliest buffered data": the state at startup,
//! and the state the synchronizer falls back to after detecting that the
//! pipeline stalled.

/// The synchronizer's record of where the next output block begins.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutputClock {
    next_start_us: Option<i64>,
}

impl OutputClock {
    /// A fresh, unset clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// The next block's start date, if set.
    pub fn get(&self) -> Option<i64> {
        self.next_start_us
    }

    /// Record the end of an emitted block as the next start.
    pub fn advance_to(&mut self, end_us: i64) {
        self.next_start_us = Some(end_us);
    }

    /// Forget the schedule; the next cycle derives its start from data.
    pub fn reset(&mut self) {
        self.next_start_us = None;
    }

    /// True if a next start date is recorded.
    pub fn is_set(&self) -> bool {
        self.next_start_us.is_some()
    }
}
