//! Per-stream input queue
//!
//! Ordered holding area for not-yet-mixed timed buffers belonging to one
//! source stream. The producer (a decoder thread) appends at the back; the
//! synchronizer pops from the front and tracks how far into the head buffer
//! previous output blocks already reached.
//!
//! The consumption cursor is an explicit byte offset into the head buffer,
//! always reset when the head buffer changes. `None` means "unset, derive
//! from the next window start"; the synchronizer initializes it during
//! offset alignment.

use std::collections::VecDeque;

use uuid::Uuid;

use super::types::{StreamFormat, TimedBuffer};

/// FIFO of timed buffers for one input stream, plus the consumed-bytes
/// cursor into the head buffer.
#[derive(Debug)]
pub struct InputQueue {
    id: Uuid,
    format: StreamFormat,
    buffers: VecDeque<TimedBuffer>,
    /// Byte offset into the head buffer already folded into previous output
    /// blocks. Only meaningful for linear formats. Invariant: when `Some`,
    /// the value is within bounds of the head buffer.
    mix_offset: Option<usize>,
}

impl InputQueue {
    /// Create an empty queue for a stream with the given framing.
    pub fn new(id: Uuid, format: StreamFormat) -> Self {
        Self {
            id,
            format,
            buffers: VecDeque::new(),
            mix_offset: None,
        }
    }

    /// Stream identifier this queue belongs to.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Framing description of this stream.
    pub fn format(&self) -> StreamFormat {
        self.format
    }

    /// Append a buffer at the back (producer side).
    ///
    /// Buffers are expected in non-decreasing `start_us` order; a violation
    /// is not rejected here; it surfaces as a buffer hole during the next
    /// reconciliation pass.
    pub fn push_back(&mut self, buffer: TimedBuffer) {
        self.buffers.push_back(buffer);
    }

    /// Head buffer, if any.
    pub fn head(&self) -> Option<&TimedBuffer> {
        self.buffers.front()
    }

    /// Iterate buffers front to back.
    pub fn iter(&self) -> impl Iterator<Item = &TimedBuffer> {
        self.buffers.iter()
    }

    /// Number of queued buffers.
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// True if no buffers are queued.
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Remove and return the head buffer, resetting the consumption cursor.
    pub fn pop_front(&mut self) -> Option<TimedBuffer> {
        self.mix_offset = None;
        self.buffers.pop_front()
    }

    /// Drop the first `n` buffers (hole recovery). Resets the cursor.
    pub fn drop_front(&mut self, n: usize) {
        for _ in 0..n {
            if self.buffers.pop_front().is_none() {
                break;
            }
        }
        self.mix_offset = None;
    }

    /// Current consumption cursor into the head buffer.
    pub fn mix_offset(&self) -> Option<usize> {
        self.mix_offset
    }

    /// Set the consumption cursor. Callers must keep it within the head
    /// buffer's bounds.
    pub(crate) fn set_mix_offset(&mut self, offset: Option<usize>) {
        debug_assert!(
            offset.is_none()
                || self
                    .head()
                    .map(|h| offset.unwrap() <= h.len())
                    .unwrap_or(false),
            "mix_offset out of head buffer bounds"
        );
        self.mix_offset = offset;
    }

    /// Consume up to `len` bytes from the front of the queue, starting at
    /// the consumption cursor, feeding each contiguous slice to `f`.
    ///
    /// Fully consumed buffers are popped and dropped; a partially consumed
    /// head leaves the cursor at the first unconsumed byte. Returns the
    /// number of bytes actually consumed (less than `len` only if the queue
    /// ran out, which reconciliation is supposed to have ruled out).
    pub fn consume_linear(&mut self, len: usize, mut f: impl FnMut(&[u8])) -> usize {
        let mut remaining = len;
        while remaining > 0 {
            let offset = self.mix_offset.unwrap_or(0);
            let Some(head) = self.buffers.front() else {
                break;
            };
            let available = head.len().saturating_sub(offset);
            let take = available.min(remaining);
            f(&head.payload()[offset..offset + take]);
            remaining -= take;

            if offset + take >= head.len() {
                self.buffers.pop_front();
                self.mix_offset = None;
            } else {
                self.mix_offset = Some(offset + take);
            }
        }
        len - remaining
    }

    /// Remove and return the head buffer whole (non-linear consumption).
    pub fn take_head(&mut self) -> Option<TimedBuffer> {
        self.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn queue() -> InputQueue {
        InputQueue::new(Uuid::new_v4(), StreamFormat::stereo_f32(44100))
    }

    fn buf(payload: Vec<u8>, start: i64, end: i64) -> TimedBuffer {
        TimedBuffer::new(payload, start, end).unwrap()
    }

    #[test]
    fn test_append_pop_order() {
        let mut q = queue();
        q.push_back(buf(vec![1], 0, 10));
        q.push_back(buf(vec![2], 10, 20));
        assert_eq!(q.len(), 2);

        assert_eq!(q.pop_front().unwrap().payload(), &[1]);
        assert_eq!(q.pop_front().unwrap().payload(), &[2]);
        assert!(q.pop_front().is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn test_pop_resets_cursor() {
        let mut q = queue();
        q.push_back(buf(vec![0u8; 8], 0, 10));
        q.set_mix_offset(Some(4));
        assert_eq!(q.mix_offset(), Some(4));

        q.pop_front();
        assert_eq!(q.mix_offset(), None);
    }

    #[test]
    fn test_consume_within_head() {
        let mut q = queue();
        q.push_back(buf(vec![1, 2, 3, 4, 5, 6, 7, 8], 0, 10));

        let mut seen = Vec::new();
        let consumed = q.consume_linear(5, |s| seen.extend_from_slice(s));
        assert_eq!(consumed, 5);
        assert_eq!(seen, vec![1, 2, 3, 4, 5]);
        assert_eq!(q.mix_offset(), Some(5));
        assert_eq!(q.len(), 1);
    }

    #[test]
    fn test_consume_across_buffers() {
        let mut q = queue();
        q.push_back(buf(vec![1, 2, 3, 4], 0, 10));
        q.push_back(buf(vec![5, 6, 7, 8], 10, 20));
        q.set_mix_offset(Some(2));

        let mut seen = Vec::new();
        let consumed = q.consume_linear(5, |s| seen.extend_from_slice(s));
        assert_eq!(consumed, 5);
        assert_eq!(seen, vec![3, 4, 5, 6, 7]);
        // First buffer fully consumed and popped; cursor inside the second
        assert_eq!(q.len(), 1);
        assert_eq!(q.mix_offset(), Some(3));
    }

    #[test]
    fn test_consume_exact_boundary_pops_and_resets() {
        let mut q = queue();
        q.push_back(buf(vec![1, 2, 3, 4], 0, 10));

        let consumed = q.consume_linear(4, |_| {});
        assert_eq!(consumed, 4);
        assert!(q.is_empty());
        assert_eq!(q.mix_offset(), None);
    }

    #[test]
    fn test_consume_underrun_reports_short_count() {
        let mut q = queue();
        q.push_back(buf(vec![1, 2], 0, 10));

        let consumed = q.consume_linear(10, |_| {});
        assert_eq!(consumed, 2);
        assert!(q.is_empty());
    }

    #[test]
    fn test_drop_front() {
        let mut q = queue();
        q.push_back(buf(vec![1], 0, 10));
        q.push_back(buf(vec![2], 10, 20));
        q.push_back(buf(vec![3], 25, 35));
        q.set_mix_offset(Some(0));

        q.drop_front(2);
        assert_eq!(q.len(), 1);
        assert_eq!(q.head().unwrap().start_us, 25);
        assert_eq!(q.mix_offset(), None);

        // Dropping more than queued is harmless
        q.drop_front(5);
        assert!(q.is_empty());
    }
}
