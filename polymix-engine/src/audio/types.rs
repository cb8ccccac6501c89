//! Core audio data types
//!
//! Defines the timed buffer and output block structures passed through the
//! mixing synchronizer, and the per-stream framing description.
//!
//! **Format:** payloads are opaque bytes to the synchronizer. For linear
//! streams the bytes are interleaved samples addressable at frame
//! granularity; for non-linear streams (compressed passthrough) a buffer is
//! only ever consumed whole.

use crate::error::{Error, Result};
use polymix_common::timing;
use serde::{Deserialize, Serialize};

/// Framing description of one stream.
///
/// Immutable for the lifetime of the stream. The synchronizer assumes all
/// streams were normalized upstream (same rate family, decoded samples);
/// this struct only tells it how to address bytes within a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamFormat {
    /// Sample rate in Hz
    pub rate: u32,

    /// Bytes per frame group
    pub bytes_per_frame: u32,

    /// Frames per frame group (1 for PCM; the SPDIF-style grouped size for
    /// compressed formats)
    #[serde(default = "default_frame_length")]
    pub frame_length: u32,

    /// Whether buffers are byte-addressable at frame granularity.
    ///
    /// Non-linear streams skip offset bookkeeping entirely: each buffer is
    /// an indivisible unit.
    #[serde(default = "default_linear")]
    pub linear: bool,
}

fn default_frame_length() -> u32 {
    1
}

fn default_linear() -> bool {
    true
}

impl StreamFormat {
    /// Interleaved stereo f32 PCM at `rate` Hz, the common case.
    pub fn stereo_f32(rate: u32) -> Self {
        Self {
            rate,
            bytes_per_frame: 8,
            frame_length: 1,
            linear: true,
        }
    }

    /// Bytes this stream spans over `duration_us` microseconds.
    pub fn bytes_for(&self, duration_us: i64) -> u64 {
        timing::interval_to_bytes(duration_us, self.bytes_per_frame, self.rate, self.frame_length)
    }
}

/// A chunk of audio samples tagged with its validity interval.
///
/// Immutable after production. Ownership moves from the producer into
/// exactly one input queue, and from there either into an output block or
/// out of existence when dropped as stale.
#[derive(Debug, Clone)]
pub struct TimedBuffer {
    payload: Vec<u8>,

    /// First microsecond this buffer is valid for
    pub start_us: i64,

    /// One past the last microsecond this buffer is valid for
    pub end_us: i64,
}

impl TimedBuffer {
    /// Create a timed buffer covering `[start_us, end_us)`.
    ///
    /// Returns `Error::InvalidTiming` if the interval is empty or inverted.
    pub fn new(payload: Vec<u8>, start_us: i64, end_us: i64) -> Result<Self> {
        if end_us <= start_us {
            return Err(Error::InvalidTiming(format!(
                "buffer interval [{start_us}, {end_us}) is empty or inverted"
            )));
        }
        Ok(Self {
            payload,
            start_us,
            end_us,
        })
    }

    /// Validity duration in microseconds.
    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }

    /// Payload length in bytes.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True if the payload is empty.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// Payload bytes.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Consume the buffer, yielding its payload without copying.
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}

/// One finished block of output audio.
///
/// Produced once per successful mix cycle, tagged with the window it covers,
/// and handed to the output sink.
#[derive(Debug, Clone)]
pub struct OutputBlock {
    /// Mixed audio payload
    pub payload: Vec<u8>,

    /// Window start date (microseconds)
    pub start_us: i64,

    /// Window end date (microseconds)
    pub end_us: i64,

    /// Frames in this block
    pub frames: u64,
}

impl OutputBlock {
    /// Window duration in microseconds.
    pub fn duration_us(&self) -> i64 {
        self.end_us - self.start_us
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timed_buffer_creation() {
        let buf = TimedBuffer::new(vec![0u8; 64], 1000, 2000).unwrap();
        assert_eq!(buf.start_us, 1000);
        assert_eq!(buf.end_us, 2000);
        assert_eq!(buf.duration_us(), 1000);
        assert_eq!(buf.len(), 64);
        assert!(!buf.is_empty());
    }

    #[test]
    fn test_timed_buffer_rejects_inverted_interval() {
        assert!(TimedBuffer::new(vec![], 2000, 1000).is_err());
        assert!(TimedBuffer::new(vec![], 1000, 1000).is_err());
    }

    #[test]
    fn test_timed_buffer_into_payload() {
        let buf = TimedBuffer::new(vec![1, 2, 3], 0, 10).unwrap();
        assert_eq!(buf.into_payload(), vec![1, 2, 3]);
    }

    #[test]
    fn test_stream_format_bytes_for() {
        let fmt = StreamFormat::stereo_f32(48000);
        assert_eq!(fmt.bytes_for(1_000_000), 48000 * 8);
        assert_eq!(fmt.bytes_for(0), 0);
    }

    #[test]
    fn test_stream_format_defaults_from_toml() {
        let fmt: StreamFormat = toml::from_str("rate = 44100\nbytes_per_frame = 8").unwrap();
        assert_eq!(fmt.frame_length, 1);
        assert!(fmt.linear);
    }

    #[test]
    fn test_output_block_duration() {
        let block = OutputBlock {
            payload: vec![0u8; 16],
            start_us: 100,
            end_us: 350,
            frames: 2,
        };
        assert_eq!(block.duration_us(), 250);
    }
}
