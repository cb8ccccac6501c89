//! Microsecond timing arithmetic for the mixing synchronizer
//!
//! All dates in polymix are `i64` microseconds on a monotonic timeline.
//! Output windows, byte offsets, and staleness checks are all derived from
//! this one unit, so the conversion rules here must be exact:
//!
//! - Window durations use **truncating** integer division. A 1024-frame
//!   block at 44100 Hz is 23219 us, not 23220.
//! - Interval-to-byte conversions multiply before dividing, in a fixed
//!   order, so two calls with the same inputs always agree to the byte.
//! - Byte offsets snap to frame boundaries by truncating toward zero.
//!
//! # Conversion Flow
//!
//! ```text
//! block frame count + output rate
//!     |
//! block_duration_us() -> mixing window [start_us, end_us)
//!     |
//! interval_to_bytes() -> expected consumption offset per input stream
//!     |
//! snap_to_frame()     -> frame-aligned correction on drift
//! ```

use std::sync::OnceLock;
use std::time::Instant;

/// Microseconds per second, the base of all date arithmetic.
pub const MICROS_PER_SEC: i64 = 1_000_000;

/// Duration in microseconds of an output block of `frames` frames at `rate` Hz.
///
/// Truncating division: the produced window is never longer than the real
/// duration of the block. Rounding up here would make consecutive windows
/// overlap by a sample every few blocks.
///
/// # Examples
///
/// ```
/// use polymix_common::timing::block_duration_us;
///
/// assert_eq!(block_duration_us(1024, 44100), 23_219);
/// assert_eq!(block_duration_us(48000, 48000), 1_000_000);
/// ```
pub fn block_duration_us(frames: u64, rate: u32) -> i64 {
    (frames as i64) * MICROS_PER_SEC / rate as i64
}

/// Number of bytes a stream produces over `duration_us` microseconds.
///
/// Computed as `duration * bytes_per_frame * rate / frame_length / 1_000_000`
/// with the multiplications performed before the divisions, in `i128` so the
/// intermediate product cannot overflow for any realistic rate/duration.
/// The operation order is part of the contract: callers compare offsets
/// computed by this function against recorded consumption offsets, and both
/// sides must truncate identically.
pub fn interval_to_bytes(duration_us: i64, bytes_per_frame: u32, rate: u32, frame_length: u32) -> u64 {
    debug_assert!(duration_us >= 0, "negative interval has no byte length");
    debug_assert!(frame_length > 0, "frame_length must be non-zero");

    let bytes = duration_us as i128 * bytes_per_frame as i128 * rate as i128
        / frame_length as i128
        / MICROS_PER_SEC as i128;
    bytes as u64
}

/// Snap a byte offset down to the nearest frame boundary.
///
/// Truncates toward zero (`bytes / bpf * bpf`). Offsets already on a frame
/// boundary are returned unchanged.
pub fn snap_to_frame(bytes: u64, bytes_per_frame: u32) -> u64 {
    debug_assert!(bytes_per_frame > 0, "bytes_per_frame must be non-zero");
    bytes / bytes_per_frame as u64 * bytes_per_frame as u64
}

/// Process-wide monotonic clock origin.
static CLOCK_ORIGIN: OnceLock<Instant> = OnceLock::new();

/// Current monotonic time in microseconds.
///
/// The timeline starts near zero at first use and never goes backwards.
/// Buffer dates produced against this clock are comparable across threads.
pub fn monotonic_us() -> i64 {
    let origin = CLOCK_ORIGIN.get_or_init(Instant::now);
    origin.elapsed().as_micros() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_duration_truncates() {
        // 1024 frames at 44.1kHz is 23219.95... us; must truncate, not round
        assert_eq!(block_duration_us(1024, 44100), 23_219);
        // Exact divisions are unaffected
        assert_eq!(block_duration_us(441, 44100), 10_000);
        assert_eq!(block_duration_us(0, 44100), 0);
    }

    #[test]
    fn test_interval_to_bytes_basic() {
        // 1 second of 8-byte frames at 48kHz, frame_length 1
        assert_eq!(interval_to_bytes(1_000_000, 8, 48000, 1), 384_000);
        // Half a block: 10ms at 44.1kHz stereo f32 = 441 frames = 3528 bytes
        assert_eq!(interval_to_bytes(10_000, 8, 44100, 1), 3_528);
        assert_eq!(interval_to_bytes(0, 8, 44100, 1), 0);
    }

    #[test]
    fn test_interval_to_bytes_truncates_mid_frame() {
        // 23219us at 44.1kHz = 1023.95... frames worth of bytes; the product
        // truncates at the byte level, not the frame level
        let bytes = interval_to_bytes(23_219, 8, 44100, 1);
        assert_eq!(bytes, 8191); // 23219 * 8 * 44100 / 1e6 = 8191.66 -> 8191
    }

    #[test]
    fn test_interval_to_bytes_frame_length() {
        // Grouped frames (e.g. compressed formats): frame_length divides out
        assert_eq!(interval_to_bytes(1_000_000, 1536, 48000, 1536), 48_000);
    }

    #[test]
    fn test_interval_to_bytes_no_overflow() {
        // An hour of high-rate audio overflows i64 in the intermediate
        // product; i128 must carry it
        let bytes = interval_to_bytes(3_600_000_000, 32, 192_000, 1);
        assert_eq!(bytes, 3600 * 32 * 192_000);
    }

    #[test]
    fn test_snap_to_frame() {
        assert_eq!(snap_to_frame(0, 8), 0);
        assert_eq!(snap_to_frame(8, 8), 8);
        assert_eq!(snap_to_frame(15, 8), 8);
        assert_eq!(snap_to_frame(17, 8), 16);
        // Truncation toward zero, never rounding up to the nearer multiple
        assert_eq!(snap_to_frame(23, 8), 16);
    }

    #[test]
    fn test_monotonic_us_advances() {
        let t1 = monotonic_us();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let t2 = monotonic_us();
        assert!(t2 > t1, "monotonic clock should advance");
    }
}
