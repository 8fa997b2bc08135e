//! Microsecond time helpers.
//!
//! Every public timestamp in clipforge is an unsigned count of microseconds.
//! Container timestamps are stored in per-track timescale ticks and converted
//! here with 128-bit intermediates so long files cannot overflow.

/// Microseconds per second.
pub const MICROS_PER_SECOND: u64 = 1_000_000;

/// Convert timescale ticks to microseconds, rounding to nearest.
///
/// A zero timescale yields zero.
pub fn ticks_to_micros(ticks: u64, timescale: u32) -> u64 {
    if timescale == 0 {
        return 0;
    }
    let ts = timescale as u128;
    ((ticks as u128 * MICROS_PER_SECOND as u128 + ts / 2) / ts) as u64
}
