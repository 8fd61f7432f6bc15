use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Exact ratio `numerator / denominator` as a Fixed64, clamped to [0, 1].
///
/// A zero denominator yields zero.
#[inline]
pub fn ratio(numerator: u64, denominator: u64) -> Fixed64 {
    if denominator == 0 {
        return Fixed64::ZERO;
    }
    // Q32.32 raw bits of n/d; n <= d keeps the result within 1 << 32.
    let n = numerator.min(denominator) as u128;
    Fixed64::from_bits(((n << 32) / denominator as u128) as i64)
}
