//! Compile-time type aliases used throughout the core.
//!
//! Every quantity here is already in the reference system's internal units
//! (scale-factor-relative ticks, code velocities, code energies), so plain
//! `f64` is the representation rather than a dimensional-analysis wrapper.

/// A physical (non-integer) quantity, always in internal code units.
pub type Float = f64;

/// A three-component vector of code-unit quantities (position, velocity,
/// acceleration).
pub type Vec3 = glam::DVec3;

/// An integer timeline tick, `Ti`. `0` is the start of the run; `TIMEBASE`
/// is the end.
pub type Tick = u32;

/// A power-of-two timebin index, `0..TIMEBINS`. Bin `b` means a step of
/// `2^b` ticks.
pub type Bin = u8;

/// `2^T`, the number of ticks spanning a full run. `T = 29` is the
/// reference system's default and leaves three spare high bits in a `u32`
/// tick for a driver that wants to fold a snapshot counter into the same
/// integer.
pub const TIMEBASE_EXPONENT: u32 = 29;
pub const TIMEBASE: Tick = 1 << TIMEBASE_EXPONENT;

/// Number of valid timebins, `0..TIMEBINS`. Must satisfy
/// `2^(TIMEBINS-1) <= TIMEBASE`.
pub const TIMEBINS: Bin = 30;

#[cfg(test)]
pub(crate) fn assert_float_is_close(x: Float, y: Float) {
    assert!((x - y).abs() < 10.0 * f64::EPSILON, "{x} != {y}");
}

#[cfg(test)]
pub(crate) fn assert_float_is_close_eps(x: Float, y: Float, eps: Float) {
    assert!((x - y).abs() < eps, "{x} != {y} (eps {eps})");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timebase_fits_a_tick_with_headroom() {
        assert!(TIMEBASE.leading_zeros() >= 2);
        assert!((1u32 << (TIMEBINS as u32 - 1)) <= TIMEBASE);
    }
}
