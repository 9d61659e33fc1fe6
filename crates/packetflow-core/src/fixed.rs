use fixed::types::I32F32;

/// Q32.32 fixed-point: 32 integer bits, 32 fractional bits. Used for every
/// traffic quantity (queue, rate, capacity, load) inside the engine.
pub type Fixed64 = I32F32;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Smallest f64 that does not fit in a Fixed64. `Fixed64::MAX` rounds up to
/// exactly this value as an f64, so range checks compare with `>=`.
pub const FIXED64_LIMIT: f64 = 2_147_483_648.0;

/// Convert an f64 to Fixed64. Use only for initialization, never in sim loop.
///
/// Values outside the representable range saturate; NaN maps to zero.
#[inline]
pub fn f64_to_fixed64(v: f64) -> Fixed64 {
    if v.is_nan() {
        return Fixed64::ZERO;
    }
    Fixed64::saturating_from_num(v)
}

/// Convert Fixed64 to f64. Use only for display and the snapshot boundary.
#[inline]
pub fn fixed64_to_f64(v: Fixed64) -> f64 {
    v.to_num::<f64>()
}
