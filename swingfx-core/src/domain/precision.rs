//! Decimal truncation used for every price and volume sent to the broker.

/// Truncate `value` toward zero at `decimals` places.
///
/// `truncate(1.2399, 2) == 1.23` and `truncate(-1.2399, 2) == -1.23`.
/// The result never exceeds `|value|` in magnitude. Binary representation
/// error (`0.29 * 100.0 == 28.999999999999996`) is absorbed only when the
/// corrected step still sits within `|value|`.
pub fn truncate(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    let scale = 10f64.powi(decimals as i32);
    let scaled = value * scale;

    let mut units = (scaled + scaled.signum() * 1e-9).trunc();
    if (units / scale).abs() > value.abs() {
        units = scaled.trunc();
    }
    // `value * scale` may itself round up onto the next step.
    if (units / scale).abs() > value.abs() {
        units -= units.signum();
    }
    units / scale
}

/// Smallest price step for a precision, e.g. 5 decimals → 0.00001.
pub fn step(decimals: u32) -> f64 {
    10f64.powi(-(decimals as i32))
}
