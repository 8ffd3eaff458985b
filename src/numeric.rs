//! Numeric helpers shared by every formula.
//!
//! All functions here are total: bad data produces a neutral number, never
//! a panic. Stat values are `i64`; intermediate multipliers are `f64`.

use crate::data::GameData;

/// Constant table holding global tuning values.
pub const GLOBALS_TABLE: &str = "globals";

/// Key of the legacy leech tuning constant, expressed as a percentage.
pub const LEGACY_LEECH_EFFECTIVENESS: &str = "legacy_leech_effectiveness";

/// Values that can be rounded to a stat value.
///
/// Floats round half away from zero; integers pass through unchanged.
pub trait RoundStat {
    /// Round to the nearest stat value.
    fn round_stat(self) -> i64;
}

impl RoundStat for f64 {
    fn round_stat(self) -> i64 {
        // `as` saturates on overflow and maps NaN to 0.
        self.round() as i64
    }
}

impl RoundStat for f32 {
    fn round_stat(self) -> i64 {
        self.round() as i64
    }
}

impl RoundStat for i64 {
    fn round_stat(self) -> i64 {
        self
    }
}

impl RoundStat for i32 {
    fn round_stat(self) -> i64 {
        i64::from(self)
    }
}

/// Round half away from zero.
///
/// # Examples
///
/// ```rust
/// use vstat::numeric::round;
///
/// assert_eq!(round(2.5), 3);
/// assert_eq!(round(-2.5), -3);
/// assert_eq!(round(2.4), 2);
/// assert_eq!(round(7_i64), 7);
/// ```
pub fn round<T: RoundStat>(x: T) -> i64 {
    x.round_stat()
}

/// Convert a percentage into a multiplier, floored at zero.
///
/// # Examples
///
/// ```rust
/// use vstat::numeric::scale;
///
/// assert_eq!(scale(150), 1.5);
/// assert_eq!(scale(-500), 0.0);
/// ```
pub fn scale(percent: i64) -> f64 {
    (percent as f64 / 100.0).max(0.0)
}

/// Integer division that returns 0 instead of trapping.
///
/// Truncates toward zero. A zero divisor and the overflowing
/// `i64::MIN / -1` both yield 0.
///
/// # Examples
///
/// ```rust
/// use vstat::numeric::divide;
///
/// assert_eq!(divide(7, 2), 3);
/// assert_eq!(divide(-7, 2), -3);
/// assert_eq!(divide(7, 0), 0);
/// ```
pub fn divide(a: i64, b: i64) -> i64 {
    a.checked_div(b).unwrap_or(0)
}

/// Multiply a value by `scale(percent)` and round.
///
/// `apply_scale(value, 100 + increased)` is the standard way to apply a
/// summed increased/reduced modifier.
pub fn apply_scale(value: i64, percent: i64) -> i64 {
    round(value as f64 * scale(percent))
}

/// Convert a percentage into permyriad (1/100 of a percent).
pub fn percent_to_permyriad(percent: i64) -> i64 {
    percent.saturating_mul(100)
}

/// Convert permyriad back into whole percent, truncating.
pub fn permyriad_to_percent(permyriad: i64) -> i64 {
    divide(permyriad, 100)
}

fn legacy_leech_effectiveness(data: &GameData) -> Option<f64> {
    let value = data.constant(GLOBALS_TABLE, LEGACY_LEECH_EFFECTIVENESS);
    if value.is_none() {
        tracing::debug!(
            table = GLOBALS_TABLE,
            key = LEGACY_LEECH_EFFECTIVENESS,
            "missing leech tuning constant, legacy leech degrades to zero"
        );
    }
    value
}

/// Rescale a legacy permyriad leech value by the global tuning constant.
///
/// Returns permyriad. A missing constant yields 0.
pub fn legacy_leech_from_permyriad(permyriad: i64, data: &GameData) -> i64 {
    match legacy_leech_effectiveness(data) {
        Some(effectiveness) => round(permyriad as f64 * effectiveness / 100.0),
        None => 0,
    }
}

/// Rescale a legacy percent leech value by the global tuning constant.
///
/// Returns permyriad. A missing constant yields 0.
///
/// # Examples
///
/// ```rust
/// use vstat::GameData;
/// use vstat::numeric::{legacy_leech_from_percent, GLOBALS_TABLE, LEGACY_LEECH_EFFECTIVENESS};
///
/// let data = GameData::new().with_constant(GLOBALS_TABLE, LEGACY_LEECH_EFFECTIVENESS, 50.0);
/// // 2% leech authored under the old convention is now 1% = 100 permyriad.
/// assert_eq!(legacy_leech_from_percent(2, &data), 100);
/// assert_eq!(legacy_leech_from_percent(2, GameData::empty()), 0);
/// ```
pub fn legacy_leech_from_percent(percent: i64, data: &GameData) -> i64 {
    legacy_leech_from_permyriad(percent_to_permyriad(percent), data)
}
