//! Registered unit conversions.
//!
//! Unit names follow the compact form used in raw field names: `gdL` is
//! g/dL, `mmolL` is mmol/L, `fmolcell` is fmol/cell and so on.
//!
//! Arithmetic runs on [`Decimal`] so that decimal lab inputs land on exact
//! midpoints where they should; observations keep storing `f64`.

use rust_decimal::{Decimal, RoundingStrategy};

/// Percentage-of-reference rule identifier.
pub const PERCENTAGE: &str = "percentage";

/// `None` when the result does not fit a [`Decimal`].
type UnitFn = fn(Decimal) -> Option<Decimal>;

const UNIT_CONVERSIONS: &[(&str, &str, UnitFn)] = &[
    ("mmolL", "gL", |v| v.checked_mul(Decimal::new(162, 2))),
    ("umolL", "mgdL", |v| v.checked_mul(Decimal::new(625, 2))),
    ("umolL", "mgL", |v| v.checked_mul(Decimal::new(625, 3))),
    ("gdL", "gL", |v| v.checked_div(Decimal::TEN)),
    ("fmolcell", "pgcell", |v| v.checked_mul(Decimal::new(16114, 3))),
    ("mgmL", "kUIL", |v| v.checked_mul(Decimal::new(53, 1))),
];

/// Look up the conversion for `(from → to)`.
pub fn unit_conversion(from: &str, to: &str) -> Option<UnitFn> {
    UNIT_CONVERSIONS
        .iter()
        .find(|(f, t, _)| *f == from && *t == to)
        .map(|(_, _, conv)| *conv)
}

/// `reference * value / 100`.
pub fn percentage(value: Decimal, reference: Decimal) -> Option<Decimal> {
    reference
        .checked_mul(value)?
        .checked_div(Decimal::ONE_HUNDRED)
}

/// Round to two decimals, ties to even.
pub fn quantize(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}

/// Decimal with the digits `value` prints as, so `2.03` stays `2.03`.
///
/// `None` for NaN and infinities.
pub fn to_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    value
        .to_string()
        .parse()
        .ok()
        .or_else(|| Decimal::from_f64_retain(value))
}

/// Nearest `f64` to `value`.
pub fn to_f64(value: Decimal) -> Option<f64> {
    value.to_string().parse().ok()
}
