//! Deterministic fixed-point arithmetic (18 decimal places).
//!
//! Every operation returns `Result` and fails on overflow, underflow, or
//! division by zero instead of wrapping or saturating. Products and scaled
//! quotients are computed through 256-bit intermediates so that
//! `u128 × u128 / u128` never loses high bits.
//!
//! ## Rounding
//! - [`mul_round`] / [`div_round`] round to nearest (ties away from zero is
//!   irrelevant here since all values are unsigned; ties round up).
//! - [`mul_div_u128`] truncates, matching pro-rata share semantics where the
//!   remainder is handled explicitly by the caller.

use primitive_types::U256;
use thiserror::Error;

use crate::scalars::FixedPoint;

/// Fixed-point scale: `1.0 == 1e18`.
pub const FP_SCALE: FixedPoint = 1_000_000_000_000_000_000;

/// Default termination threshold for the fractional-power series.
///
/// Terms smaller than this (in [`FP_SCALE`] units, i.e. `1e-10`) are
/// dropped; the truncation error is on the order of the first dropped term.
pub const DEFAULT_POW_PRECISION: FixedPoint = 100_000_000;

/// Hard cap on fractional-power series terms. Bases close to the
/// convergence boundary fail with [`MathError::NonConvergent`] rather than
/// looping unbounded.
const MAX_POW_TERMS: u32 = 256;

/// Arithmetic failure. Every variant names the operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("arithmetic overflow in {op}")]
    Overflow { op: &'static str },
    #[error("arithmetic underflow in {op}")]
    Underflow { op: &'static str },
    #[error("division by zero in {op}")]
    DivisionByZero { op: &'static str },
    #[error("power series does not converge for base {base} (fractional exponent requires base < 2.0)")]
    NonConvergent { base: FixedPoint },
}

#[inline]
fn narrow(value: U256, op: &'static str) -> Result<u128, MathError> {
    if value > U256::from(u128::MAX) {
        return Err(MathError::Overflow { op });
    }
    Ok(value.as_u128())
}

/// Checked addition for u128 quantities.
#[inline]
pub fn add_u128(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_add(b).ok_or(MathError::Overflow { op: "add_u128" })
}

/// Checked subtraction for u128 quantities.
#[inline]
pub fn sub_u128(a: u128, b: u128) -> Result<u128, MathError> {
    a.checked_sub(b)
        .ok_or(MathError::Underflow { op: "sub_u128" })
}

/// `n × mul / div` with a 256-bit intermediate, truncating.
///
/// The workhorse for pro-rata shares: exact product, floor quotient.
pub fn mul_div_u128(n: u128, mul: u128, div: u128) -> Result<u128, MathError> {
    if div == 0 {
        return Err(MathError::DivisionByZero { op: "mul_div_u128" });
    }
    let product = U256::from(n)
        .checked_mul(U256::from(mul))
        .ok_or(MathError::Overflow { op: "mul_div_u128" })?;
    narrow(product / U256::from(div), "mul_div_u128")
}

/// Fixed-point multiply, rounding to nearest.
pub fn mul_round(a: FixedPoint, b: FixedPoint) -> Result<FixedPoint, MathError> {
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(MathError::Overflow { op: "mul_round" })?;
    let scale = U256::from(FP_SCALE);
    let rounded = product
        .checked_add(scale >> 1)
        .ok_or(MathError::Overflow { op: "mul_round" })?
        / scale;
    narrow(rounded, "mul_round")
}

/// Fixed-point divide, rounding to nearest.
pub fn div_round(a: FixedPoint, b: FixedPoint) -> Result<FixedPoint, MathError> {
    if b == 0 {
        return Err(MathError::DivisionByZero { op: "div_round" });
    }
    let scaled = U256::from(a)
        .checked_mul(U256::from(FP_SCALE))
        .ok_or(MathError::Overflow { op: "div_round" })?;
    let rounded = scaled
        .checked_add(U256::from(b >> 1))
        .ok_or(MathError::Overflow { op: "div_round" })?
        / U256::from(b);
    narrow(rounded, "div_round")
}

/// `base ^ exp` for fixed-point base and exponent.
///
/// The integer part of `exp` is computed by repeated squaring; the
/// fractional part by a truncated binomial series with the
/// [`DEFAULT_POW_PRECISION`] threshold. Fractional exponents require
/// `base < 2.0`; integer exponents have no such restriction.
pub fn pow(base: FixedPoint, exp: FixedPoint) -> Result<FixedPoint, MathError> {
    pow_with_precision(base, exp, DEFAULT_POW_PRECISION)
}

/// [`pow`] with an explicit series termination threshold.
///
/// The result is an approximation: terms of the fractional series smaller
/// than `precision` are dropped, so the absolute error is on the order of
/// `precision / FP_SCALE` of the true value.
pub fn pow_with_precision(
    base: FixedPoint,
    exp: FixedPoint,
    precision: FixedPoint,
) -> Result<FixedPoint, MathError> {
    if exp == 0 {
        return Ok(FP_SCALE);
    }
    if base == 0 {
        return Ok(0);
    }
    let whole = exp / FP_SCALE;
    let frac = exp % FP_SCALE;

    let mut result = pow_whole(base, whole)?;
    if frac != 0 {
        result = mul_round(result, pow_frac(base, frac, precision)?)?;
    }
    Ok(result)
}

/// Exponentiation by squaring for a whole-number exponent.
fn pow_whole(base: FixedPoint, mut n: u128) -> Result<FixedPoint, MathError> {
    let mut result = FP_SCALE;
    let mut square = base;
    while n > 0 {
        if n & 1 == 1 {
            result = mul_round(result, square)?;
        }
        n >>= 1;
        if n > 0 {
            square = mul_round(square, square)?;
        }
    }
    Ok(result)
}

/// Magnitude and sign of `a - b` without leaving unsigned space.
#[inline]
const fn signed_diff(a: u128, b: u128) -> (u128, bool) {
    if a >= b {
        (a - b, false)
    } else {
        (b - a, true)
    }
}

/// Binomial expansion of `(1 + x)^r` where `x = base - 1`, `0 < r < 1`.
///
/// Term recurrence: `t_0 = 1`, `t_k = t_{k-1} · x · (r - (k-1)) / k`.
/// Signs are tracked as (magnitude, negative) pairs. Converges only for
/// `|x| < 1`, i.e. `0 < base < 2.0`.
fn pow_frac(
    base: FixedPoint,
    exp: FixedPoint,
    precision: FixedPoint,
) -> Result<FixedPoint, MathError> {
    if base >= 2 * FP_SCALE {
        return Err(MathError::NonConvergent { base });
    }
    let (x_mag, x_neg) = signed_diff(base, FP_SCALE);

    let mut sum = FP_SCALE;
    let mut term_mag = FP_SCALE;
    let mut term_neg = false;
    let mut k: u32 = 1;
    loop {
        let prev = FP_SCALE * (k - 1) as u128;
        let (factor_mag, factor_neg) = signed_diff(exp, prev);
        term_mag = mul_round(term_mag, x_mag)?;
        term_mag = mul_round(term_mag, factor_mag)?;
        term_mag /= k as u128;
        term_neg ^= x_neg ^ factor_neg;

        if term_mag < precision {
            break;
        }
        sum = if term_neg {
            sub_u128(sum, term_mag)?
        } else {
            add_u128(sum, term_mag)?
        };
        k += 1;
        if k > MAX_POW_TERMS {
            return Err(MathError::NonConvergent { base });
        }
    }
    Ok(sum)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE: FixedPoint = FP_SCALE;

    #[test]
    fn mul_round_identity_at_scale() {
        assert_eq!(mul_round(123_456_789, ONE).unwrap(), 123_456_789);
        assert_eq!(mul_round(0, ONE).unwrap(), 0);
    }

    #[test]
    fn mul_round_rounds_to_nearest() {
        // 3 × 0.5 = 1.5 → 2, 1 × 0.5 = 0.5 → 1 (ties up), 1 × 0.25 → 0
        assert_eq!(mul_round(3, ONE / 2).unwrap(), 2);
        assert_eq!(mul_round(1, ONE / 2).unwrap(), 1);
        assert_eq!(mul_round(1, ONE / 4).unwrap(), 0);
    }

    #[test]
    fn div_round_rounds_to_nearest() {
        // 1 / 3 = 0.333…, nearest representable
        assert_eq!(div_round(ONE, 3 * ONE).unwrap(), 333_333_333_333_333_333);
        // 2 / 3 = 0.666…7 rounds up
        assert_eq!(
            div_round(2 * ONE, 3 * ONE).unwrap(),
            666_666_666_666_666_667
        );
        assert!(matches!(
            div_round(ONE, 0),
            Err(MathError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn mul_div_truncates() {
        assert_eq!(mul_div_u128(10, 1, 3).unwrap(), 3);
        assert_eq!(mul_div_u128(1000, 250, 1000).unwrap(), 250);
        assert!(matches!(
            mul_div_u128(7, 7, 0),
            Err(MathError::DivisionByZero { .. })
        ));
    }

    #[test]
    fn mul_div_survives_wide_products() {
        // u128 × u128 products that would overflow without widening
        let big = u128::MAX / 2;
        assert_eq!(mul_div_u128(big, 4, 4).unwrap(), big);
        assert!(matches!(
            mul_div_u128(u128::MAX, u128::MAX, 1),
            Err(MathError::Overflow { .. })
        ));
    }

    #[test]
    fn add_sub_report_failures() {
        assert!(matches!(
            add_u128(u128::MAX, 1),
            Err(MathError::Overflow { .. })
        ));
        assert!(matches!(sub_u128(1, 2), Err(MathError::Underflow { .. })));
        assert_eq!(sub_u128(add_u128(7, 5).unwrap(), 5).unwrap(), 7);
    }

    #[test]
    fn pow_endpoint_identities() {
        assert_eq!(pow(5 * ONE, 0).unwrap(), ONE);
        assert_eq!(pow(0, ONE).unwrap(), 0);
        assert_eq!(pow(ONE, 37 * ONE + ONE / 7).unwrap(), ONE);
        assert_eq!(pow(123 * ONE, ONE).unwrap(), 123 * ONE);
    }

    #[test]
    fn pow_whole_exponents_are_exact() {
        assert_eq!(pow(2 * ONE, 2 * ONE).unwrap(), 4 * ONE);
        assert_eq!(pow(2 * ONE, 10 * ONE).unwrap(), 1024 * ONE);
        assert_eq!(pow(3 * ONE, 3 * ONE).unwrap(), 27 * ONE);
    }

    #[test]
    fn pow_matches_known_roots() {
        // sqrt(1.5) = 1.224744871391589049…
        let got = pow(ONE + ONE / 2, ONE / 2).unwrap();
        let want: u128 = 1_224_744_871_391_589_049;
        assert!(got.abs_diff(want) < 10_000_000_000, "got {got}");

        // 1.1^2.5 = 1.269058708…
        let got = pow(1_100_000_000_000_000_000, 2_500_000_000_000_000_000).unwrap();
        let want: u128 = 1_269_058_708_000_000_000;
        assert!(got.abs_diff(want) < 10_000_000_000, "got {got}");
    }

    #[test]
    fn pow_fractional_below_one_base() {
        // 0.25^0.5 = 0.5
        let got = pow(ONE / 4, ONE / 2).unwrap();
        assert!(got.abs_diff(ONE / 2) < 10_000_000_000, "got {got}");
    }

    #[test]
    fn pow_rejects_divergent_base() {
        assert!(matches!(
            pow(2 * ONE, ONE / 2),
            Err(MathError::NonConvergent { .. })
        ));
        assert!(matches!(
            pow(5 * ONE, 3 * ONE + ONE / 2),
            Err(MathError::NonConvergent { .. })
        ));
    }

    #[test]
    fn pow_precision_threshold_is_respected() {
        // sqrt(1.44) = 1.2 exactly; a coarse threshold stops the series
        // earlier and stays within its own documented bound
        let base: u128 = 1_440_000_000_000_000_000;
        let want: u128 = 1_200_000_000_000_000_000;
        let coarse = pow_with_precision(base, ONE / 2, ONE / 1000).unwrap();
        let fine = pow(base, ONE / 2).unwrap();
        assert!(coarse.abs_diff(want) < ONE / 200, "coarse {coarse}");
        assert!(fine.abs_diff(want) < 10_000_000_000, "fine {fine}");
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn mul_round_by_one_is_identity(a in 0u128..1_000_000_000_000_000_000_000_000) {
                prop_assert_eq!(mul_round(a, ONE).unwrap(), a);
            }

            #[test]
            fn mul_div_same_divisor_cancels(a in 0u128..u128::MAX / 2, b in 1u128..1_000_000_000) {
                // product is exact in the wide intermediate, so dividing by
                // the multiplier restores the input
                prop_assert_eq!(mul_div_u128(a, b, b).unwrap(), a);
            }

            #[test]
            fn add_then_sub_restores(a in 0u128..u128::MAX / 2, b in 0u128..u128::MAX / 2) {
                prop_assert_eq!(sub_u128(add_u128(a, b).unwrap(), b).unwrap(), a);
            }

            #[test]
            fn pow_exp_one_is_identity(base in 0u128..100_000_000_000_000_000_000_000) {
                prop_assert_eq!(pow(base, ONE).unwrap(), base);
            }

            #[test]
            fn pow_is_monotone_in_the_exponent(
                base in ONE + 1..ONE + ONE / 2,
                exp in 0u128..3 * ONE,
                bump in 1u128..ONE,
            ) {
                // For base > 1 a larger exponent never yields a smaller
                // result (up to the documented series truncation)
                let lo = pow(base, exp).unwrap();
                let hi = pow(base, exp + bump).unwrap();
                prop_assert!(hi + ONE / 1_000_000 >= lo);
            }
        }
    }
}
