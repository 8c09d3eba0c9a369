use std::fmt::Display;
use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, ToPrimitive, Zero};
use rust_decimal::Decimal;

use crate::util::basic::SError;

// Share counts are exact fractions. Dividends and splits can leave balances
// like 1/3 of a share, which must keep summing to exact totals, so binary
// floats (and even base-10 decimals) are not an option here.

pub fn rational_from_decimal(d: &Decimal) -> BigRational {
    let numer = BigInt::from(d.mantissa());
    let denom = num_traits::pow(BigInt::from(10), d.scale() as usize);
    BigRational::new(numer, denom)
}

pub fn parse_rational(s: &str) -> Result<BigRational, SError> {
    let d = Decimal::from_str(s.trim())
        .map_err(|e| format!("Invalid number '{}': {}", s.trim(), e))?;
    Ok(rational_from_decimal(&d))
}

// Long-divides numer/denom, scaling up by powers of ten until the division
// is exact or max_scale digits have been produced.
fn div_at_scale(r: &BigRational, max_scale: u32) -> (BigInt, BigInt, u32) {
    let denom = r.denom();
    let mut scaled = r.numer().clone();
    let mut scale = 0u32;
    while !(&scaled % denom).is_zero() && scale < max_scale {
        scaled = scaled * 10;
        scale += 1;
    }
    let rem = &scaled % denom;
    let quot = &scaled / denom;
    (quot, rem, scale)
}

/// Converts to Decimal, exactly when representable, otherwise rounding
/// half-away-from-zero at 16 decimal places.
pub fn rational_to_decimal(r: &BigRational) -> Decimal {
    const MAX_SCALE: u32 = 16;
    let (mut quot, rem, scale) = div_at_scale(r, MAX_SCALE);
    if !rem.is_zero() && rem.abs() * 2 >= *r.denom() {
        quot = quot + BigInt::from(if r.is_negative() { -1 } else { 1 });
    }
    quot.to_i128()
        .and_then(|q| Decimal::try_from_i128_with_scale(q, scale).ok())
        .map(|d| d.normalize())
        .unwrap_or(Decimal::MAX)
}

/// Decimal form when the value is exactly representable ("1.25"),
/// num/denom form otherwise ("1/3").
pub fn rational_to_string(r: &BigRational) -> String {
    const MAX_SCALE: u32 = 28;
    let (quot, rem, scale) = div_at_scale(r, MAX_SCALE);
    if rem.is_zero() {
        if let Some(q) = quot.to_i128() {
            if let Ok(d) = Decimal::try_from_i128_with_scale(q, scale) {
                return d.normalize().to_string();
            }
        }
    }
    format!("{}/{}", r.numer(), r.denom())
}

/// An exact ratio of two share quantities. Kept un-divided, since both sides
/// are meaningful to users (eg. "30/100 of sale shares").
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ShareRatio {
    pub numerator: BigRational,
    pub denominator: BigRational,
}

impl ShareRatio {
    pub fn fraction(&self) -> BigRational {
        &self.numerator / &self.denominator
    }

    pub fn to_decimal(&self) -> Decimal {
        rational_to_decimal(&self.fraction())
    }
}

impl Display for ShareRatio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}/{}",
            rational_to_string(&self.numerator),
            rational_to_string(&self.denominator)
        )
    }
}
