use std::fmt::Display;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

use rust_decimal::Decimal;

// Decimal::is_sign_positive/negative do not check for zero, which makes them
// easy to misuse ("-0" is sign-negative). These variants treat zero as neither.
pub fn is_positive(d: &Decimal) -> bool {
    d.is_sign_positive() && !d.is_zero()
}

pub fn is_negative(d: &Decimal) -> bool {
    d.is_sign_negative() && !d.is_zero()
}

pub fn dollar_precision_str(d: &Decimal) -> String {
    format!("{:.2}", d)
}

pub fn round_to_cent(d: Decimal) -> Decimal {
    d.round_dp_with_strategy(2, rust_decimal::RoundingStrategy::MidpointAwayFromZero)
}

/// A Decimal which may be null. Used for values which are meaningless in
/// certain contexts (an ACB on a registered affiliate), where any arithmetic
/// performed against a null must itself yield null.
///
/// This takes the place of a NaN-style sentinel. Unlike a float NaN, nulls
/// compare equal to each other, which keeps these usable in tests and maps.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct NullableDecimal(Option<Decimal>);

impl NullableDecimal {
    pub const NULL: NullableDecimal = NullableDecimal(None);

    pub fn zero() -> NullableDecimal {
        NullableDecimal(Some(Decimal::ZERO))
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn value(&self) -> Option<Decimal> {
        self.0
    }

    pub fn unwrap_or_zero(&self) -> Decimal {
        self.0.unwrap_or(Decimal::ZERO)
    }

    /// Divides by a plain Decimal, propagating null.
    /// A zero divisor yields null rather than panicking, since a null result
    /// is always inspected before use.
    pub fn checked_div(&self, divisor: Decimal) -> NullableDecimal {
        match self.0 {
            Some(v) if !divisor.is_zero() => NullableDecimal(Some(v / divisor)),
            _ => NullableDecimal::NULL,
        }
    }
}

impl From<Decimal> for NullableDecimal {
    fn from(d: Decimal) -> Self {
        NullableDecimal(Some(d))
    }
}

impl From<Option<Decimal>> for NullableDecimal {
    fn from(d: Option<Decimal>) -> Self {
        NullableDecimal(d)
    }
}

impl Display for NullableDecimal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0 {
            Some(d) => d.fmt(f),
            None => write!(f, "NaN"),
        }
    }
}

macro_rules! impl_nullable_binop {
    ($trait:ident, $method:ident) => {
        impl $trait for NullableDecimal {
            type Output = NullableDecimal;
            fn $method(self, rhs: NullableDecimal) -> NullableDecimal {
                match (self.0, rhs.0) {
                    (Some(a), Some(b)) => NullableDecimal(Some(a.$method(b))),
                    _ => NullableDecimal::NULL,
                }
            }
        }

        impl $trait<Decimal> for NullableDecimal {
            type Output = NullableDecimal;
            fn $method(self, rhs: Decimal) -> NullableDecimal {
                NullableDecimal(self.0.map(|a| a.$method(rhs)))
            }
        }
    };
}

impl_nullable_binop!(Add, add);
impl_nullable_binop!(Sub, sub);
impl_nullable_binop!(Mul, mul);

impl AddAssign<Decimal> for NullableDecimal {
    fn add_assign(&mut self, rhs: Decimal) {
        *self = *self + rhs;
    }
}

impl SubAssign<Decimal> for NullableDecimal {
    fn sub_assign(&mut self, rhs: Decimal) {
        *self = *self - rhs;
    }
}

impl Neg for NullableDecimal {
    type Output = NullableDecimal;
    fn neg(self) -> NullableDecimal {
        NullableDecimal(self.0.map(|d| -d))
    }
}
