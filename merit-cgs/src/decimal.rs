//! The concrete [`FixedPrecision`] backend this crate computes with, plus
//! the handful of helpers `merit-math` doesn't implement directly (there is
//! no `Add`, only `Sub`/`Neg`/`Mul`/`Div`).

pub use merit_math::math::{FixedPrecision, DEFAULT_PRECISION};

#[cfg(feature = "gmp")]
pub use merit_math::math_gmp::Decimal;

#[cfg(all(feature = "num", not(feature = "gmp")))]
pub use merit_math::math_num::Decimal;

pub fn zero() -> Decimal {
    Decimal::from(0i64)
}

pub fn one() -> Decimal {
    Decimal::from(1i64)
}

pub fn add(a: &Decimal, b: &Decimal) -> Decimal {
    a - &(-b.clone())
}

pub fn from_u64(n: u64) -> Decimal {
    Decimal::from(n)
}
