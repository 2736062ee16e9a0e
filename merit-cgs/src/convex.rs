//! The convex weighting function §4.2 folds subtree contribution ratios
//! through before differencing them into an `ExpectedValue`.

use crate::decimal::{add, one, Decimal, FixedPrecision};
use crate::params::CgsParams;

/// `ConvexF(x) = B*x + (1-B)*x^(1+S)`, `0 <= B, S <= 1`.
///
/// Blends a linear term (pure proportional share) with a sub-linear power
/// term that favours broader, shallower referral trees over a single deep
/// chain holding the same aggregate value.
///
/// `x` is expected strictly positive: the backends implement `x^y` as
/// `exp(y * ln x)`, and their `ln` is undefined at `x <= 0`. Callers divide
/// a subtree contribution by the root's, so this only matters for a
/// all-zero-balance subtree; [`crate::context::CgsContext`] treats that
/// case as a score of zero before ever calling in here.
pub fn convex_f(params: &CgsParams, x: &Decimal) -> Decimal {
    let linear = &params.b * x;

    let one_minus_b = &one() - &params.b;
    let exponent = add(&one(), &params.s);
    let powered = x.pow(&exponent);
    let sublinear = &one_minus_b * &powered;

    add(&linear, &sublinear)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(b: i64, s: i64) -> CgsParams {
        CgsParams {
            coin_maturity: 1,
            new_coin_maturity: 1,
            b: Decimal::from(b),
            s: Decimal::from(s),
        }
    }

    #[test]
    fn pure_linear_weight_is_identity() {
        let p = params(1, 0);
        let x = Decimal::from(7i64);
        let out = convex_f(&p, &x);
        assert_eq!(out.floor_to_i64(), 7);
    }

    #[test]
    fn sublinear_weight_shrinks_large_ratios_towards_linear() {
        // at x == 1 (own subtree == whole network) both terms collapse to 1
        // regardless of B/S: ConvexF(1) == 1.
        let p = params(0, 1);
        let x = Decimal::from(1i64);
        let out = convex_f(&p, &x);
        assert_eq!(out.floor_to_i64(), 1);
    }
}
