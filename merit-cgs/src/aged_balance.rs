//! Age-decay curve shared by the coin-level aged balance and the
//! address-level `beta` discount (§4.2): both are `1 - 1/(age^2 + 1)` with
//! `age` measured in quarters of a maturity window, just applied to
//! different heights and different maturities.

use crate::decimal::{add, one, Decimal, FixedPrecision};

/// `scale(elapsed, maturity) = 1 - 1/((elapsed/(maturity/4))^2 + 1)`.
///
/// Monotonically increasing in `elapsed`, `0` at `elapsed == 0` and
/// asymptotic to `1` as a coin or address ages past its maturity window.
/// A `maturity` under 4 blocks collapses the quarter window to zero and is
/// treated as already fully mature.
pub fn age_scale(elapsed: u64, maturity: u64) -> Decimal {
    let quarter = maturity / 4;
    if quarter == 0 {
        return one();
    }

    let age = Decimal::from(elapsed) / Decimal::from(quarter);
    let age_sq = &age * &age;
    let denom = add(&age_sq, &one());
    let reciprocal = &one() / &denom;
    one() - reciprocal
}

/// Age-decayed value of a single coin (§4.2 point 1: "aged = `⌊scale · v⌋`").
/// Floored here, per coin, before the caller accumulates across a node's
/// unspent outputs — the spec's formula floors each coin individually, not
/// the sum, and the original's `BalanceDecay()` truncates to a `CAmount`
/// the same way before accumulating.
pub fn aged_value(value: u64, coin_height: u64, current_height: u64, maturity: u64) -> i64 {
    let elapsed = current_height.saturating_sub(coin_height);
    let scale = age_scale(elapsed, maturity);
    (&scale * &Decimal::from(value)).floor_to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_coin_has_zero_scale() {
        let scale = age_scale(0, 1_000_000);
        assert_eq!(scale.floor_to_i64(), 0);
    }

    #[test]
    fn scale_is_bounded_by_one() {
        let scale = age_scale(1_000_000_000, 1_000_000);
        assert!(scale <= one());
    }

    #[test]
    fn aged_value_never_exceeds_face_value() {
        let aged = aged_value(1_000_000, 0, 500, 1_000_000);
        assert!(aged <= 1_000_000);
        assert!(aged >= 0);
    }

    #[test]
    fn tiny_maturity_is_immediately_mature() {
        let scale = age_scale(10, 2);
        assert_eq!(scale, one());
    }
}
