use crate::decimal::Decimal;

/// Consensus parameters the CGS engine needs from [`NodeContext`](../merit_consensus/struct.NodeContext.html)-shaped
/// configuration: coin maturity windows for the two age-decay curves, and
/// the convex weighting dials `B`/`S`.
#[derive(Clone, Debug)]
pub struct CgsParams {
    /// Blocks until a coin's balance stops being age-discounted.
    pub coin_maturity: u64,
    /// Blocks until a beaconed address itself stops being age-discounted
    /// (the `beta` term in the node contribution).
    pub new_coin_maturity: u64,
    /// `0 <= B <= 1`: weight on the linear term of `ConvexF`.
    pub b: Decimal,
    /// `0 <= S <= 1`: the sub-linear exponent's offset, `x^(1+S)`.
    pub s: Decimal,
}
