/*!
# Fixed-precision decimal arithmetic for CGS scoring

The CGS engine (merit-cgs) mixes aged-balance integer math with `ln` and
the convex `ConvexF` weighting function; §4.2 requires all of that to run
at >= 100-bit (here: 50 significant decimal digit) precision in a single
big-decimal type, floored to an integer exactly once at the boundary. This
module defines the shared [`FixedPrecision`] contract; `math_gmp` and
`math_num` are independent backends implementing it over different
bignum crates, selected by Cargo feature.
 */

use std::ffi::NulError;

use thiserror::Error;

/// Decimal digits of precision every [`FixedPrecision`] backend defaults
/// to; matches the reference implementation's `cpp_dec_float_50` and
/// comfortably clears the >= 100-bit floor from §4.2.
pub const DEFAULT_PRECISION: u64 = 50;

#[derive(Error, Debug)]
pub enum Error {
    #[error("string did not match the fixed-point digit grammar")]
    RegexFailure(#[from] regex::Error),
    #[error("string contained an embedded NUL byte")]
    Nul(#[from] NulError),
}

/// Result of a bounded-iteration comparison between `exp(x)` and a target
/// value (see [`FixedPrecision::exp_cmp`]): whether the series had
/// converged enough within `max_n` terms to settle the comparison.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpOrdering {
    GT,
    LT,
    UNKNOWN,
}

/// Outcome of [`FixedPrecision::exp_cmp`]: the partial Taylor sum after
/// `iterations` terms, and whether that partial sum, plus its Lagrange
/// remainder bound, was enough to decide the comparison.
#[derive(Clone, Debug)]
pub struct ExpCmpOrdering<D> {
    pub iterations: u64,
    pub estimation: ExpOrdering,
    pub approx: D,
}

/// A fixed-point decimal with a configurable number of fractional digits,
/// supporting the transcendental operations the CGS engine's convex
/// weighting (§4.2) needs: `ln`, `exp`, `pow`, and a bounded `exp`
/// comparison used to decide convergence without computing a full `ln`.
pub trait FixedPrecision: Sized {
    fn new(precision: u64) -> Self;
    fn from_str(s: &str, precision: u64) -> Result<Self, Error>;
    fn precision(&self) -> u64;
    fn exp(&self) -> Self;
    fn ln(&self) -> Self;
    fn pow(&self, rhs: &Self) -> Self;
    fn exp_cmp(&self, max_n: u64, bound_self: i64, compare: &Self) -> ExpCmpOrdering<Self>;

    /// truncate to the integer part, i.e. floor for the non-negative
    /// quantities (aged balances, CGS, contributions) this type is used
    /// for in practice. The one point at which §4.2's "floor exactly once
    /// at the boundary" numeric policy is applied.
    fn floor_to_i64(&self) -> i64;
}
