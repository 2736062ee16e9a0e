use crate::decimal::Decimal;

/// A single address's own contribution, §4.2 point 2: `c.value = beta *
/// total_balance + aged_balance`, and `c.sub = ln(1 + c.value)` for the
/// sub-linear CGS variant.
#[derive(Clone, Debug)]
pub struct NodeContribution {
    pub value: Decimal,
    pub sub: Decimal,
}

/// `C(A) = c(A) + sum(C(child) for child in children(A))`, accumulated
/// post-order. Carries both the linear and sub-linear running sums so a
/// single traversal produces both CGS and sub-CGS inputs.
#[derive(Clone, Debug)]
pub struct SubtreeContribution {
    pub value: Decimal,
    pub sub: Decimal,
}
