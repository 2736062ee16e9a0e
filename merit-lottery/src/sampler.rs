//! The Efraimidis–Spirakis weighted sample-without-replacement
//! construction both lotteries share (§4.4 point 1-2): `k_i =
//! ln(rand_i) / w_i` where `rand_i` is a uniform draw derived from
//! `H(seed || i)`, keep the `N` entries with the largest `k`.

use merit_crypto::hash::Hasher;
use merit_referral::Address;

/// Deterministically derive a uniform value in `(0, 1]` from `seed`
/// and a candidate's position `i` in the iteration order (§9 "Lottery
/// undo determinism": the iteration order is itself consensus-critical,
/// so callers must pass candidates in a fixed, reproducible order).
pub fn draw_unit_interval(seed: &[u8], index: u64) -> f64 {
    let mut bytes = Vec::with_capacity(seed.len() + 8);
    bytes.extend_from_slice(seed);
    bytes.extend_from_slice(&index.to_le_bytes());
    let digest = Hasher::<256>::hash(&bytes);

    let raw = u64::from_le_bytes(digest[0..8].try_into().unwrap());
    // +1 / +1 keeps the result in (0, 1] so `ln` never sees zero.
    (raw as f64 + 1.0) / (u64::MAX as f64 + 1.0)
}

/// A candidate for weighted sampling: an address and its positive
/// sampling weight (CGS for the ambassador lottery; uniform `1` for the
/// invite lottery, see `crate::invite`).
#[derive(Clone, Copy, Debug)]
pub struct WeightedCandidate {
    pub address: Address,
    pub weight: f64,
}

/// Select up to `n` candidates by largest Efraimidis–Spirakis key.
/// Candidates with non-positive weight never win (their key would be
/// `+-infinity` or `NaN`) and are silently excluded, matching §4.4's
/// "empty candidate set / fewer candidates than N" failure modes: the
/// caller simply gets back fewer winners than asked for.
pub fn select_winners(seed: &[u8], candidates: &[WeightedCandidate], n: usize) -> Vec<Address> {
    let mut keyed: Vec<(f64, Address)> = candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| c.weight > 0.0)
        .map(|(i, c)| {
            let r = draw_unit_interval(seed, i as u64);
            (r.ln() / c.weight, c.address)
        })
        .collect();

    keyed.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    keyed.truncate(n);
    keyed.into_iter().map(|(_, addr)| addr).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_crypto::hash::Hash;

    fn candidate(byte: u8, weight: f64) -> WeightedCandidate {
        WeightedCandidate {
            address: Hash::from([byte; 20]),
            weight,
        }
    }

    #[test]
    fn deterministic_across_runs() {
        let candidates = vec![candidate(1, 10.0), candidate(2, 5.0), candidate(3, 20.0)];
        let a = select_winners(b"seed", &candidates, 2);
        let b = select_winners(b"seed", &candidates, 2);
        assert_eq!(a, b);
    }

    #[test]
    fn never_returns_more_than_requested() {
        let candidates = vec![candidate(1, 10.0), candidate(2, 5.0)];
        assert_eq!(select_winners(b"seed", &candidates, 5).len(), 2);
    }

    #[test]
    fn zero_weight_candidates_never_win() {
        let candidates = vec![candidate(1, 0.0), candidate(2, 0.0)];
        assert!(select_winners(b"seed", &candidates, 2).is_empty());
    }

    #[test]
    fn empty_candidates_yields_empty_winners() {
        assert!(select_winners(b"seed", &[], 5).is_empty());
    }
}
