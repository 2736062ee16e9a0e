//! CuckooVerifier (§4.7): the bit-exact checks every implementation MUST
//! agree on. Ported from John Tromp's reference `verify()` (the same
//! interleaved-pair traversal other Cuckoo-family implementations in the
//! wild, e.g. grin's `cuckaroom` verifier, build on) and adapted to this
//! spec's disjoint-halves node space instead of a shared nodemask.

use thiserror::Error;

use merit_crypto::hash::Hash;

use crate::edge::{edge_endpoints, siphash_keys_from_header};

/// §4.7's error enum, minus `OK`: a successful verification is `Ok(())`,
/// the idiomatic Rust way to express "one of these named failures, or
/// none".
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CuckooError {
    #[error("cycle does not have exactly the required number of edges")]
    TooSmall,
    #[error("edge index exceeds 2^edge_bits")]
    TooBig,
    #[error("edge indices not strictly ascending, or the cycle does not close (XOR check failed)")]
    NonMatching,
    #[error("a node appears in more than two proof edges")]
    Branch,
    #[error("traversal could not find the next edge in the cycle")]
    DeadEnd,
    #[error("traversal closed before visiting every proof edge")]
    ShortCycle,
}

/// Verify that `cycle` is a valid `proof_size`-edge simple cycle in the
/// Cuckoo graph derived from `header_hash` at `edge_bits`.
pub fn verify(
    header_hash: &Hash<32>,
    edge_bits: u8,
    proof_size: usize,
    cycle: &[u64],
) -> Result<(), CuckooError> {
    if cycle.len() != proof_size {
        return Err(CuckooError::TooSmall);
    }

    let keys = siphash_keys_from_header(header_hash);
    let limit = 1u64 << edge_bits;

    // uvs[2n] / uvs[2n+1] are the u/v endpoints of proof edge n.
    let mut uvs = vec![0u32; 2 * proof_size];
    let mut xor_u = 0u32;
    let mut xor_v = 0u32;

    for (n, &edge) in cycle.iter().enumerate() {
        if edge >= limit {
            return Err(CuckooError::TooBig);
        }
        if n > 0 && edge <= cycle[n - 1] {
            return Err(CuckooError::NonMatching);
        }
        let (u, v) = edge_endpoints(&keys, edge_bits, edge);
        uvs[2 * n] = u;
        uvs[2 * n + 1] = v;
        xor_u ^= u;
        xor_v ^= v;
    }

    if xor_u != 0 || xor_v != 0 {
        return Err(CuckooError::NonMatching);
    }

    let total = 2 * proof_size;
    let mut i = 0usize;
    let mut visited_edges = 0usize;

    loop {
        let mut j = i;
        let mut matched = None;
        loop {
            j = (j + 2) % total;
            if j == i {
                break;
            }
            if uvs[j] == uvs[i] {
                matched = Some(j);
                break;
            }
        }

        let Some(j) = matched else {
            return Err(CuckooError::DeadEnd);
        };
        if j == i + 1 || (j + 1) % total == i {
            return Err(CuckooError::Branch);
        }

        i = j ^ 1;
        visited_edges += 1;
        if i == 0 {
            break;
        }
    }

    if visited_edges == proof_size {
        Ok(())
    } else {
        Err(CuckooError::ShortCycle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::find_cycle;
    use merit_crypto::hash::Hasher;
    use std::sync::atomic::AtomicBool;

    #[test]
    fn wrong_length_is_too_small() {
        let header_hash = Hasher::<256>::hash(b"merit-genesis");
        assert_eq!(
            verify(&header_hash, 8, 42, &[0u64; 10]),
            Err(CuckooError::TooSmall)
        );
    }

    #[test]
    fn out_of_range_edge_is_too_big() {
        let header_hash = Hasher::<256>::hash(b"merit-genesis");
        let mut cycle = vec![0u64; 42];
        cycle[41] = 1 << 20;
        assert_eq!(
            verify(&header_hash, 8, 42, &cycle),
            Err(CuckooError::TooBig)
        );
    }

    #[test]
    fn solved_cycle_verifies_ok() {
        let header_hash = Hasher::<256>::hash(b"merit-pow-fixture");
        let cancel = AtomicBool::new(false);
        let cycle = find_cycle(&header_hash, 10, 6, &cancel).expect("a short cycle should exist");
        assert_eq!(verify(&header_hash, 10, 6, &cycle), Ok(()));
    }

    #[test]
    fn mutated_edge_fails_verification() {
        let header_hash = Hasher::<256>::hash(b"merit-pow-fixture");
        let cancel = AtomicBool::new(false);
        let mut cycle = find_cycle(&header_hash, 10, 6, &cancel).expect("a short cycle should exist");
        cycle[0] += 1;
        cycle.sort_unstable();
        cycle.dedup();
        if cycle.len() == 6 {
            assert_ne!(verify(&header_hash, 10, 6, &cycle), Ok(()));
        }
    }
}
