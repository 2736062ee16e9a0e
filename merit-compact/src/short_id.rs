//! Short transaction/referral/invite IDs (§4.9, §6.3): 6-byte siphash
//! truncations keyed by the block that carries them, so the same item
//! gets a different short ID in every compact block it appears in.

use merit_crypto::hash::Hash;
use merit_crypto::sha256::sha256;
use merit_crypto::siphash::SipKeys;
use merit_consensus::BlockHeader;

pub type ShortId = [u8; 6];

/// `(k0, k1)` = the low 128 bits of `SHA-256(header || nonce)` (§4.9).
pub fn short_id_keys(header: &BlockHeader, nonce: u64) -> SipKeys {
    let mut preimage = header.encode().to_vec();
    preimage.extend_from_slice(&nonce.to_le_bytes());
    let digest = sha256(&preimage);
    SipKeys::from_seed(&digest[0..16])
}

/// Truncate `siphash(keys, hash)` to 6 bytes: 4 low bytes, then 2 high
/// bytes (§6.3: "Short IDs are serialised as 4 low bytes then 2 high
/// bytes").
pub fn short_id(keys: &SipKeys, hash: &Hash<32>) -> ShortId {
    let full = keys.hash_bytes(hash.as_ref());
    let mut out = [0u8; 6];
    out[0..4].copy_from_slice(&(full as u32).to_le_bytes());
    out[4..6].copy_from_slice(&((full >> 32) as u16).to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash::from([1u8; 32]),
            merkle_root: Hash::from([2u8; 32]),
            time: 0,
            bits: 0x1d00ffff,
            nonce: 7,
        }
    }

    #[test]
    fn deterministic_for_the_same_header_and_nonce() {
        let keys_a = short_id_keys(&header(), 42);
        let keys_b = short_id_keys(&header(), 42);
        let hash = Hash::from([9u8; 32]);
        assert_eq!(short_id(&keys_a, &hash), short_id(&keys_b, &hash));
    }

    #[test]
    fn different_nonce_changes_the_short_id() {
        let keys_a = short_id_keys(&header(), 42);
        let keys_b = short_id_keys(&header(), 43);
        let hash = Hash::from([9u8; 32]);
        assert_ne!(short_id(&keys_a, &hash), short_id(&keys_b, &hash));
    }
}
