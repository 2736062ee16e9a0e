//! The opaque item contract compact-block reconstruction works against
//! (§4.9): anything keyed by a single hash the way the reference node's
//! `CTransaction`, invite transaction, and `Referral` objects are (§9
//! "Shared ownership of transactions and referrals"). Transaction/invite
//! *contents* are out of this spec's scope (§1, Non-goals); `OpaqueItem`
//! carries only what reconstruction needs — identity and the bytes to
//! hand back to the caller — never interpreting either.

use std::io::{Cursor, Read, Write};

use merit_crypto::hash::Hash;
use merit_referral::varint;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ItemDecodeError {
    #[error("unexpected end of item buffer")]
    UnexpectedEof,
}

/// Anything a [`crate::reconstruct::ShortIdStream`] can carry: identified
/// by a single 32-byte hash, independent of what the bytes mean.
pub trait Keyed {
    fn item_hash(&self) -> Hash<32>;
}

/// An item that can additionally be prefilled on the wire (§6.3
/// "compressed tx each"): encoded as its hash plus its raw bytes, since
/// this crate never parses a transaction or invite body.
pub trait WireItem: Keyed + Clone {
    fn encode(&self) -> Vec<u8>;
    fn decode(bytes: &[u8]) -> Result<Self, ItemDecodeError>;
}

/// A transaction or invite-transaction, as far as compact-block
/// reconstruction is concerned: its wire bytes, plus the hash those bytes
/// commit to (witness or non-witness, per the caller's flag — §4.9). This
/// crate never parses `bytes`; the witness/non-witness choice and the
/// script semantics that produce `hash` both live outside this spec.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpaqueItem {
    pub hash: Hash<32>,
    pub bytes: Vec<u8>,
}

impl Keyed for OpaqueItem {
    fn item_hash(&self) -> Hash<32> {
        self.hash
    }
}

impl WireItem for OpaqueItem {
    fn encode(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::with_capacity(32 + self.bytes.len()));
        cursor.write_all(self.hash.as_ref()).unwrap();
        varint::write(&mut cursor, self.bytes.len() as u64);
        cursor.write_all(&self.bytes).unwrap();
        cursor.into_inner()
    }

    fn decode(bytes: &[u8]) -> Result<Self, ItemDecodeError> {
        let mut cursor = Cursor::new(bytes);

        let mut hash = [0u8; 32];
        cursor
            .read_exact(&mut hash)
            .map_err(|_| ItemDecodeError::UnexpectedEof)?;

        let len = varint::read(&mut cursor).map_err(|_| ItemDecodeError::UnexpectedEof)? as usize;
        let mut payload = vec![0u8; len];
        cursor
            .read_exact(&mut payload)
            .map_err(|_| ItemDecodeError::UnexpectedEof)?;

        Ok(Self {
            hash: Hash::from(hash),
            bytes: payload,
        })
    }
}

impl Keyed for merit_referral::Referral {
    fn item_hash(&self) -> Hash<32> {
        self.hash()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opaque_item_round_trips() {
        let item = OpaqueItem {
            hash: Hash::from([7u8; 32]),
            bytes: vec![1, 2, 3, 4, 5],
        };
        let encoded = item.encode();
        let decoded = OpaqueItem::decode(&encoded).unwrap();
        assert_eq!(item, decoded);
    }

    #[test]
    fn truncated_opaque_item_errors() {
        let item = OpaqueItem {
            hash: Hash::from([7u8; 32]),
            bytes: vec![1, 2, 3],
        };
        let encoded = item.encode();
        assert!(matches!(
            OpaqueItem::decode(&encoded[..encoded.len() - 1]),
            Err(ItemDecodeError::UnexpectedEof)
        ));
    }
}
