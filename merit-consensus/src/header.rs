//! `BlockHeader` (§3.1, §6.3): the 80-byte hashed/mined header, plus the
//! Cuckoo proof that rides alongside it out-of-band. Wire layout mirrors
//! `merit_referral::referral::Referral`'s `Cursor`-based encode/decode.

use std::io::{Cursor, Read, Write};

use merit_crypto::hash::{Hash, Hasher};
use merit_pow::{verify, CuckooError};
use thiserror::Error;

pub const PROOF_SIZE: usize = 42;
pub const HEADER_BYTES: usize = 80;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of header buffer")]
    UnexpectedEof,
    #[error("trailing bytes after header")]
    TrailingBytes,
}

/// The 80 bytes that are hashed for proof-of-work and chained by
/// `prev_hash`. `nonce` here is the header's own PoW nonce, distinct from
/// the compact-block short-ID salt of the same name in §6.3.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u32,
    pub prev_hash: Hash<32>,
    pub merkle_root: Hash<32>,
    pub time: u32,
    pub bits: u32,
    pub nonce: u32,
}

impl BlockHeader {
    /// `[ version:u32LE | prev_hash:32B | merkle_root:32B | time:u32LE |
    ///  bits:u32LE | nonce:u32LE ]` — exactly [`HEADER_BYTES`] long.
    pub fn encode(&self) -> [u8; HEADER_BYTES] {
        let mut cursor = Cursor::new(Vec::with_capacity(HEADER_BYTES));
        cursor.write_all(&self.version.to_le_bytes()).unwrap();
        cursor.write_all(self.prev_hash.as_ref()).unwrap();
        cursor.write_all(self.merkle_root.as_ref()).unwrap();
        cursor.write_all(&self.time.to_le_bytes()).unwrap();
        cursor.write_all(&self.bits.to_le_bytes()).unwrap();
        cursor.write_all(&self.nonce.to_le_bytes()).unwrap();
        cursor.into_inner().try_into().unwrap()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(bytes);

        let mut version = [0u8; 4];
        cursor
            .read_exact(&mut version)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut prev_hash = [0u8; 32];
        cursor
            .read_exact(&mut prev_hash)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut merkle_root = [0u8; 32];
        cursor
            .read_exact(&mut merkle_root)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut time = [0u8; 4];
        cursor
            .read_exact(&mut time)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut bits = [0u8; 4];
        cursor
            .read_exact(&mut bits)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut nonce = [0u8; 4];
        cursor
            .read_exact(&mut nonce)
            .map_err(|_| Error::UnexpectedEof)?;

        if cursor.position() as usize != bytes.len() {
            return Err(Error::TrailingBytes);
        }

        Ok(Self {
            version: u32::from_le_bytes(version),
            prev_hash: Hash::from(prev_hash),
            merkle_root: Hash::from(merkle_root),
            time: u32::from_le_bytes(time),
            bits: u32::from_le_bytes(bits),
            nonce: u32::from_le_bytes(nonce),
        })
    }

    /// the header hash the Cuckoo graph is keyed on, and that `bits`
    /// bounds via [`crate::retarget::meets_target`]. Blake2b-256, tagged,
    /// matching every other identifier hash in the node (§9 endianness
    /// note aside, nothing elsewhere in the spec asks for double-SHA256
    /// here — that's reserved for the compact-block short-ID salt).
    pub fn hash(&self) -> Hash<32> {
        Hasher::<256>::hash_tagged(&self.encode(), 2)
    }
}

/// The out-of-band Cuckoo proof riding alongside a [`BlockHeader`]:
/// `edge_bits` plus a sorted, exactly-[`PROOF_SIZE`]-long cycle (§3.1:
/// `(edge_bits, cycle[42])`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CuckooProof {
    pub edge_bits: u8,
    pub cycle: Vec<u32>,
}

impl CuckooProof {
    pub fn verify_against(&self, header_hash: &Hash<32>) -> Result<(), CuckooError> {
        if self.cycle.len() != PROOF_SIZE {
            return Err(CuckooError::TooSmall);
        }
        let cycle: Vec<u64> = self.cycle.iter().map(|&e| e as u64).collect();
        verify(header_hash, self.edge_bits, PROOF_SIZE, &cycle)
    }
}

/// A header with its proof attached: what a miner actually produces and
/// what `ConnectBlock` actually validates (§4.7's "header, edge_bits, and
/// a 42-element cycle").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FullBlockHeader {
    pub header: BlockHeader,
    pub proof: CuckooProof,
}

impl FullBlockHeader {
    pub fn verify_pow(&self) -> Result<(), CuckooError> {
        self.proof.verify_against(&self.header.hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash::from([1u8; 32]),
            merkle_root: Hash::from([2u8; 32]),
            time: 1_600_000_000,
            bits: 0x1d00ffff,
            nonce: 42,
        }
    }

    #[test]
    fn wire_round_trip() {
        let header = sample();
        let encoded = header.encode();
        assert_eq!(encoded.len(), HEADER_BYTES);
        let decoded = BlockHeader::decode(&encoded).unwrap();
        assert_eq!(header, decoded);
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        let encoded = sample().encode();
        assert!(matches!(
            BlockHeader::decode(&encoded[..HEADER_BYTES - 1]),
            Err(Error::UnexpectedEof)
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = sample().encode().to_vec();
        encoded.push(0);
        assert!(matches!(
            BlockHeader::decode(&encoded),
            Err(Error::TrailingBytes)
        ));
    }

    #[test]
    fn hash_changes_with_nonce() {
        let mut header = sample();
        let a = header.hash();
        header.nonce += 1;
        let b = header.hash();
        assert_ne!(a, b);
    }
}
