//! The compact-block-facing mempool interface (§2 "MempoolLink
//! (external-facing)"): the lookups compact-block reconstruction needs
//! from the transaction/invite mempool and the separate referral
//! mempool (§4.9: "Transactions and invites share a mempool; referrals
//! have their own"), independent of whatever storage backs either one.

use std::io::{Cursor, Read, Write};

use merit_crypto::hash::Hash;
use merit_referral::{Address, Referral};

use crate::block::{read_delta_indices, write_delta_indices, CompactBlockError};
use crate::item::OpaqueItem;

/// What a concrete mempool must expose for compact-block reconstruction
/// and refill (§2's `txs_by_hash`, `referrals_by_hash/parent`) and for
/// the confirmation events downstream subsystems react to.
pub trait MempoolLink {
    fn tx_by_hash(&self, hash: &Hash<32>) -> Option<OpaqueItem>;
    fn txs(&self) -> Vec<OpaqueItem>;

    fn invite_by_hash(&self, hash: &Hash<32>) -> Option<OpaqueItem>;
    fn invites(&self) -> Vec<OpaqueItem>;

    fn referral_by_hash(&self, hash: &Hash<32>) -> Option<Referral>;
    fn referrals(&self) -> Vec<Referral>;
    fn referrals_by_parent(&self, parent: &Address) -> Vec<Referral>;
}

/// An address crossing from beaconed to confirmed (§3.1's Confirmation
/// entity), raised so subsystems downstream of the mempool/chain state —
/// e.g. the invite lottery's "beaconed invite" filter, §4.5 — can react
/// without polling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmationEvent {
    pub confirmed: Address,
    pub invite_txid: Hash<32>,
    pub height: u64,
}

/// §6.3's `BlockTransactionsRequest`: what the initiator sends once
/// [`crate::reconstruct::ShortIdStream::missing_indices`] is non-empty
/// for one or more of the three streams. Indices are delta-compressed
/// the same way prefilled indices are (§4.9 step 1) and each gap must
/// fit `u16`, same overflow rule as the prefilled list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTransactionsRequest {
    pub block_hash: Hash<32>,
    pub tx_indices: Vec<u32>,
    pub referral_indices: Vec<u32>,
    /// Only populated when the peer signalled Daedalus support (§6.3).
    pub invite_indices: Option<Vec<u32>>,
}

impl BlockTransactionsRequest {
    /// `blockhash:32B | tx_indices (delta-compressed varints) |
    /// referral_indices | [invite_indices if Daedalus]` (§6.3). Whether
    /// the invite list is present is carried by the `daedalus` flag the
    /// peer signalled out of band, same as [`crate::CompactBlock::decode`]
    /// — not re-derivable from the bytes alone.
    pub fn encode(&self) -> Result<Vec<u8>, CompactBlockError> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(self.block_hash.as_ref()).unwrap();
        write_delta_indices(&mut cursor, &self.tx_indices)?;
        write_delta_indices(&mut cursor, &self.referral_indices)?;
        if let Some(invite_indices) = &self.invite_indices {
            write_delta_indices(&mut cursor, invite_indices)?;
        }
        Ok(cursor.into_inner())
    }

    pub fn decode(bytes: &[u8], daedalus: bool) -> Result<Self, CompactBlockError> {
        let mut cursor = Cursor::new(bytes);

        let mut hash_bytes = [0u8; 32];
        cursor
            .read_exact(&mut hash_bytes)
            .map_err(|_| CompactBlockError::UnexpectedEof)?;
        let block_hash = Hash::from(hash_bytes);

        let tx_indices = read_delta_indices(&mut cursor)?;
        let referral_indices = read_delta_indices(&mut cursor)?;
        let invite_indices = if daedalus {
            Some(read_delta_indices(&mut cursor)?)
        } else {
            None
        };

        if cursor.position() as usize != bytes.len() {
            return Err(CompactBlockError::TrailingBytes);
        }

        Ok(Self {
            block_hash,
            tx_indices,
            referral_indices,
            invite_indices,
        })
    }
}

/// An in-memory reference `MempoolLink`, useful for tests and for a node
/// that has not yet grown a real mempool: everything lives in plain
/// `Vec`s, scanned linearly. Not meant for production-sized pools.
#[derive(Clone, Debug, Default)]
pub struct InMemoryMempool {
    pub txs: Vec<OpaqueItem>,
    pub invites: Vec<OpaqueItem>,
    pub referrals: Vec<Referral>,
}

impl MempoolLink for InMemoryMempool {
    fn tx_by_hash(&self, hash: &Hash<32>) -> Option<OpaqueItem> {
        self.txs.iter().find(|t| &t.hash == hash).cloned()
    }

    fn txs(&self) -> Vec<OpaqueItem> {
        self.txs.clone()
    }

    fn invite_by_hash(&self, hash: &Hash<32>) -> Option<OpaqueItem> {
        self.invites.iter().find(|t| &t.hash == hash).cloned()
    }

    fn invites(&self) -> Vec<OpaqueItem> {
        self.invites.clone()
    }

    fn referral_by_hash(&self, hash: &Hash<32>) -> Option<Referral> {
        self.referrals.iter().find(|r| r.hash() == *hash).cloned()
    }

    fn referrals(&self) -> Vec<Referral> {
        self.referrals.clone()
    }

    fn referrals_by_parent(&self, parent: &Address) -> Vec<Referral> {
        self.referrals
            .iter()
            .filter(|r| &r.parent_address == parent)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_memory_mempool_looks_up_by_hash() {
        let tx = OpaqueItem {
            hash: Hash::from([1u8; 32]),
            bytes: vec![1, 2, 3],
        };
        let mempool = InMemoryMempool {
            txs: vec![tx.clone()],
            ..Default::default()
        };
        assert_eq!(mempool.tx_by_hash(&tx.hash), Some(tx));
        assert_eq!(mempool.tx_by_hash(&Hash::from([2u8; 32])), None);
    }

    #[test]
    fn request_wire_round_trip_without_daedalus() {
        let request = BlockTransactionsRequest {
            block_hash: Hash::from([7u8; 32]),
            tx_indices: vec![0, 2, 5],
            referral_indices: vec![1],
            invite_indices: None,
        };
        let encoded = request.encode().unwrap();
        let decoded = BlockTransactionsRequest::decode(&encoded, false).unwrap();
        assert_eq!(request, decoded);
    }

    #[test]
    fn request_wire_round_trip_with_daedalus() {
        let request = BlockTransactionsRequest {
            block_hash: Hash::from([7u8; 32]),
            tx_indices: vec![0],
            referral_indices: vec![],
            invite_indices: Some(vec![3, 4]),
        };
        let encoded = request.encode().unwrap();
        let decoded = BlockTransactionsRequest::decode(&encoded, true).unwrap();
        assert_eq!(request, decoded);
    }
}
