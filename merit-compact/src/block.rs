//! `CompactBlock` wire format and reconstruction entry point (§4.9, §6.3):
//! a block reduced to its header, the PoW-nonce-derived short-ID salt,
//! and three independently reconstructed streams — transactions, invites
//! (post-Daedalus only), and referrals. Reconstruction itself is
//! [`crate::reconstruct::ShortIdStream`]'s job; this module owns the wire
//! framing (§6.3) and the Daedalus feature gate.

use std::io::{Cursor, Read, Write};

use merit_consensus::{BlockHeader, HEADER_BYTES};
use merit_crypto::siphash::SipKeys;
use merit_referral::{varint, Referral};
use thiserror::Error;
use tracing::debug;

use crate::item::{ItemDecodeError, Keyed, OpaqueItem, WireItem};
use crate::mempool::{BlockTransactionsRequest, MempoolLink};
use crate::reconstruct::{PrefilledItem, ReconstructError, ShortIdStream};
use crate::short_id::{short_id, short_id_keys, ShortId};

#[derive(Error, Debug)]
pub enum CompactBlockError {
    #[error("unexpected end of compact-block buffer")]
    UnexpectedEof,
    #[error("trailing bytes after compact-block buffer")]
    TrailingBytes,
    #[error(transparent)]
    Header(#[from] merit_consensus::header::Error),
    #[error(transparent)]
    Item(#[from] ItemDecodeError),
    #[error(transparent)]
    Referral(#[from] merit_referral::referral::Error),
    #[error(transparent)]
    Reconstruct(#[from] ReconstructError),
    #[error("delta-compressed index overflowed 16 bits (§4.9)")]
    IndexOverflow,
}

/// §4.9's tuple `(header, nonce, prefilled_txn[], short_tx_ids[],
/// prefilled_inv[], short_inv_ids[], short_ref_ids[])`. `daedalus` is not
/// itself part of the tuple but gates whether the invite fields are
/// present on the wire (§6.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompactBlock {
    pub header: BlockHeader,
    pub nonce: u64,
    pub daedalus: bool,
    pub prefilled_txn: Vec<PrefilledItem<OpaqueItem>>,
    pub short_tx_ids: Vec<ShortId>,
    pub short_ref_ids: Vec<ShortId>,
    pub prefilled_inv: Vec<PrefilledItem<OpaqueItem>>,
    pub short_inv_ids: Vec<ShortId>,
}

/// The outcome of attempting reconstruction: either every stream
/// resolved completely, or a refill request for what's left (§4.9 step
/// 5; §7 "missing-data ... not an error state, just a continuation").
pub enum Reconstruction {
    Complete {
        txn: Vec<OpaqueItem>,
        referrals: Vec<Referral>,
        invites: Option<Vec<OpaqueItem>>,
    },
    NeedMore(BlockTransactionsRequest),
}

pub(crate) fn write_delta_indices(
    cursor: &mut Cursor<Vec<u8>>,
    indices: &[u32],
) -> Result<(), CompactBlockError> {
    varint::write(cursor, indices.len() as u64);
    let mut prev: Option<u32> = None;
    for &index in indices {
        let delta = match prev {
            None => index,
            Some(p) => index - p - 1,
        };
        if delta > u16::MAX as u32 {
            return Err(CompactBlockError::IndexOverflow);
        }
        varint::write(cursor, delta as u64);
        prev = Some(index);
    }
    Ok(())
}

pub(crate) fn read_delta_indices(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u32>, CompactBlockError> {
    let count = varint::read(cursor).map_err(|_| CompactBlockError::UnexpectedEof)? as usize;
    let mut out = Vec::with_capacity(count);
    let mut prev: Option<u32> = None;
    for _ in 0..count {
        let delta = varint::read(cursor).map_err(|_| CompactBlockError::UnexpectedEof)?;
        if delta > u16::MAX as u64 {
            return Err(CompactBlockError::IndexOverflow);
        }
        let index = match prev {
            None => delta as u32,
            Some(p) => p + delta as u32 + 1,
        };
        out.push(index);
        prev = Some(index);
    }
    Ok(out)
}

fn write_prefilled(
    cursor: &mut Cursor<Vec<u8>>,
    prefilled: &[PrefilledItem<OpaqueItem>],
) -> Result<(), CompactBlockError> {
    let indices: Vec<u32> = prefilled.iter().map(|p| p.index).collect();
    write_delta_indices(cursor, &indices)?;
    for p in prefilled {
        let bytes = p.item.encode();
        varint::write(cursor, bytes.len() as u64);
        cursor.write_all(&bytes).unwrap();
    }
    Ok(())
}

fn read_prefilled(cursor: &mut Cursor<&[u8]>) -> Result<Vec<PrefilledItem<OpaqueItem>>, CompactBlockError> {
    let indices = read_delta_indices(cursor)?;
    let mut out = Vec::with_capacity(indices.len());
    for index in indices {
        let len = varint::read(cursor).map_err(|_| CompactBlockError::UnexpectedEof)? as usize;
        let mut bytes = vec![0u8; len];
        cursor
            .read_exact(&mut bytes)
            .map_err(|_| CompactBlockError::UnexpectedEof)?;
        let item = OpaqueItem::decode(&bytes)?;
        out.push(PrefilledItem { index, item });
    }
    Ok(out)
}

fn write_short_ids(cursor: &mut Cursor<Vec<u8>>, ids: &[ShortId]) {
    for id in ids {
        cursor.write_all(id).unwrap();
    }
}

fn read_short_ids(cursor: &mut Cursor<&[u8]>, count: usize) -> Result<Vec<ShortId>, CompactBlockError> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let mut id = [0u8; 6];
        cursor
            .read_exact(&mut id)
            .map_err(|_| CompactBlockError::UnexpectedEof)?;
        out.push(id);
    }
    Ok(out)
}

impl CompactBlock {
    /// the `(k0, k1)` siphash keys every short ID in this block was
    /// computed under (§4.9, §6.3): derived from `header || nonce`, not
    /// from the header's PoW nonce.
    pub fn keys(&self) -> SipKeys {
        short_id_keys(&self.header, self.nonce)
    }

    pub fn tx_total(&self) -> usize {
        self.prefilled_txn.len() + self.short_tx_ids.len()
    }

    pub fn ref_total(&self) -> usize {
        self.short_ref_ids.len()
    }

    pub fn inv_total(&self) -> usize {
        self.prefilled_inv.len() + self.short_inv_ids.len()
    }

    /// `header(80B) | nonce:u64LE | short_tx_id_count:varint |
    /// short_ref_id_count:varint | [short_inv_id_count:varint if
    /// Daedalus] | short_tx_ids | short_ref_ids | [short_inv_ids if
    /// Daedalus] | prefilled_txn | [prefilled_inv if Daedalus]` (§6.3).
    /// Each prefilled list is itself prefixed by a varint count, same as
    /// every other length-prefixed list in this workspace's wire formats
    /// (`Referral::alias`, `BlockUndo`'s vectors).
    pub fn encode(&self) -> Result<Vec<u8>, CompactBlockError> {
        let mut cursor = Cursor::new(Vec::new());
        cursor.write_all(&self.header.encode()).unwrap();
        cursor.write_all(&self.nonce.to_le_bytes()).unwrap();

        varint::write(&mut cursor, self.short_tx_ids.len() as u64);
        varint::write(&mut cursor, self.short_ref_ids.len() as u64);
        if self.daedalus {
            varint::write(&mut cursor, self.short_inv_ids.len() as u64);
        }

        write_short_ids(&mut cursor, &self.short_tx_ids);
        write_short_ids(&mut cursor, &self.short_ref_ids);
        if self.daedalus {
            write_short_ids(&mut cursor, &self.short_inv_ids);
        }

        write_prefilled(&mut cursor, &self.prefilled_txn)?;
        if self.daedalus {
            write_prefilled(&mut cursor, &self.prefilled_inv)?;
        }

        Ok(cursor.into_inner())
    }

    pub fn decode(bytes: &[u8], daedalus: bool) -> Result<Self, CompactBlockError> {
        let mut cursor = Cursor::new(bytes);

        let mut header_bytes = [0u8; HEADER_BYTES];
        cursor
            .read_exact(&mut header_bytes)
            .map_err(|_| CompactBlockError::UnexpectedEof)?;
        let header = BlockHeader::decode(&header_bytes)?;

        let mut nonce_bytes = [0u8; 8];
        cursor
            .read_exact(&mut nonce_bytes)
            .map_err(|_| CompactBlockError::UnexpectedEof)?;
        let nonce = u64::from_le_bytes(nonce_bytes);

        let tx_count = varint::read(&mut cursor).map_err(|_| CompactBlockError::UnexpectedEof)? as usize;
        let ref_count = varint::read(&mut cursor).map_err(|_| CompactBlockError::UnexpectedEof)? as usize;
        let inv_count = if daedalus {
            varint::read(&mut cursor).map_err(|_| CompactBlockError::UnexpectedEof)? as usize
        } else {
            0
        };

        let short_tx_ids = read_short_ids(&mut cursor, tx_count)?;
        let short_ref_ids = read_short_ids(&mut cursor, ref_count)?;
        let short_inv_ids = if daedalus {
            read_short_ids(&mut cursor, inv_count)?
        } else {
            Vec::new()
        };

        let prefilled_txn = read_prefilled(&mut cursor)?;
        let prefilled_inv = if daedalus {
            read_prefilled(&mut cursor)?
        } else {
            Vec::new()
        };

        if cursor.position() as usize != bytes.len() {
            return Err(CompactBlockError::TrailingBytes);
        }

        Ok(Self {
            header,
            nonce,
            daedalus,
            prefilled_txn,
            short_tx_ids,
            short_ref_ids,
            prefilled_inv,
            short_inv_ids,
        })
    }

    /// §4.9 steps 1-4: attempt full reconstruction against `mempool` and
    /// an `extra_pool` (recent block candidates, orphan children). On
    /// success every stream is returned in final order; otherwise the
    /// caller gets back exactly the `GetBlockTxn` request it needs to
    /// send (§4.9 step 5).
    pub fn reconstruct<M: MempoolLink>(
        &self,
        mempool: &M,
        extra_txn: &[OpaqueItem],
        extra_referrals: &[Referral],
        extra_inv: &[OpaqueItem],
    ) -> Result<Reconstruction, CompactBlockError> {
        let keys = self.keys();

        let mut txn_stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(self.tx_total(), self.prefilled_txn.clone(), &self.short_tx_ids)?;
        for candidate in mempool.txs().iter().chain(extra_txn) {
            txn_stream.offer(short_id(&keys, &candidate.item_hash()), candidate);
        }

        let mut ref_stream: ShortIdStream<Referral> =
            ShortIdStream::new(self.ref_total(), Vec::new(), &self.short_ref_ids)?;
        for candidate in mempool.referrals().iter().chain(extra_referrals) {
            ref_stream.offer(short_id(&keys, &candidate.hash()), candidate);
        }

        let mut inv_stream = if self.daedalus {
            Some(ShortIdStream::<OpaqueItem>::new(
                self.inv_total(),
                self.prefilled_inv.clone(),
                &self.short_inv_ids,
            )?)
        } else {
            None
        };
        if let Some(stream) = inv_stream.as_mut() {
            for candidate in mempool.invites().iter().chain(extra_inv) {
                stream.offer(short_id(&keys, &candidate.item_hash()), candidate);
            }
        }

        let tx_missing = txn_stream.missing_indices();
        let ref_missing = ref_stream.missing_indices();
        let inv_missing = inv_stream.as_ref().map(|s| s.missing_indices());

        let anything_missing = !tx_missing.is_empty()
            || !ref_missing.is_empty()
            || inv_missing.as_ref().is_some_and(|m| !m.is_empty());

        if anything_missing {
            debug!(
                tx_missing = tx_missing.len(),
                ref_missing = ref_missing.len(),
                "compact block incomplete, requesting refill"
            );
            return Ok(Reconstruction::NeedMore(BlockTransactionsRequest {
                block_hash: self.header.hash(),
                tx_indices: tx_missing,
                referral_indices: ref_missing,
                invite_indices: inv_missing,
            }));
        }

        Ok(Reconstruction::Complete {
            txn: txn_stream.into_items()?,
            referrals: ref_stream.into_items()?,
            invites: inv_stream.map(|s| s.into_items()).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mempool::InMemoryMempool;
    use merit_crypto::hash::Hash;

    fn header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash::from([1u8; 32]),
            merkle_root: Hash::from([2u8; 32]),
            time: 100,
            bits: 0x1d00ffff,
            nonce: 7,
        }
    }

    fn tx(seed: u8) -> OpaqueItem {
        OpaqueItem {
            hash: Hash::from([seed; 32]),
            bytes: vec![seed, seed, seed],
        }
    }

    #[test]
    fn wire_round_trip_without_daedalus() {
        let block = CompactBlock {
            header: header(),
            nonce: 42,
            daedalus: false,
            prefilled_txn: vec![PrefilledItem { index: 0, item: tx(9) }],
            short_tx_ids: vec![[1, 2, 3, 4, 5, 6]],
            short_ref_ids: vec![[7, 8, 9, 10, 11, 12]],
            prefilled_inv: vec![],
            short_inv_ids: vec![],
        };
        let encoded = block.encode().unwrap();
        let decoded = CompactBlock::decode(&encoded, false).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn wire_round_trip_with_daedalus() {
        let block = CompactBlock {
            header: header(),
            nonce: 42,
            daedalus: true,
            prefilled_txn: vec![],
            short_tx_ids: vec![[1, 2, 3, 4, 5, 6]],
            short_ref_ids: vec![],
            prefilled_inv: vec![PrefilledItem { index: 0, item: tx(3) }],
            short_inv_ids: vec![[9, 9, 9, 9, 9, 9]],
        };
        let encoded = block.encode().unwrap();
        let decoded = CompactBlock::decode(&encoded, true).unwrap();
        assert_eq!(block, decoded);
    }

    #[test]
    fn reconstruction_completes_from_mempool() {
        let keys_header = header();
        let real_tx = tx(9);

        let block = CompactBlock {
            header: keys_header.clone(),
            nonce: 42,
            daedalus: false,
            prefilled_txn: vec![],
            short_tx_ids: vec![short_id(&short_id_keys(&keys_header, 42), &real_tx.hash)],
            short_ref_ids: vec![],
            prefilled_inv: vec![],
            short_inv_ids: vec![],
        };

        let mempool = InMemoryMempool {
            txs: vec![real_tx.clone()],
            ..Default::default()
        };

        match block.reconstruct(&mempool, &[], &[], &[]).unwrap() {
            Reconstruction::Complete { txn, .. } => assert_eq!(txn, vec![real_tx]),
            Reconstruction::NeedMore(_) => panic!("expected complete reconstruction"),
        }
    }

    #[test]
    fn missing_item_requests_a_refill() {
        let keys_header = header();
        let missing_hash = Hash::from([5u8; 32]);

        let block = CompactBlock {
            header: keys_header.clone(),
            nonce: 42,
            daedalus: false,
            prefilled_txn: vec![],
            short_tx_ids: vec![short_id(&short_id_keys(&keys_header, 42), &missing_hash)],
            short_ref_ids: vec![],
            prefilled_inv: vec![],
            short_inv_ids: vec![],
        };

        let mempool = InMemoryMempool::default();

        match block.reconstruct(&mempool, &[], &[], &[]).unwrap() {
            Reconstruction::NeedMore(request) => {
                assert_eq!(request.tx_indices, vec![0]);
                assert!(request.referral_indices.is_empty());
            }
            Reconstruction::Complete { .. } => panic!("expected a refill request"),
        }
    }
}
