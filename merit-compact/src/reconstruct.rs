//! Short-ID assembly and reconstruction (§4.9): the generic engine the
//! three compact-block streams (transactions, invites, referrals) share.
//! The collision and overflow handling here is what makes "MUST return
//! FAILED, not silently pick one" (§8 scenario 6) hold for any of the
//! three streams, not just transactions — the open question in §9 about
//! requesting *both* colliding items is explicitly not implemented: on
//! collision this falls back the way the shipped reference node does.

use std::collections::HashMap;

use thiserror::Error;
use tracing::{debug, warn};

use crate::item::Keyed;
use crate::short_id::ShortId;

/// Bound on how many remaining positions may share a short-ID bucket
/// before reconstruction gives up (§4.9 step 2: "expected overflow
/// probability must remain negligibly small"). Buckets here are keyed by
/// the short ID's leading byte, a coarse stand-in for whatever hash table
/// a concrete deployment sizes by its own `BIGEPS`/`TRIMFRAC256`-style
/// tuning constants (§9 Open Questions — non-consensus, re-tunable).
pub const MAX_BUCKET_DEPTH: usize = 12;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ReconstructError {
    #[error("short-id bucket holds more than {MAX_BUCKET_DEPTH} entries")]
    BucketOverflow,
    #[error("two distinct block items collide on the same short id")]
    ShortIdCollision,
    #[error("prefilled index {0} is out of range for a block of this size")]
    PrefilledIndexOutOfRange(u32),
    #[error("prefilled index {0} was supplied more than once")]
    DuplicatePrefilledIndex(u32),
    #[error("short-id count does not match the number of non-prefilled positions")]
    ShortIdCountMismatch,
    #[error("{0} position(s) remain unresolved after the mempool and extra-pool scans")]
    Incomplete(usize),
}

/// One entry of the wire-level prefilled list: `index` is the item's
/// *absolute* position in the reconstructed stream (the wire itself
/// delta-compresses this; see [`crate::block`]).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrefilledItem<T> {
    pub index: u32,
    pub item: T,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Slot {
    Prefilled,
    Open,
    Filled,
    Ambiguous,
}

/// One compact-block stream under reconstruction: a sequence of
/// positions, some seeded directly (`prefilled`), the rest identified
/// only by a 6-byte [`ShortId`] that must be resolved against a mempool
/// and an extra pool (§4.9).
pub struct ShortIdStream<T> {
    slots: Vec<Slot>,
    items: Vec<Option<T>>,
    index_of_short_id: HashMap<ShortId, u32>,
}

impl<T: Keyed + Clone> ShortIdStream<T> {
    /// §4.9 steps 1-2: seed the prefilled positions, then build the
    /// `short_id -> index` table for everything else, detecting both the
    /// within-block collision (§8 scenario 6) and the bucket-depth
    /// overflow up front so the whole reconstruction fails fast rather
    /// than silently resolving to the wrong item.
    pub fn new(
        total: usize,
        prefilled: Vec<PrefilledItem<T>>,
        short_ids: &[ShortId],
    ) -> Result<Self, ReconstructError> {
        let mut slots = vec![Slot::Open; total];
        let mut items: Vec<Option<T>> = (0..total).map(|_| None).collect();

        for p in &prefilled {
            let idx = p.index as usize;
            if idx >= total {
                return Err(ReconstructError::PrefilledIndexOutOfRange(p.index));
            }
            if matches!(slots[idx], Slot::Prefilled) {
                return Err(ReconstructError::DuplicatePrefilledIndex(p.index));
            }
            slots[idx] = Slot::Prefilled;
        }
        for p in prefilled {
            let idx = p.index as usize;
            items[idx] = Some(p.item);
        }

        let remaining: Vec<u32> = (0..total as u32)
            .filter(|i| matches!(slots[*i as usize], Slot::Open))
            .collect();
        if remaining.len() != short_ids.len() {
            return Err(ReconstructError::ShortIdCountMismatch);
        }

        let mut bucket_depth: HashMap<u8, usize> = HashMap::new();
        let mut index_of_short_id = HashMap::with_capacity(short_ids.len());
        for (short_id, index) in short_ids.iter().zip(remaining) {
            if index_of_short_id.insert(*short_id, index).is_some() {
                warn!("short-id collision within a single compact block; falling back");
                return Err(ReconstructError::ShortIdCollision);
            }
            let depth = bucket_depth.entry(short_id[0]).or_insert(0);
            *depth += 1;
            if *depth > MAX_BUCKET_DEPTH {
                return Err(ReconstructError::BucketOverflow);
            }
        }

        Ok(Self {
            slots,
            items,
            index_of_short_id,
        })
    }

    /// §4.9 steps 3-4: offer one candidate item (from the mempool, then
    /// again from the extra pool) under its short ID, computed by the
    /// caller against this block's short-ID keys. Filling an open
    /// position claims it; a second, different-hash candidate for an
    /// already-filled position makes that position permanently ambiguous
    /// — nothing in §4.9 says which of two candidates is the real one,
    /// so it is left for `GetBlockTxn` to settle.
    pub fn offer(&mut self, short_id: ShortId, candidate: &T) {
        let Some(&index) = self.index_of_short_id.get(&short_id) else {
            return;
        };
        let idx = index as usize;
        match self.slots[idx] {
            Slot::Open => {
                self.slots[idx] = Slot::Filled;
                self.items[idx] = Some(candidate.clone());
            }
            Slot::Filled => {
                let existing_hash = self.items[idx].as_ref().map(Keyed::item_hash);
                if existing_hash != Some(candidate.item_hash()) {
                    debug!("short-id claimed by two distinct candidates; clearing position");
                    self.slots[idx] = Slot::Ambiguous;
                    self.items[idx] = None;
                }
            }
            Slot::Ambiguous | Slot::Prefilled => {}
        }
    }

    /// Positions still unresolved after both scans: what the caller must
    /// request via `GetBlockTxn` (§4.9 step 5; §7 "missing-data ... not
    /// an error state, just a continuation").
    pub fn missing_indices(&self) -> Vec<u32> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| !matches!(s, Slot::Prefilled | Slot::Filled))
            .map(|(i, _)| i as u32)
            .collect()
    }

    /// §4.9 step 5: apply the responder's answer for one missing
    /// position.
    pub fn fill_missing(&mut self, index: u32, item: T) {
        let idx = index as usize;
        self.slots[idx] = Slot::Filled;
        self.items[idx] = Some(item);
    }

    pub fn is_complete(&self) -> bool {
        self.slots
            .iter()
            .all(|s| matches!(s, Slot::Prefilled | Slot::Filled))
    }

    /// Finish reconstruction: `Ok` only once every position resolved to
    /// exactly one item, in order.
    pub fn into_items(self) -> Result<Vec<T>, ReconstructError> {
        let missing = self.missing_indices().len();
        if missing > 0 {
            return Err(ReconstructError::Incomplete(missing));
        }
        Ok(self.items.into_iter().map(|i| i.unwrap()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::OpaqueItem;
    use merit_crypto::hash::Hash;

    fn item(seed: u8) -> OpaqueItem {
        OpaqueItem {
            hash: Hash::from([seed; 32]),
            bytes: vec![seed],
        }
    }

    fn sid(b0: u8, rest: u8) -> ShortId {
        let mut id = [rest; 6];
        id[0] = b0;
        id
    }

    #[test]
    fn prefilled_positions_need_no_offer() {
        let prefilled = vec![PrefilledItem { index: 0, item: item(1) }];
        let stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(1, prefilled, &[]).unwrap();
        assert!(stream.is_complete());
        assert_eq!(stream.into_items().unwrap(), vec![item(1)]);
    }

    #[test]
    fn mempool_offer_fills_an_open_position() {
        let short_ids = vec![sid(1, 1)];
        let mut stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(1, vec![], &short_ids).unwrap();
        assert!(!stream.is_complete());
        stream.offer(sid(1, 1), &item(9));
        assert!(stream.is_complete());
        assert_eq!(stream.into_items().unwrap(), vec![item(9)]);
    }

    #[test]
    fn conflicting_candidates_become_permanently_missing() {
        let short_ids = vec![sid(1, 1)];
        let mut stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(1, vec![], &short_ids).unwrap();
        stream.offer(sid(1, 1), &item(9));
        stream.offer(sid(1, 1), &item(10));
        assert_eq!(stream.missing_indices(), vec![0]);
        stream.fill_missing(0, item(10));
        assert!(stream.is_complete());
    }

    #[test]
    fn duplicate_candidate_is_not_treated_as_a_conflict() {
        let short_ids = vec![sid(1, 1)];
        let mut stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(1, vec![], &short_ids).unwrap();
        stream.offer(sid(1, 1), &item(9));
        stream.offer(sid(1, 1), &item(9));
        assert!(stream.is_complete());
        assert_eq!(stream.into_items().unwrap(), vec![item(9)]);
    }

    #[test]
    fn within_block_short_id_collision_fails_fast() {
        let short_ids = vec![sid(1, 1), sid(1, 1)];
        let result: Result<ShortIdStream<OpaqueItem>, _> = ShortIdStream::new(2, vec![], &short_ids);
        assert_eq!(result.unwrap_err(), ReconstructError::ShortIdCollision);
    }

    #[test]
    fn bucket_overflow_is_rejected() {
        let short_ids: Vec<ShortId> = (0..=MAX_BUCKET_DEPTH as u8)
            .map(|i| sid(1, i))
            .collect();
        let total = short_ids.len();
        let result: Result<ShortIdStream<OpaqueItem>, _> =
            ShortIdStream::new(total, vec![], &short_ids);
        assert_eq!(result.unwrap_err(), ReconstructError::BucketOverflow);
    }

    #[test]
    fn incomplete_reconstruction_reports_the_remaining_count() {
        let short_ids = vec![sid(1, 1), sid(2, 1)];
        let mut stream: ShortIdStream<OpaqueItem> =
            ShortIdStream::new(2, vec![], &short_ids).unwrap();
        stream.offer(sid(1, 1), &item(9));
        let err = stream.into_items().unwrap_err();
        assert_eq!(err, ReconstructError::Incomplete(1));
    }

    #[test]
    fn out_of_range_prefilled_index_is_rejected() {
        let prefilled = vec![PrefilledItem { index: 5, item: item(1) }];
        let result: Result<ShortIdStream<OpaqueItem>, _> = ShortIdStream::new(1, prefilled, &[]);
        assert_eq!(
            result.unwrap_err(),
            ReconstructError::PrefilledIndexOutOfRange(5)
        );
    }
}
