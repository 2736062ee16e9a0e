use merit_crypto::hash::Hash;
use std::{path::Path, sync::Arc};
use tracing::warn;

use rocksdb::{Options, WriteBatch, DB};

use super::{BlockHash, BlockHeight, HeaderBytes};

use crate::kvtable::*;

/// Persistent index of headers on the active chain, keyed by height.
///
/// Height is stored big-endian ([`DBInt`]) so on-disk key order matches
/// chain order, same as the consensus-critical address index.
#[derive(Clone)]
pub struct HeaderIndex {
    db: Arc<DB>,
    pub tip_change: Arc<tokio::sync::Notify>,
}

pub struct HeaderByHashKV;

// hash -> header bytes
impl KVTable<DBHash, DBBytes> for HeaderByHashKV {
    const CF_NAME: &'static str = "HeaderByHashKV";
}

// height -> header hash
pub struct HashByHeightKV;

impl KVTable<DBInt, DBHash> for HashByHeightKV {
    const CF_NAME: &'static str = "HashByHeightKV";
}

pub struct ChainIterator<'a>(pub EntryIterator<'a, DBInt, DBHash>);

impl Iterator for ChainIterator<'_> {
    type Item = Result<(u64, Hash<32>), Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.0
            .next()
            .map(|v| v.map(|(height, val)| (height.0, val.0)))
    }
}

impl HeaderIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(
            &opts,
            path,
            [HeaderByHashKV::CF_NAME, HashByHeightKV::CF_NAME],
        )
        .map_err(|_| Error::IO)?;

        Ok(Self {
            db: Arc::new(db),
            tip_change: Arc::new(tokio::sync::Notify::new()),
        })
    }

    pub fn get_header(&self, hash: Hash<32>) -> Result<Option<HeaderBytes>, Error> {
        let dbval = HeaderByHashKV::get_by_key(&self.db, DBHash(hash))?;
        Ok(dbval.map(|x| x.0))
    }

    pub fn connect(
        &mut self,
        height: BlockHeight,
        hash: BlockHash,
        header: HeaderBytes,
    ) -> Result<(), Error> {
        let mut batch = WriteBatch::default();

        HeaderByHashKV::stage_upsert(&self.db, DBHash(hash), DBBytes(header), &mut batch);
        HashByHeightKV::stage_upsert(&self.db, DBInt(height), DBHash(hash), &mut batch);

        self.db.write(batch).map_err(|_| Error::IO)?;
        self.tip_change.notify_waiters();

        Ok(())
    }

    /// undo connection of every header above `until` (exclusive), as part
    /// of a reorg. Header bytes stay in `HeaderByHashKV` since a
    /// disconnected header may be reconnected by a later reorg.
    pub fn disconnect_above(&mut self, until: BlockHeight) -> Result<(), Error> {
        let mut batch = WriteBatch::default();

        let to_remove = HashByHeightKV::iter_keys_from(&self.db, DBInt(until)).skip(1);

        for key in to_remove {
            HashByHeightKV::stage_delete(&self.db, key?, &mut batch);
        }

        self.db.write(batch).map_err(|_| Error::IO)?;
        self.tip_change.notify_waiters();

        Ok(())
    }

    pub fn reset(&mut self) -> Result<(), Error> {
        HashByHeightKV::reset(&self.db)?;
        HeaderByHashKV::reset(&self.db)?;

        self.tip_change.notify_waiters();

        Ok(())
    }

    pub fn find_tip(&self) -> Result<Option<(BlockHeight, BlockHash)>, Error> {
        let mut iter = HashByHeightKV::iter_entries(&self.db, rocksdb::IteratorMode::End);

        if let Some(last) = iter.next() {
            let (height, hash) = last?;
            Ok(Some((height.0, hash.0)))
        } else {
            Ok(None)
        }
    }

    pub fn crawl_after(&self, height: Option<u64>) -> ChainIterator {
        if let Some(height) = height {
            let height = Box::<[u8]>::from(DBInt(height));
            let from = rocksdb::IteratorMode::From(&height, rocksdb::Direction::Forward);
            let mut iter = HashByHeightKV::iter_entries(&self.db, from);

            // skip current
            iter.next();

            ChainIterator(iter)
        } else {
            let from = rocksdb::IteratorMode::Start;
            let iter = HashByHeightKV::iter_entries(&self.db, from);
            ChainIterator(iter)
        }
    }

    pub fn crawl(&self) -> ChainIterator {
        self.crawl_after(None)
    }

    pub fn read_chain_page(
        &self,
        from: BlockHeight,
        len: usize,
    ) -> impl Iterator<Item = Result<(BlockHeight, BlockHash), Error>> + '_ {
        HashByHeightKV::iter_entries_from(&self.db, DBInt(from))
            .map(|res| res.map(|(x, y)| (x.0, y.0)))
            .take(len)
    }

    /// Iterator over the chain between two points (inclusive).
    ///
    /// To use the genesis as start point, set `from` to `None`.
    ///
    /// Returns `None` if either point is not on the indexed chain, or `to`
    /// is earlier than `from`.
    pub fn read_chain_range(
        &self,
        from: Option<(BlockHeight, BlockHash)>,
        to: (BlockHeight, BlockHash),
    ) -> Result<Option<impl Iterator<Item = Result<(BlockHeight, BlockHash), Error>> + '_>, Error>
    {
        let p1_height = if let Some((height, _)) = from {
            if to.0 < height {
                warn!("chain range end height before start height");
                return Ok(None);
            }
            height
        } else {
            0
        };

        if let Some((height, hash)) = from {
            match HashByHeightKV::get_by_key(&self.db, DBInt(height))? {
                Some(DBHash(found_hash)) => {
                    if hash != found_hash {
                        warn!("chain range start hash mismatch");
                        return Ok(None);
                    }
                }
                None => {
                    warn!("chain range start height not found");
                    return Ok(None);
                }
            }
        }

        match HashByHeightKV::get_by_key(&self.db, DBInt(to.0))? {
            Some(DBHash(found_hash)) => {
                if to.1 != found_hash {
                    warn!("chain range end hash mismatch");
                    return Ok(None);
                }
            }
            None => {
                warn!("chain range end height not found");
                return Ok(None);
            }
        };

        Ok(Some(
            HashByHeightKV::iter_entries_from(&self.db, DBInt(p1_height))
                .map(|res| res.map(|(x, y)| (x.0, y.0)))
                .take_while(move |x| {
                    if let Ok((height, _)) = x {
                        *height <= to.0
                    } else {
                        false
                    }
                }),
        ))
    }

    /// Check if a point (pair of height and header hash) exists on the
    /// indexed chain.
    pub fn chain_contains(&self, height: BlockHeight, hash: &BlockHash) -> Result<bool, Error> {
        if let Some(DBHash(found)) = HashByHeightKV::get_by_key(&self.db, DBInt(height))? {
            if found == *hash {
                return Ok(true);
            }
        }

        Ok(false)
    }

    pub fn destroy(path: impl AsRef<Path>) -> Result<(), Error> {
        DB::destroy(&Options::default(), path).map_err(|_| Error::IO)
    }
}
