use crate::address::Address;
use merit_crypto::hash::Hash;
use merit_store::kvtable::{DBBytes, Error as StoreError, KVTable};
use rocksdb::{Options, WriteBatch, DB};
use std::{path::Path, sync::Arc};

/// `(txid, vout_index, address, value, height, is_invite, is_coinbase)`
///
/// Stored both as a UTXO (value semantics, keyed by outpoint) and indexed
/// by address for the CoinAgeIndex and ambassador/invite lottery queries.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnspentOutput {
    pub txid: Hash<32>,
    pub vout: u32,
    pub address: Address,
    pub value: u64,
    pub height: u64,
    pub is_invite: bool,
    pub is_coinbase: bool,
}

/// `AddressUnspent:  type:u8 | addr:20B | txid:32B | vout:u32LE | coinbase:u8`
/// (type+10 if invite)
///
/// Big-endian height is not present here: this key indexes *currently
/// unspent* outputs, so chronological sort is unnecessary; see
/// [`AddressIndexKey`] for the height-sorted spend history.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct AddressUnspentKey {
    pub type_tag: u8,
    pub address: Address,
    pub txid: Hash<32>,
    pub vout: u32,
}

impl AddressUnspentKey {
    pub fn new(address: Address, txid: Hash<32>, vout: u32, is_invite: bool) -> Self {
        Self {
            type_tag: if is_invite { 10 } else { 0 },
            address,
            txid,
            vout,
        }
    }

    pub fn lower_bound(address: Address, is_invite: bool) -> Self {
        Self::new(address, Hash::zero(), 0, is_invite)
    }
}

impl From<AddressUnspentKey> for Box<[u8]> {
    fn from(value: AddressUnspentKey) -> Self {
        let mut out = Vec::with_capacity(1 + 20 + 32 + 4);
        out.push(value.type_tag);
        out.extend_from_slice(value.address.as_ref());
        out.extend_from_slice(value.txid.as_ref());
        out.extend_from_slice(&value.vout.to_le_bytes());
        out.into()
    }
}

impl From<Box<[u8]>> for AddressUnspentKey {
    fn from(value: Box<[u8]>) -> Self {
        let type_tag = value[0];
        let address: [u8; 20] = value[1..21].try_into().unwrap();
        let txid: [u8; 32] = value[21..53].try_into().unwrap();
        let vout = u32::from_le_bytes(value[53..57].try_into().unwrap());
        Self {
            type_tag,
            address: Hash::from(address),
            txid: Hash::from(txid),
            vout,
        }
    }
}

/// `AddressIndex: type:u8 | addr:20B | height:u32BE | txindex:u32BE |
///                txid:32B | vout:u32 | spending:u8`
///
/// Big-endian height is consensus-critical: it makes keys sort
/// chronologically within an address, which the `AddressIndex` RPC and the
/// CoinAgeIndex rely on.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct AddressIndexKey {
    pub type_tag: u8,
    pub address: Address,
    pub height: u32,
    pub txindex: u32,
    pub txid: Hash<32>,
    pub vout: u32,
    pub spending: bool,
}

impl AddressIndexKey {
    pub fn lower_bound(address: Address, is_invite: bool) -> Self {
        Self {
            type_tag: if is_invite { 10 } else { 0 },
            address,
            height: 0,
            txindex: 0,
            txid: Hash::zero(),
            vout: 0,
            spending: false,
        }
    }
}

impl From<AddressIndexKey> for Box<[u8]> {
    fn from(value: AddressIndexKey) -> Self {
        let mut out = Vec::with_capacity(1 + 20 + 4 + 4 + 32 + 4 + 1);
        out.push(value.type_tag);
        out.extend_from_slice(value.address.as_ref());
        out.extend_from_slice(&value.height.to_be_bytes());
        out.extend_from_slice(&value.txindex.to_be_bytes());
        out.extend_from_slice(value.txid.as_ref());
        out.extend_from_slice(&value.vout.to_be_bytes());
        out.push(value.spending as u8);
        out.into()
    }
}

impl From<Box<[u8]>> for AddressIndexKey {
    fn from(value: Box<[u8]>) -> Self {
        let type_tag = value[0];
        let address: [u8; 20] = value[1..21].try_into().unwrap();
        let height = u32::from_be_bytes(value[21..25].try_into().unwrap());
        let txindex = u32::from_be_bytes(value[25..29].try_into().unwrap());
        let txid: [u8; 32] = value[29..61].try_into().unwrap();
        let vout = u32::from_be_bytes(value[61..65].try_into().unwrap());
        let spending = value[65] != 0;
        Self {
            type_tag,
            address: Hash::from(address),
            height,
            txindex,
            txid: Hash::from(txid),
            vout,
            spending,
        }
    }
}

struct UnspentByKey;
impl KVTable<AddressUnspentKey, DBBytes> for UnspentByKey {
    const CF_NAME: &'static str = "UnspentByKey";
}

struct HistoryByKey;
impl KVTable<AddressIndexKey, DBBytes> for HistoryByKey {
    const CF_NAME: &'static str = "HistoryByKey";
}

const CFS: &[&str] = &["UnspentByKey", "HistoryByKey"];

fn encode_output(output: &UnspentOutput) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + 8 + 1);
    out.extend_from_slice(&output.value.to_le_bytes());
    out.extend_from_slice(&output.height.to_le_bytes());
    out.push(output.is_coinbase as u8);
    out
}

fn decode_output(
    bytes: &[u8],
    address: Address,
    txid: Hash<32>,
    vout: u32,
    is_invite: bool,
) -> UnspentOutput {
    let value = u64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let height = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
    let is_coinbase = bytes[16] != 0;
    UnspentOutput {
        txid,
        vout,
        address,
        value,
        height,
        is_invite,
        is_coinbase,
    }
}

/// Secondary index over the UTXO set, `(address, is_invite) -> outputs`,
/// consumed by the CGS engine's age-decayed balance computation (§4.2) and
/// retained synchronously with the UTXO set itself.
pub struct CoinAgeIndex {
    db: Arc<DB>,
}

impl CoinAgeIndex {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path, CFS).map_err(|_| StoreError::IO)?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn destroy(path: impl AsRef<Path>) -> Result<(), StoreError> {
        DB::destroy(&Options::default(), path).map_err(|_| StoreError::IO)
    }

    pub fn insert(&mut self, height_for_history: u32, txindex: u32, output: UnspentOutput) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();

        let unspent_key =
            AddressUnspentKey::new(output.address, output.txid, output.vout, output.is_invite);
        UnspentByKey::stage_upsert(&self.db, unspent_key, DBBytes(encode_output(&output)), &mut batch);

        let history_key = AddressIndexKey {
            type_tag: unspent_key.type_tag,
            address: output.address,
            height: height_for_history,
            txindex,
            txid: output.txid,
            vout: output.vout,
            spending: false,
        };
        HistoryByKey::stage_upsert(&self.db, history_key, DBBytes(encode_output(&output)), &mut batch);

        self.db.write(batch).map_err(|_| StoreError::IO)
    }

    pub fn spend(
        &mut self,
        address: Address,
        txid: Hash<32>,
        vout: u32,
        is_invite: bool,
        spent_at_height: u32,
        spent_txindex: u32,
    ) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();

        let unspent_key = AddressUnspentKey::new(address, txid, vout, is_invite);
        UnspentByKey::stage_delete(&self.db, unspent_key, &mut batch);

        let spend_marker_key = AddressIndexKey {
            type_tag: unspent_key.type_tag,
            address,
            height: spent_at_height,
            txindex: spent_txindex,
            txid,
            vout,
            spending: true,
        };
        HistoryByKey::stage_upsert(&self.db, spend_marker_key, DBBytes(Vec::new()), &mut batch);

        self.db.write(batch).map_err(|_| StoreError::IO)
    }

    /// All currently unspent outputs for `address`, ordered by outpoint.
    pub fn unspent_for(
        &self,
        address: Address,
        is_invite: bool,
    ) -> Result<Vec<UnspentOutput>, StoreError> {
        let lower = AddressUnspentKey::lower_bound(address, is_invite);
        let type_tag = lower.type_tag;

        let mut out = Vec::new();
        for entry in UnspentByKey::iter_entries_from(&self.db, lower) {
            let (key, DBBytes(bytes)) = entry?;
            if key.address != address || key.type_tag != type_tag {
                break;
            }
            out.push(decode_output(
                &bytes, key.address, key.txid, key.vout, is_invite,
            ));
        }

        Ok(out)
    }

    /// Chronological spend history for `address`: relies on the
    /// big-endian height encoding in [`AddressIndexKey`] to sort entries
    /// within an address by connection order.
    pub fn history_for(
        &self,
        address: Address,
        is_invite: bool,
    ) -> Result<Vec<AddressIndexKey>, StoreError> {
        let lower = AddressIndexKey::lower_bound(address, is_invite);
        let type_tag = lower.type_tag;

        let mut out = Vec::new();
        for key in HistoryByKey::iter_keys_from(&self.db, lower) {
            let key = key?;
            if key.address != address || key.type_tag != type_tag {
                break;
            }
            out.push(key);
        }

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_output(address: Address, value: u64, height: u64) -> UnspentOutput {
        UnspentOutput {
            txid: Hash::from([4u8; 32]),
            vout: 0,
            address,
            value,
            height,
            is_invite: false,
            is_coinbase: false,
        }
    }

    #[test]
    fn address_index_keys_sort_chronologically() {
        let addr = Address::from([1u8; 20]);
        let low = AddressIndexKey {
            type_tag: 0,
            address: addr,
            height: 10,
            txindex: 0,
            txid: Hash::zero(),
            vout: 0,
            spending: false,
        };
        let high = AddressIndexKey {
            height: 20,
            ..low
        };
        assert!(low < high);
    }

    #[test]
    fn unspent_round_trip() {
        let path = tempfile::tempdir().unwrap().into_path();
        let mut idx = CoinAgeIndex::open(&path).unwrap();

        let addr = Address::from([9u8; 20]);
        idx.insert(100, 0, sample_output(addr, 5000, 100)).unwrap();

        let unspent = idx.unspent_for(addr, false).unwrap();
        assert_eq!(unspent.len(), 1);
        assert_eq!(unspent[0].value, 5000);

        idx.spend(addr, Hash::from([4u8; 32]), 0, false, 110, 0)
            .unwrap();
        let unspent = idx.unspent_for(addr, false).unwrap();
        assert!(unspent.is_empty());

        CoinAgeIndex::destroy(&path).ok();
    }
}
