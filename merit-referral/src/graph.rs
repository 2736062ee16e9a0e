use crate::address::{Address, AddressType};
use crate::keys::DBParentChild;
use crate::referral::{self, Referral};
use merit_store::kvtable::{DBAddr, DBBytes, DBInt, Error as StoreError, KVTable};
use rocksdb::{Options, WriteBatch, DB};
use std::{path::Path, sync::Arc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("address already beaconed")]
    DuplicateAddress,
    #[error("parent address is not in the graph")]
    UnknownParent,
    #[error("signature does not verify")]
    BadSignature,
    #[error("alias already taken")]
    AliasTaken,
    #[error(transparent)]
    Referral(#[from] referral::Error),
    #[error(transparent)]
    Store(#[from] StoreError),
}

struct ReferralByAddr;
impl KVTable<DBAddr, DBBytes> for ReferralByAddr {
    const CF_NAME: &'static str = "ReferralByAddr";
}

struct AddressByAlias;
impl KVTable<DBBytes, DBAddr> for AddressByAlias {
    const CF_NAME: &'static str = "AddressByAlias";
}

struct ChildrenByParent;
impl KVTable<DBParentChild, DBBytes> for ChildrenByParent {
    const CF_NAME: &'static str = "ChildrenByParent";
}

struct HeightByAddr;
impl KVTable<DBAddr, DBInt> for HeightByAddr {
    const CF_NAME: &'static str = "HeightByAddr";
}

struct ConfirmedByAddr;
impl KVTable<DBAddr, DBInt> for ConfirmedByAddr {
    const CF_NAME: &'static str = "ConfirmedByAddr";
}

struct AnvByAddr;
impl KVTable<DBAddr, DBBytes> for AnvByAddr {
    const CF_NAME: &'static str = "AnvByAddr";
}

const CFS: &[&str] = &[
    "ReferralByAddr",
    "AddressByAlias",
    "ChildrenByParent",
    "HeightByAddr",
    "ConfirmedByAddr",
    "AnvByAddr",
];

/// Persistent forest of [`Referral`]s rooted at the genesis address.
///
/// Mirrors the five on-disk keyspaces from the reference design: `R/`
/// (referral bytes), `A/` (alias uniqueness), `C/` (child enumeration),
/// `H/` (first-appearance height), `F/` (confirmation flag), plus `N/`
/// (the running ANV sum, walked on every balance change).
pub struct ReferralGraph {
    db: Arc<DB>,
}

impl ReferralGraph {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, GraphError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let db = DB::open_cf(&opts, path, CFS).map_err(|_| StoreError::IO)?;

        Ok(Self { db: Arc::new(db) })
    }

    pub fn destroy(path: impl AsRef<Path>) -> Result<(), GraphError> {
        DB::destroy(&Options::default(), path).map_err(|_| StoreError::IO)?;
        Ok(())
    }

    fn is_root(address: Address) -> bool {
        address.is_zero()
    }

    pub fn lookup(&self, address: Address) -> Result<Option<Referral>, GraphError> {
        let raw = ReferralByAddr::get_by_key(&self.db, DBAddr(address))?;
        match raw {
            None => Ok(None),
            Some(DBBytes(bytes)) => Ok(Some(Referral::decode(&bytes)?)),
        }
    }

    pub fn lookup_by_alias(&self, alias: &str) -> Result<Option<Address>, GraphError> {
        if alias.is_empty() {
            return Ok(None);
        }
        let raw = AddressByAlias::get_by_key(&self.db, DBBytes(alias.as_bytes().to_vec()))?;
        Ok(raw.map(|DBAddr(addr)| addr))
    }

    pub fn children(&self, address: Address) -> Result<Vec<Address>, GraphError> {
        let lower = DBParentChild::lower_bound(address);
        let mut out = Vec::new();

        for key in ChildrenByParent::iter_keys_from(&self.db, lower) {
            let key = key?;
            if key.parent() != address {
                break;
            }
            out.push(key.child());
        }

        Ok(out)
    }

    pub fn height(&self, address: Address) -> Result<Option<u64>, GraphError> {
        let raw = HeightByAddr::get_by_key(&self.db, DBAddr(address))?;
        Ok(raw.map(|DBInt(h)| h))
    }

    pub fn is_confirmed(&self, address: Address) -> Result<bool, GraphError> {
        let raw = ConfirmedByAddr::get_by_key(&self.db, DBAddr(address))?;
        Ok(raw.is_some())
    }

    pub fn mark_confirmed(&mut self, address: Address, height: u64) -> Result<(), GraphError> {
        let mut batch = WriteBatch::default();
        ConfirmedByAddr::stage_upsert(&self.db, DBAddr(address), DBInt(height), &mut batch);
        self.db.write(batch).map_err(|_| StoreError::IO)?;
        Ok(())
    }

    pub fn unmark_confirmed(&mut self, address: Address) -> Result<(), GraphError> {
        let mut batch = WriteBatch::default();
        ConfirmedByAddr::stage_delete(&self.db, DBAddr(address), &mut batch);
        self.db.write(batch).map_err(|_| StoreError::IO)?;
        Ok(())
    }

    /// Insert a referral beaconing its address into the graph.
    ///
    /// `safer_alias_active` gates the alias normalisation rules by the
    /// `safer_alias_blockheight` activation; callers derive it from the
    /// height the containing block is connected at.
    pub fn insert(
        &mut self,
        referral: Referral,
        height: u64,
        safer_alias_active: bool,
    ) -> Result<(), GraphError> {
        let address = referral.address();

        if self.lookup(address)?.is_some() {
            return Err(GraphError::DuplicateAddress);
        }

        if !Self::is_root(referral.parent_address) && self.lookup(referral.parent_address)?.is_none()
        {
            return Err(GraphError::UnknownParent);
        }

        referral
            .verify_signature()
            .map_err(|_| GraphError::BadSignature)?;

        let alias = match &referral.alias {
            Some(raw) => {
                let normalised = referral::normalise_alias(raw, safer_alias_active)?;
                if !normalised.is_empty() && self.lookup_by_alias(&normalised)?.is_some() {
                    return Err(GraphError::AliasTaken);
                }
                Some(normalised)
            }
            None => None,
        };

        let mut batch = WriteBatch::default();

        ReferralByAddr::stage_upsert(
            &self.db,
            DBAddr(address),
            DBBytes(referral.encode()),
            &mut batch,
        );

        if let Some(alias) = alias.filter(|a| !a.is_empty()) {
            AddressByAlias::stage_upsert(
                &self.db,
                DBBytes(alias.into_bytes()),
                DBAddr(address),
                &mut batch,
            );
        }

        ChildrenByParent::stage_upsert(
            &self.db,
            DBParentChild(referral.parent_address, address),
            DBBytes(Vec::new()),
            &mut batch,
        );

        HeightByAddr::stage_upsert(&self.db, DBAddr(address), DBInt(height), &mut batch);

        AnvByAddr::stage_upsert(
            &self.db,
            DBAddr(address),
            DBBytes(0i64.to_be_bytes().to_vec()),
            &mut batch,
        );

        self.db.write(batch).map_err(|_| StoreError::IO)?;

        Ok(())
    }

    /// Remove a referral and all of its derived index entries. Only valid
    /// when undoing a block; the caller is responsible for reversing the
    /// ANV delta this address contributed via [`Self::apply_balance_delta`]
    /// before calling this.
    pub fn remove(&mut self, address: Address) -> Result<(), GraphError> {
        let Some(referral) = self.lookup(address)? else {
            return Ok(());
        };

        let mut batch = WriteBatch::default();

        ReferralByAddr::stage_delete(&self.db, DBAddr(address), &mut batch);

        if let Some(alias) = referral.alias.filter(|a| !a.is_empty()) {
            AddressByAlias::stage_delete(&self.db, DBBytes(alias.into_bytes()), &mut batch);
        }

        ChildrenByParent::stage_delete(
            &self.db,
            DBParentChild(referral.parent_address, address),
            &mut batch,
        );

        HeightByAddr::stage_delete(&self.db, DBAddr(address), &mut batch);
        ConfirmedByAddr::stage_delete(&self.db, DBAddr(address), &mut batch);
        AnvByAddr::stage_delete(&self.db, DBAddr(address), &mut batch);

        self.db.write(batch).map_err(|_| StoreError::IO)?;

        Ok(())
    }

    pub fn anv(&self, address: Address) -> Result<i64, GraphError> {
        let raw = AnvByAddr::get_by_key(&self.db, DBAddr(address))?;
        Ok(match raw {
            Some(DBBytes(bytes)) => i64::from_be_bytes(bytes.try_into().unwrap_or([0; 8])),
            None => 0,
        })
    }

    /// Apply a balance change at `address`, walking up to the root adding
    /// `delta` to every ancestor's ANV (itself included). Must be called
    /// for every UTXO/invite balance change so `ANV(A) = balance(A) +
    /// sum(ANV(child))` stays true without a full recompute.
    pub fn apply_balance_delta(&mut self, address: Address, delta: i64) -> Result<(), GraphError> {
        if delta == 0 {
            return Ok(());
        }

        let mut batch = WriteBatch::default();
        let mut current = Some(address);

        while let Some(addr) = current {
            let previous = self.anv(addr)?;
            let updated = previous + delta;
            AnvByAddr::stage_upsert(
                &self.db,
                DBAddr(addr),
                DBBytes(updated.to_be_bytes().to_vec()),
                &mut batch,
            );

            current = if Self::is_root(addr) {
                None
            } else {
                match self.lookup(addr)? {
                    Some(r) => Some(r.parent_address),
                    None => None,
                }
            };
        }

        self.db.write(batch).map_err(|_| StoreError::IO)?;

        Ok(())
    }

    /// Full recompute of ANV from scratch, for consistency checking only
    /// (§4.2: "a full recompute is only a consistency check").
    pub fn recompute_anv(&mut self, root: Address, balances: &dyn Fn(Address) -> i64) -> Result<i64, GraphError> {
        let mut total = balances(root);
        for child in self.children(root)? {
            total += self.recompute_anv(child, balances)?;
        }

        let mut batch = WriteBatch::default();
        AnvByAddr::stage_upsert(
            &self.db,
            DBAddr(root),
            DBBytes(total.to_be_bytes().to_vec()),
            &mut batch,
        );
        self.db.write(batch).map_err(|_| StoreError::IO)?;

        Ok(total)
    }

    pub fn address_type(&self, address: Address) -> Result<Option<AddressType>, GraphError> {
        Ok(self.lookup(address)?.map(|r| r.address_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_crypto::hash::{Hash, Hasher};
    use secp256k1::{Secp256k1, SecretKey};

    fn signed_referral(parent: Address, key_hash: Address, alias: Option<&str>) -> Referral {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[9u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(&secp, &secret);

        let mut referral = Referral {
            version: referral::CURRENT_VERSION,
            parent_address: parent,
            address_type: AddressType::PubkeyHash,
            key_hash,
            pubkey: public.serialize(),
            alias: alias.map(str::to_string),
            signature: Vec::new(),
        };

        let digest = Hasher::<256>::hash(&referral.signing_payload());
        let message = secp256k1::Message::from_digest_slice(digest.as_ref()).unwrap();
        let signature = secp.sign_ecdsa(&message, &secret);
        referral.signature = signature.serialize_der().to_vec();
        referral
    }

    fn with_tmp_graph<T>(op: impl FnOnce(ReferralGraph) -> T) -> T {
        let path = tempfile::tempdir().unwrap().into_path();
        let graph = ReferralGraph::open(&path).unwrap();
        let out = op(graph);
        ReferralGraph::destroy(&path).ok();
        out
    }

    #[test]
    fn genesis_has_no_children_and_zero_anv() {
        with_tmp_graph(|mut graph| {
            let genesis = signed_referral(Address::zero(), Hash::from([1u8; 20]), None);
            let address = genesis.address();

            graph.insert(genesis, 0, true).unwrap();

            assert_eq!(graph.children(address).unwrap(), Vec::<Address>::new());
            assert_eq!(graph.anv(address).unwrap(), 0);
            assert_eq!(graph.lookup_by_alias("").unwrap(), None);
        });
    }

    #[test]
    fn unknown_parent_rejected() {
        with_tmp_graph(|mut graph| {
            let orphan = signed_referral(Hash::from([5u8; 20]), Hash::from([6u8; 20]), None);
            assert!(matches!(
                graph.insert(orphan, 1, true),
                Err(GraphError::UnknownParent)
            ));
        });
    }

    #[test]
    fn duplicate_alias_rejected_case_insensitively() {
        with_tmp_graph(|mut graph| {
            let genesis = signed_referral(Address::zero(), Hash::from([1u8; 20]), None);
            let genesis_addr = genesis.address();
            graph.insert(genesis, 0, true).unwrap();

            let alice = signed_referral(genesis_addr, Hash::from([2u8; 20]), Some("alice"));
            graph.insert(alice, 1, true).unwrap();

            let dup = signed_referral(genesis_addr, Hash::from([3u8; 20]), Some("Alice"));
            assert!(matches!(
                graph.insert(dup, 2, true),
                Err(GraphError::AliasTaken)
            ));
        });
    }

    #[test]
    fn balance_delta_propagates_to_ancestors() {
        with_tmp_graph(|mut graph| {
            let genesis = signed_referral(Address::zero(), Hash::from([1u8; 20]), None);
            let genesis_addr = genesis.address();
            graph.insert(genesis, 0, true).unwrap();

            let child = signed_referral(genesis_addr, Hash::from([2u8; 20]), None);
            let child_addr = child.address();
            graph.insert(child, 1, true).unwrap();

            graph.apply_balance_delta(child_addr, 500).unwrap();

            assert_eq!(graph.anv(child_addr).unwrap(), 500);
            assert_eq!(graph.anv(genesis_addr).unwrap(), 500);
        });
    }
}
