use std::collections::HashMap;

use merit_referral::{Address, CoinAgeIndex, GraphError, ReferralGraph};
use merit_store::kvtable::Error as StoreError;
use thiserror::Error;

use crate::aged_balance::{age_scale, aged_value};
use crate::convex::convex_f;
use crate::contribution::{NodeContribution, SubtreeContribution};
use crate::decimal::{add, one, zero, Decimal, FixedPrecision};
use crate::params::CgsParams;

#[derive(Error, Debug)]
pub enum CgsError {
    #[error("address {0} is not reachable from this context's root")]
    UnknownAddress(Address),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Ephemeral per-tip computation unit (§4.2): built once for a given block
/// height and referral root, caches every reachable address's aged
/// balance, subtree contribution, and lets callers pull as many CGS/sub-CGS
/// scores out of it as they need without re-walking the graph each time.
pub struct CgsContext {
    params: CgsParams,
    root: Address,
    children_of: HashMap<Address, Vec<Address>>,
    subtree: HashMap<Address, SubtreeContribution>,
}

impl CgsContext {
    /// Walks the referral subtree rooted at `root`, post-order, via an
    /// explicit stack rather than recursion: referral chains are
    /// attacker-influenced and an unbounded recursion depth is not an
    /// option here.
    pub fn build(
        graph: &ReferralGraph,
        coin_ages: &CoinAgeIndex,
        params: CgsParams,
        height: u64,
        root: Address,
    ) -> Result<Self, CgsError> {
        let mut children_of: HashMap<Address, Vec<Address>> = HashMap::new();
        let mut contributions: HashMap<Address, NodeContribution> = HashMap::new();
        let mut subtree: HashMap<Address, SubtreeContribution> = HashMap::new();

        let mut stack: Vec<(Address, usize)> = vec![(root, 0)];

        while let Some(&(address, idx)) = stack.last() {
            if !children_of.contains_key(&address) {
                let fetched = graph.children(address)?;
                children_of.insert(address, fetched);
            }
            let children_len = children_of[&address].len();

            if idx < children_len {
                let child = children_of[&address][idx];
                stack.last_mut().unwrap().1 += 1;
                stack.push((child, 0));
                continue;
            }

            if !contributions.contains_key(&address) {
                let node =
                    Self::node_contribution(graph, coin_ages, &params, height, address)?;
                contributions.insert(address, node);
            }
            let node = contributions[&address].clone();

            let mut acc = SubtreeContribution {
                value: node.value,
                sub: node.sub,
            };
            for child in &children_of[&address] {
                if let Some(child_sub) = subtree.get(child) {
                    acc.value = add(&acc.value, &child_sub.value);
                    acc.sub = add(&acc.sub, &child_sub.sub);
                }
            }
            subtree.insert(address, acc);
            stack.pop();
        }

        Ok(Self {
            params,
            root,
            children_of,
            subtree,
        })
    }

    fn node_contribution(
        graph: &ReferralGraph,
        coin_ages: &CoinAgeIndex,
        params: &CgsParams,
        height: u64,
        address: Address,
    ) -> Result<NodeContribution, CgsError> {
        let coins = coin_ages.unspent_for(address, false)?;

        let mut total_balance = zero();
        let mut aged_sum: i64 = 0;
        for coin in &coins {
            total_balance = add(&total_balance, &Decimal::from(coin.value));
            aged_sum = aged_sum.saturating_add(aged_value(
                coin.value,
                coin.height,
                height,
                params.coin_maturity,
            ));
        }

        let beacon_height = graph.height(address)?.unwrap_or(height);
        let beta = one() - age_scale(height.saturating_sub(beacon_height), params.new_coin_maturity);
        let beta_term = &beta * &total_balance;
        let value = add(&beta_term, &Decimal::from(aged_sum));
        let sub = add(&one(), &value).ln();

        Ok(NodeContribution { value, sub })
    }

    /// `CGS(A) = C(root).value * ExpectedValue(A).value`, floored once.
    pub fn community_growth_score(&self, address: Address) -> Result<i64, CgsError> {
        self.score(address, true)
    }

    /// Same shape as [`Self::community_growth_score`] but run over the
    /// `ln(1 + value)` sub-linear accumulation instead of the raw value.
    pub fn sub_community_growth_score(&self, address: Address) -> Result<i64, CgsError> {
        self.score(address, false)
    }

    fn score(&self, address: Address, linear: bool) -> Result<i64, CgsError> {
        let root_sub = self
            .subtree
            .get(&self.root)
            .ok_or(CgsError::UnknownAddress(self.root))?;
        let addr_sub = self
            .subtree
            .get(&address)
            .ok_or(CgsError::UnknownAddress(address))?;

        let root_total = if linear { &root_sub.value } else { &root_sub.sub };
        if *root_total == zero() {
            return Ok(0);
        }

        let addr_total = if linear { &addr_sub.value } else { &addr_sub.sub };
        let ratio = addr_total / root_total;
        let mut expected_value = convex_f(&self.params, &ratio);

        for child in self.children_of.get(&address).into_iter().flatten() {
            let Some(child_sub) = self.subtree.get(child) else {
                continue;
            };
            let child_total = if linear { &child_sub.value } else { &child_sub.sub };
            let child_ratio = child_total / root_total;
            expected_value = &expected_value - &convex_f(&self.params, &child_ratio);
        }

        let score = &expected_value * root_total;
        Ok(score.floor_to_i64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_crypto::hash::{Hash, Hasher};
    use merit_referral::{referral, AddressType, Referral, UnspentOutput};
    use secp256k1::{Secp256k1, SecretKey};

    fn signed_referral(parent: Address, key_hash: Address) -> Referral {
        let secp = Secp256k1::new();
        let secret = SecretKey::from_slice(&[11u8; 32]).unwrap();
        let public = secp256k1::PublicKey::from_secret_key(&secp, &secret);

        let mut referral = Referral {
            version: referral::CURRENT_VERSION,
            parent_address: parent,
            address_type: AddressType::PubkeyHash,
            key_hash,
            pubkey: public.serialize(),
            alias: None,
            signature: Vec::new(),
        };

        let digest = Hasher::<256>::hash(&referral.signing_payload());
        let message = secp256k1::Message::from_digest_slice(digest.as_ref()).unwrap();
        let signature = secp.sign_ecdsa(&message, &secret);
        referral.signature = signature.serialize_der().to_vec();
        referral
    }

    fn params() -> CgsParams {
        CgsParams {
            coin_maturity: 1_000_000,
            new_coin_maturity: 1_000_000,
            b: Decimal::from(0i64),
            s: Decimal::from(1i64),
        }
    }

    #[test]
    fn larger_balance_scores_at_least_as_high() {
        let graph_path = tempfile::tempdir().unwrap().into_path();
        let coins_path = tempfile::tempdir().unwrap().into_path();
        let mut graph = ReferralGraph::open(&graph_path).unwrap();
        let mut coins = CoinAgeIndex::open(&coins_path).unwrap();

        let genesis = signed_referral(Address::zero(), Hash::from([1u8; 20]));
        let genesis_addr = genesis.address();
        graph.insert(genesis, 0, true).unwrap();

        let rich = signed_referral(genesis_addr, Hash::from([2u8; 20]));
        let rich_addr = rich.address();
        graph.insert(rich, 1, true).unwrap();

        let poor = signed_referral(genesis_addr, Hash::from([3u8; 20]));
        let poor_addr = poor.address();
        graph.insert(poor, 1, true).unwrap();

        coins
            .insert(
                1,
                0,
                UnspentOutput {
                    txid: Hash::from([9u8; 32]),
                    vout: 0,
                    address: rich_addr,
                    value: 1_000_000,
                    height: 1,
                    is_invite: false,
                    is_coinbase: false,
                },
            )
            .unwrap();
        coins
            .insert(
                1,
                1,
                UnspentOutput {
                    txid: Hash::from([10u8; 32]),
                    vout: 0,
                    address: poor_addr,
                    value: 10,
                    height: 1,
                    is_invite: false,
                    is_coinbase: false,
                },
            )
            .unwrap();

        let ctx = CgsContext::build(&graph, &coins, params(), 1_000, genesis_addr).unwrap();

        let rich_score = ctx.community_growth_score(rich_addr).unwrap();
        let poor_score = ctx.community_growth_score(poor_addr).unwrap();
        assert!(rich_score >= poor_score);

        ReferralGraph::destroy(&graph_path).ok();
        CoinAgeIndex::destroy(&coins_path).ok();
    }

    #[test]
    fn unknown_address_is_rejected() {
        let graph_path = tempfile::tempdir().unwrap().into_path();
        let coins_path = tempfile::tempdir().unwrap().into_path();
        let mut graph = ReferralGraph::open(&graph_path).unwrap();
        let coins = CoinAgeIndex::open(&coins_path).unwrap();

        let genesis = signed_referral(Address::zero(), Hash::from([1u8; 20]));
        let genesis_addr = genesis.address();
        graph.insert(genesis, 0, true).unwrap();

        let ctx = CgsContext::build(&graph, &coins, params(), 1_000, genesis_addr).unwrap();
        let stray = Address::from([42u8; 20]);
        assert!(matches!(
            ctx.community_growth_score(stray),
            Err(CgsError::UnknownAddress(_))
        ));

        ReferralGraph::destroy(&graph_path).ok();
        CoinAgeIndex::destroy(&coins_path).ok();
    }
}
