//! `NodeContext` (§9 "Global mutable state"): the consensus parameter
//! table threaded by reference into every subsystem, replacing the
//! module-level globals the source keeps chain parameters in. One value
//! per network; built once at node startup and never mutated.

use serde::{Deserialize, Serialize};

/// Which consensus rule set is active. Affects difficulty retarget (§4.8:
/// "regtest never retargets", "testnet min-difficulty escape") and which
/// activation heights are reachable in practice.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

/// A rational weight expressed as `numerator / denominator`, used for the
/// `B`/`S` convex-weighting dials and the ambassador cut so the table
/// below stays exact integers instead of floats (§9 "Arithmetic
/// precision": pick one precise representation and stick to it end to
/// end; callers lift these into a `Decimal` at the CGS boundary).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ratio {
    pub numerator: u64,
    pub denominator: u64,
}

impl Ratio {
    pub const fn new(numerator: u64, denominator: u64) -> Self {
        Self {
            numerator,
            denominator,
        }
    }
}

/// Every chain parameter consumed by ANV/CGS (§4.2), the two lotteries
/// (§4.4, §4.5), difficulty retarget (§4.8), and alias normalisation
/// (§4.1) — one value, constructed once per [`Network`] and passed by
/// reference. No subsystem reads a global.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeContext {
    pub network: Network,

    // §6.5 / §4.2: CGS aging curves.
    pub coin_maturity: u64,
    pub new_coin_maturity: u64,
    pub convex_b: Ratio,
    pub convex_s: Ratio,

    // §4.4: AmbassadorLottery.
    pub pog2_initial_ambassador_stake: i64,
    pub max_outstanding_invites_per_address: u32,
    pub max_outstanding_invites_per_address_pre_pog2: u32,
    pub ambassador_percent_cut: Ratio,
    pub pog2_total_winning_ambassadors: u32,

    // §4.5: InviteLottery, post-IMP.
    pub imp_block_window: u64,
    pub imp_miner_reward_for_every_x_blocks: u64,
    pub imp_min_one_invite_for_every_x_blocks: u64,

    // §4.5: InviteLottery, pre-IMP (Daedalus-era) control loop. Distinct
    // window/rate dials from the `imp_*` ones above — the two algorithms
    // were never the same formula with different constants.
    pub daedalus_block_window: u64,
    pub daedalus_max_invites_per_block: u64,
    pub daedalus_min_one_invite_for_every_x_blocks: u64,

    // §4.1/§4.5: height gates. A reimplementation MUST select behaviour
    // strictly by tip height against these, never by feature detection.
    pub safer_alias_blockheight: u64,
    pub daedalus_blockheight: u64,
    pub imp_invites_blockheight: u64,
    pub pog2_blockheight: u64,

    // §4.8: difficulty retarget.
    pub difficulty_adjustment_interval: u64,
    pub target_spacing_secs: u64,
    pub n_edge_bits_target_threshold: u32,
    pub edge_bits_allowed: (u8, u8),
    pub pow_limit_bits: u32,

    // §6.5.
    pub max_money: i64,
    pub proof_size: usize,
}

impl NodeContext {
    /// §6.5's table, plus the activation heights and retarget dials the
    /// rest of §4 names but that table doesn't enumerate. Activation
    /// heights below are placeholders for a chain that has not launched;
    /// what matters for consensus-critical correctness is that every
    /// subsystem reads the same value, not what the value is.
    pub fn mainnet() -> Self {
        Self {
            network: Network::Mainnet,

            coin_maturity: 60 * 24 * 30,
            new_coin_maturity: 60 * 24 * 30,
            convex_b: Ratio::new(1, 2),
            convex_s: Ratio::new(1, 2),

            pog2_initial_ambassador_stake: 1_000 * 100_000_000,
            max_outstanding_invites_per_address: 50,
            max_outstanding_invites_per_address_pre_pog2: 500,
            ambassador_percent_cut: Ratio::new(1, 2),
            pog2_total_winning_ambassadors: 15,

            imp_block_window: 1440,
            imp_miner_reward_for_every_x_blocks: 4,
            imp_min_one_invite_for_every_x_blocks: 2,

            daedalus_block_window: 4320,
            daedalus_max_invites_per_block: 10,
            daedalus_min_one_invite_for_every_x_blocks: 10,

            safer_alias_blockheight: 0,
            daedalus_blockheight: 0,
            imp_invites_blockheight: 0,
            pog2_blockheight: 0,

            difficulty_adjustment_interval: 1440,
            target_spacing_secs: 60,
            n_edge_bits_target_threshold: 2,
            edge_bits_allowed: (26, 31),
            pow_limit_bits: 0x1f00ffff,

            max_money: 100_000_000 * 100_000_000,
            proof_size: 42,
        }
    }

    /// Same dials as [`Self::mainnet`], on the network where difficulty
    /// never climbs (§4.8 "regtest never retargets") so local chains stay
    /// mineable without a real solver.
    pub fn regtest() -> Self {
        Self {
            network: Network::Regtest,
            pow_limit_bits: 0x207fffff,
            edge_bits_allowed: (16, 31),
            ..Self::mainnet()
        }
    }

    /// Same dials as [`Self::mainnet`], with the testnet min-difficulty
    /// escape available to [`crate::retarget`] (§4.8).
    pub fn testnet() -> Self {
        Self {
            network: Network::Testnet,
            pow_limit_bits: 0x1e0fffff,
            ..Self::mainnet()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regtest_never_retargets_by_having_a_permissive_pow_limit() {
        let regtest = NodeContext::regtest();
        assert_eq!(regtest.network, Network::Regtest);
        assert_ne!(regtest.pow_limit_bits, NodeContext::mainnet().pow_limit_bits);
    }

    #[test]
    fn networks_share_the_lottery_and_cgs_dials() {
        let mainnet = NodeContext::mainnet();
        let testnet = NodeContext::testnet();
        assert_eq!(mainnet.coin_maturity, testnet.coin_maturity);
        assert_eq!(
            mainnet.pog2_total_winning_ambassadors,
            testnet.pog2_total_winning_ambassadors
        );
    }
}
