//! AmbassadorLottery (§4.4): weighted-by-CGS sampling without
//! replacement over rewardable addresses, and the sub-linear reward
//! split among the winners.

use merit_consensus::NodeContext;
use merit_referral::Address;

use crate::sampler::{select_winners, WeightedCandidate};

/// An address eligible to enter the ambassador lottery, with the data
/// [`is_eligible`] needs. CGS itself (§4.2) is computed upstream by
/// `merit_cgs::CgsContext` and handed in here as a plain integer —
/// pulling the CGS engine's `Decimal` machinery into the lottery would
/// reopen precision questions this module doesn't need to answer twice.
#[derive(Clone, Copy, Debug)]
pub struct AmbassadorCandidate {
    pub address: Address,
    pub cgs: i64,
    pub confirmed: bool,
    pub outstanding_invites: u32,
}

/// §4.4: "confirmed, CGS >= pog2_initial_ambassador_stake, outstanding
/// invites <= max_outstanding_invites_per_address".
pub fn is_eligible(candidate: &AmbassadorCandidate, ctx: &NodeContext) -> bool {
    candidate.confirmed
        && candidate.cgs >= ctx.pog2_initial_ambassador_stake
        && candidate.outstanding_invites <= ctx.max_outstanding_invites_per_address
}

/// One winner's share of the ambassador reward pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AmbassadorReward {
    pub address: Address,
    pub amount: i64,
}

/// The outcome of one block's ambassador lottery: the winners and their
/// shares, plus whatever the sub-linear split left over for the miner
/// (§4.4: "the remainder handed to the miner").
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AmbassadorLotteryResult {
    pub rewards: Vec<AmbassadorReward>,
    pub miner_remainder: i64,
}

/// Run the ambassador lottery for one block: filter to eligible
/// candidates, sample `ctx.pog2_total_winning_ambassadors` winners keyed
/// by `prev_block_hash`, then split `pool` among them proportionally to
/// `ln(1 + CGS)` (§4.4 point 2 and the paragraph below it).
///
/// Failure modes are not errors: an empty eligible set, or fewer
/// eligible candidates than the winner count, both just reduce how many
/// winners get paid — the rest of the pool falls through to
/// `miner_remainder` (§4.4 "Failure modes").
pub fn run(
    ctx: &NodeContext,
    prev_block_hash: &[u8],
    candidates: &[AmbassadorCandidate],
    block_subsidy: i64,
) -> AmbassadorLotteryResult {
    let eligible: Vec<&AmbassadorCandidate> =
        candidates.iter().filter(|c| is_eligible(c, ctx)).collect();

    let weighted: Vec<WeightedCandidate> = eligible
        .iter()
        .map(|c| WeightedCandidate {
            address: c.address,
            weight: c.cgs as f64,
        })
        .collect();

    let winner_addresses = select_winners(
        prev_block_hash,
        &weighted,
        ctx.pog2_total_winning_ambassadors as usize,
    );

    let winners: Vec<&AmbassadorCandidate> = winner_addresses
        .iter()
        .filter_map(|addr| eligible.iter().find(|c| &c.address == addr))
        .copied()
        .collect();

    allocate_pool(&winners, subsidy_pool(ctx, block_subsidy))
}

/// `ambassador_percent_cut` of the block subsidy (§4.4). `subsidy` is the
/// block's total reward before the ambassador cut; computing that
/// subsidy itself (halving schedule) is out of this component's scope.
pub fn subsidy_pool(ctx: &NodeContext, subsidy: i64) -> i64 {
    (subsidy as i128 * ctx.ambassador_percent_cut.numerator as i128
        / ctx.ambassador_percent_cut.denominator as i128) as i64
}

fn allocate_pool(winners: &[&AmbassadorCandidate], pool: i64) -> AmbassadorLotteryResult {
    if winners.is_empty() || pool <= 0 {
        return AmbassadorLotteryResult {
            rewards: Vec::new(),
            miner_remainder: pool,
        };
    }

    let weights: Vec<f64> = winners.iter().map(|c| ((1 + c.cgs) as f64).ln()).collect();
    let total_weight: f64 = weights.iter().sum();

    if total_weight <= 0.0 {
        return AmbassadorLotteryResult {
            rewards: Vec::new(),
            miner_remainder: pool,
        };
    }

    let mut allocated = 0i64;
    let mut rewards = Vec::with_capacity(winners.len());
    for (candidate, weight) in winners.iter().zip(weights.iter()) {
        let share = ((pool as f64) * weight / total_weight).floor() as i64;
        allocated += share;
        rewards.push(AmbassadorReward {
            address: candidate.address,
            amount: share,
        });
    }

    AmbassadorLotteryResult {
        rewards,
        miner_remainder: pool - allocated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use merit_crypto::hash::Hash;

    fn ctx() -> NodeContext {
        NodeContext::mainnet()
    }

    fn candidate(byte: u8, cgs: i64) -> AmbassadorCandidate {
        AmbassadorCandidate {
            address: Hash::from([byte; 20]),
            cgs,
            confirmed: true,
            outstanding_invites: 0,
        }
    }

    #[test]
    fn empty_candidate_set_sends_whole_pool_to_miner() {
        let result = run(&ctx(), b"seed", &[], 1_000_000_000);
        assert!(result.rewards.is_empty());
        assert_eq!(result.miner_remainder, subsidy_pool(&ctx(), 1_000_000_000));
    }

    #[test]
    fn ineligible_candidates_are_excluded() {
        let ctx = ctx();
        let low_cgs = AmbassadorCandidate {
            confirmed: true,
            cgs: ctx.pog2_initial_ambassador_stake - 1,
            ..candidate(1, 0)
        };
        let result = run(&ctx, b"seed", &[low_cgs], 1_000_000_000);
        assert!(result.rewards.is_empty());
    }

    #[test]
    fn reward_split_sums_no_more_than_the_pool() {
        let ctx = ctx();
        let candidates: Vec<AmbassadorCandidate> = (1..=20u8)
            .map(|i| AmbassadorCandidate {
                cgs: ctx.pog2_initial_ambassador_stake + i as i64 * 1000,
                ..candidate(i, 0)
            })
            .collect();
        let result = run(&ctx, b"seed", &candidates, 1_000_000_000);
        let paid: i64 = result.rewards.iter().map(|r| r.amount).sum();
        let pool = subsidy_pool(&ctx, 1_000_000_000);
        assert!(paid + result.miner_remainder == pool);
        assert!(paid <= pool);
    }

    #[test]
    fn winner_count_never_exceeds_configured_total() {
        let ctx = ctx();
        let candidates: Vec<AmbassadorCandidate> = (1..=50u8)
            .map(|i| AmbassadorCandidate {
                cgs: ctx.pog2_initial_ambassador_stake + i as i64,
                ..candidate(i, 0)
            })
            .collect();
        let result = run(&ctx, b"seed", &candidates, 1_000_000_000);
        assert!(result.rewards.len() <= ctx.pog2_total_winning_ambassadors as usize);
    }
}
