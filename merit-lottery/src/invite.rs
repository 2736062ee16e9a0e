//! InviteLottery (§4.5): the control loop that sets how many invites
//! mint per block, across the three historical algorithms gated by
//! activation height.
//!
//! `*_fixed` quantities are fixed-point integers scaled by
//! [`FIXED_SCALE`] rather than floats: the window means this control
//! loop compares feed directly into a winner *count*, and a
//! floating-point mean would make that count platform-dependent in
//! exactly the way §9's "Arithmetic precision" note warns about for the
//! CGS engine. Fixed-point keeps it bit-exact across implementations.

use merit_consensus::NodeContext;
use merit_referral::Address;

use crate::sampler::{select_winners, WeightedCandidate};

pub const FIXED_SCALE: u64 = 1_000_000;

/// Which of the three historical control algorithms applies, selected
/// strictly by tip height (§4.5: "implementations MUST select the
/// algorithm strictly by tip height against the declared activation
/// heights").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Algorithm {
    PreDaedalus,
    Daedalus,
    PostImp,
}

pub fn algorithm_at(ctx: &NodeContext, height: u64) -> Algorithm {
    if height >= ctx.imp_invites_blockheight {
        Algorithm::PostImp
    } else if height >= ctx.daedalus_blockheight {
        Algorithm::Daedalus
    } else {
        Algorithm::PreDaedalus
    }
}

/// Raw counts over one `imp_block_window`-sized window (§4.5 point 1).
/// `invites_used` only counts invites that confirmed a *newly beaconed*
/// address once `imp_invites_blockheight` has activated; below that
/// height every spent invite counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowCounters {
    pub invites_used: u64,
    pub invites_created: u64,
}

fn mean_used_fixed(window: &WindowCounters, block_window: u64) -> u64 {
    if block_window == 0 {
        0
    } else {
        window.invites_used.saturating_mul(FIXED_SCALE) / block_window
    }
}

fn floor_fixed(x: u64) -> u64 {
    x / FIXED_SCALE
}

/// `ceil(max(a - b, 0) / FIXED_SCALE)`, the growth term in point 4.
fn ceil_growth_fixed(a: u64, b: u64) -> u64 {
    if a <= b {
        0
    } else {
        let diff = a - b;
        (diff + FIXED_SCALE - 1) / FIXED_SCALE
    }
}

/// §4.5 points 2-4: the number of invite winners for this block, dispatched
/// by [`algorithm_at`] over `height` (§4.5: "implementations MUST select
/// the algorithm strictly by tip height"; §9 "the old pre-Daedalus invite-
/// lottery path is retained under a height gate").
pub fn total_winners(
    ctx: &NodeContext,
    height: u64,
    blocks_elapsed: u64,
    current: &WindowCounters,
    previous: &WindowCounters,
) -> u64 {
    match algorithm_at(ctx, height) {
        Algorithm::PostImp => imp_total_winners(ctx, blocks_elapsed, current, previous),
        Algorithm::Daedalus | Algorithm::PreDaedalus => old_total_winners(ctx, height, current),
    }
}

/// Post-IMP control loop (`ImpComputeTotalInviteLotteryWinners`): grow or
/// shrink exponentially around the window mean, never below the
/// miner-reward/min-lottery floor.
fn imp_total_winners(
    ctx: &NodeContext,
    blocks_elapsed: u64,
    current: &WindowCounters,
    previous: &WindowCounters,
) -> u64 {
    let min_miner_invites = blocks_elapsed / ctx.imp_miner_reward_for_every_x_blocks.max(1);
    let min_lottery_invites = blocks_elapsed / ctx.imp_min_one_invite_for_every_x_blocks.max(1);
    let min_invites = min_miner_invites + min_lottery_invites;

    // point 3: enforce the floor if the window as a whole minted fewer
    // invites than the consensus minimum demands.
    if current.invites_created < min_invites {
        return current.invites_used + min_lottery_invites;
    }

    // point 4: otherwise grow/shrink exponentially around the mean,
    // never below the same floor.
    let mean_used = mean_used_fixed(current, ctx.imp_block_window);
    let mean_used_prev = mean_used_fixed(previous, ctx.imp_block_window);
    let grown = floor_fixed(mean_used) + ceil_growth_fixed(mean_used, mean_used_prev);

    min_invites.max(grown)
}

/// Pre-IMP control loop (`OldComputeTotalInviteLotteryWinners`), shared by
/// the pre-Daedalus and Daedalus eras: for the first window after Daedalus
/// activates (`period < 1`, which also covers every height before
/// activation), mint at the maximum rate to kickstart the lottery.
/// Afterwards, replace what was used last window, or — if nothing was
/// created at all — the used count plus a starvation floor.
fn old_total_winners(ctx: &NodeContext, height: u64, current: &WindowCounters) -> u64 {
    let block_window = ctx.daedalus_block_window.max(1) as i64;
    let period = (height as i64 - ctx.daedalus_blockheight as i64) / block_window;

    if period < 1 {
        return ctx.daedalus_max_invites_per_block;
    }

    if current.invites_created == 0 {
        return current.invites_used
            + ctx.daedalus_block_window / ctx.daedalus_min_one_invite_for_every_x_blocks.max(1);
    }

    let invites_used_per_block = current.invites_used / ctx.daedalus_block_window.max(1);
    invites_used_per_block.min(ctx.daedalus_max_invites_per_block)
}

/// A beaconed address eligible to win invites this block: either
/// already confirmed or not yet confirmed (§4.5 point 5's "union of two
/// pools"), each carrying its own pool weight so the two pools can be
/// mixed per a consensus-weighted ratio.
#[derive(Clone, Copy, Debug)]
pub struct InviteCandidate {
    pub address: Address,
    pub confirmed: bool,
    pub outstanding_invites: u32,
    pub pool_weight: f64,
}

/// §4.5 point 5: sample `n` winners from the union of confirmed and
/// not-yet-confirmed beaconed addresses, excluding anyone already at the
/// outstanding-invite cap, using the same sampler the ambassador lottery
/// uses (uniform weight per candidate — the "consensus-weighted ratio"
/// between the two pools is expressed through `pool_weight`, not through
/// a CGS-style per-address weight; invites are not a reward for stake).
pub fn select_invite_winners(
    ctx: &NodeContext,
    seed: &[u8],
    candidates: &[InviteCandidate],
    n: u64,
) -> Vec<Address> {
    let weighted: Vec<WeightedCandidate> = candidates
        .iter()
        .filter(|c| c.outstanding_invites < ctx.max_outstanding_invites_per_address)
        .map(|c| WeightedCandidate {
            address: c.address,
            weight: c.pool_weight,
        })
        .collect();

    select_winners(seed, &weighted, n as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> NodeContext {
        NodeContext::mainnet()
    }

    #[test]
    fn algorithm_selection_is_height_gated() {
        let mut ctx = ctx();
        ctx.daedalus_blockheight = 100;
        ctx.imp_invites_blockheight = 200;
        assert_eq!(algorithm_at(&ctx, 50), Algorithm::PreDaedalus);
        assert_eq!(algorithm_at(&ctx, 150), Algorithm::Daedalus);
        assert_eq!(algorithm_at(&ctx, 250), Algorithm::PostImp);
    }

    #[test]
    fn empty_window_mints_exactly_the_floor() {
        // §8 scenario 7: a window with nothing created and nothing used
        // mints exactly `blocks / imp_min_one_invite_for_every_x_blocks`
        // (point 3's floor is `invites_used_fixed + min_lottery_invites`,
        // not `min_invites` itself).
        let ctx = ctx();
        let window = WindowCounters::default();
        let blocks = 144;
        let winners = total_winners(&ctx, 0, blocks, &window, &window);
        let expected = blocks / ctx.imp_min_one_invite_for_every_x_blocks;
        assert_eq!(winners, expected);
    }

    #[test]
    fn growth_never_drops_below_the_floor() {
        let ctx = ctx();
        let current = WindowCounters {
            invites_used: 0,
            invites_created: 0,
        };
        let previous = WindowCounters {
            invites_used: ctx.imp_block_window * 10,
            invites_created: ctx.imp_block_window * 10,
        };
        let winners = total_winners(&ctx, 0, 10, &current, &previous);
        let min_miner_invites = 10 / ctx.imp_miner_reward_for_every_x_blocks;
        let min_lottery_invites = 10 / ctx.imp_min_one_invite_for_every_x_blocks;
        assert!(winners >= min_miner_invites + min_lottery_invites);
    }

    /// Before Daedalus has run one full window, `old_total_winners` mints at
    /// the maximum rate to kickstart the lottery — covers both heights prior
    /// to activation and the first window after it (`period < 1`).
    #[test]
    fn pre_and_early_daedalus_mints_at_the_max_rate() {
        let mut ctx = ctx();
        ctx.daedalus_blockheight = 1_000;
        ctx.imp_invites_blockheight = 10_000;
        let window = WindowCounters::default();

        assert_eq!(algorithm_at(&ctx, 500), Algorithm::PreDaedalus);
        assert_eq!(
            total_winners(&ctx, 500, 0, &window, &window),
            ctx.daedalus_max_invites_per_block
        );

        assert_eq!(algorithm_at(&ctx, 1_500), Algorithm::Daedalus);
        assert_eq!(
            total_winners(&ctx, 1_500, 0, &window, &window),
            ctx.daedalus_max_invites_per_block
        );
    }

    /// Once Daedalus is past its first window, an empty window replaces
    /// nothing used plus the starvation floor; a window with both used and
    /// created invites replaces what was used, capped at the per-block max.
    #[test]
    fn steady_state_daedalus_replaces_usage() {
        let mut ctx = ctx();
        ctx.daedalus_blockheight = 0;
        ctx.imp_invites_blockheight = 1_000_000;
        let height = ctx.daedalus_block_window * 2;

        let empty = WindowCounters::default();
        let expected_empty_floor =
            ctx.daedalus_block_window / ctx.daedalus_min_one_invite_for_every_x_blocks;
        assert_eq!(
            total_winners(&ctx, height, 0, &empty, &empty),
            expected_empty_floor
        );

        let used = WindowCounters {
            invites_used: ctx.daedalus_block_window * ctx.daedalus_max_invites_per_block * 2,
            invites_created: 1,
        };
        assert_eq!(
            total_winners(&ctx, height, 0, &used, &used),
            ctx.daedalus_max_invites_per_block
        );
    }
}
