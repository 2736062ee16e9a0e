//! Difficulty retarget (§4.8): the `edge_bits` and `bits` dials that are
//! re-tuned every `difficulty_adjustment_interval` blocks.
//!
//! `bits` is Bitcoin's compact 256-bit-target encoding (one exponent byte,
//! three mantissa bytes). This implementation holds the decoded target in
//! a `u128` rather than a full 256-bit integer: every target this spec's
//! `pow_limit_bits` can express (mainnet, testnet, and regtest alike)
//! fits comfortably under `2^128`, and pulling in a big-integer dependency
//! for headroom no test vector here exercises would be scope the solver
//! (`merit_pow::solver`) already rejects for the same reason. Compact
//! values whose true 256-bit target would overflow `u128` saturate to
//! `u128::MAX` instead of wrapping.

use crate::context::NodeContext;

/// Decode a Bitcoin-style compact target into its `u128` value.
/// `bits = exponent:u8 << 24 | mantissa:u24`; `target = mantissa *
/// 256^(exponent - 3)` (right-shifted instead of multiplied when
/// `exponent < 3`).
pub fn bits_to_target(bits: u32) -> u128 {
    let exponent = (bits >> 24) as i32;
    let mantissa = (bits & 0x007f_ffff) as u128;

    if exponent <= 3 {
        mantissa >> (8 * (3 - exponent).max(0))
    } else {
        let shift = 8 * (exponent - 3);
        if shift >= 128 {
            u128::MAX
        } else {
            mantissa.checked_shl(shift as u32).unwrap_or(u128::MAX)
        }
    }
}

/// Encode a `u128` target back into compact form, normalising the
/// mantissa into `[0, 0x7fffff]` and bumping the exponent accordingly
/// (the inverse of [`bits_to_target`]).
pub fn target_to_bits(mut target: u128) -> u32 {
    if target == 0 {
        return 0;
    }

    let mut exponent = 1u32;
    let mut bytes = Vec::new();
    while target > 0 {
        bytes.push((target & 0xff) as u8);
        target >>= 8;
        exponent += 1;
    }
    exponent -= 1;

    // bytes is little-endian; take the top 3 significant bytes, most
    // significant first.
    bytes.reverse();
    while bytes.len() < 3 {
        bytes.push(0);
        exponent += 1;
    }
    let mantissa = ((bytes[0] as u32) << 16) | ((bytes[1] as u32) << 8) | bytes[2] as u32;

    if mantissa & 0x0080_0000 != 0 {
        // top bit of the mantissa is the compact format's sign bit;
        // shift one more byte down to keep it clear.
        let mantissa = mantissa >> 8;
        return ((exponent + 1) << 24) | mantissa;
    }

    (exponent << 24) | mantissa
}

/// Re-tune `edge_bits` (§4.8): harder (increment) when blocks came in
/// faster than `nominal / n_edge_bits_target_threshold`, easier
/// (decrement) when slower than `nominal * threshold`. Retargets landing
/// outside `edge_bits_allowed` are ignored — the dial holds still rather
/// than going out of range.
pub fn retarget_edge_bits(
    ctx: &NodeContext,
    prev_edge_bits: u8,
    actual_timespan_secs: u64,
    nominal_timespan_secs: u64,
) -> u8 {
    let threshold = ctx.n_edge_bits_target_threshold as u64;
    let (min_bits, max_bits) = ctx.edge_bits_allowed;

    let proposed = if actual_timespan_secs.saturating_mul(threshold) < nominal_timespan_secs {
        prev_edge_bits.saturating_add(1)
    } else if actual_timespan_secs > nominal_timespan_secs.saturating_mul(threshold) {
        prev_edge_bits.saturating_sub(1)
    } else {
        prev_edge_bits
    };

    if proposed < min_bits || proposed > max_bits {
        prev_edge_bits
    } else {
        proposed
    }
}

/// Re-tune `bits` (§4.8): clamp the observed timespan to `[nominal/4,
/// nominal*4]`, linearly rescale the previous target by that ratio, and
/// cap the result at `pow_limit_bits` (easier than the floor is not a
/// valid target).
pub fn retarget_bits(
    ctx: &NodeContext,
    prev_bits: u32,
    actual_timespan_secs: u64,
    nominal_timespan_secs: u64,
) -> u32 {
    let clamped = actual_timespan_secs
        .max(nominal_timespan_secs / 4)
        .min(nominal_timespan_secs * 4);

    let prev_target = bits_to_target(prev_bits);
    let new_target = prev_target
        .saturating_mul(clamped as u128)
        / nominal_timespan_secs.max(1) as u128;

    let pow_limit = bits_to_target(ctx.pow_limit_bits);
    let bounded = new_target.min(pow_limit);

    target_to_bits(bounded)
}

/// Testnet's "after 2x block spacing, mine at minimum difficulty"
/// escape (§4.8). Returns `Some(pow_limit_bits)` when the gap since the
/// previous block is more than double the target spacing; `None`
/// otherwise (use the normally-retargeted `bits`). Only meaningful on
/// [`crate::context::Network::Testnet`] — callers on other networks
/// should not invoke this.
pub fn testnet_min_difficulty_escape(
    ctx: &NodeContext,
    prev_block_time: u64,
    current_block_time: u64,
) -> Option<u32> {
    let gap = current_block_time.saturating_sub(prev_block_time);
    if gap > ctx.target_spacing_secs.saturating_mul(2) {
        Some(ctx.pow_limit_bits)
    } else {
        None
    }
}

/// Regtest never retargets (§4.8): the dials are fixed at genesis values
/// for the life of the chain. Callers select this instead of
/// [`retarget_edge_bits`]/[`retarget_bits`] by checking
/// `ctx.network == Network::Regtest` before a retarget boundary at all.
pub fn regtest_holds_difficulty(prev_edge_bits: u8, prev_bits: u32) -> (u8, u32) {
    (prev_edge_bits, prev_bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::NodeContext;

    #[test]
    fn compact_target_round_trips() {
        for bits in [0x1d00ffffu32, 0x1c7fff80, 0x207fffff] {
            let target = bits_to_target(bits);
            let back = target_to_bits(target);
            assert_eq!(bits_to_target(back), target, "bits = {bits:#x}");
        }
    }

    #[test]
    fn faster_than_threshold_increments_edge_bits() {
        let ctx = NodeContext::mainnet();
        let nominal = 1440 * 60;
        let fast = nominal / (ctx.n_edge_bits_target_threshold as u64) - 1;
        let retargeted = retarget_edge_bits(&ctx, 28, fast, nominal);
        assert_eq!(retargeted, 29);
    }

    #[test]
    fn slower_than_threshold_decrements_edge_bits() {
        let ctx = NodeContext::mainnet();
        let nominal = 1440 * 60;
        let slow = nominal * (ctx.n_edge_bits_target_threshold as u64) + 1;
        let retargeted = retarget_edge_bits(&ctx, 28, slow, nominal);
        assert_eq!(retargeted, 27);
    }

    #[test]
    fn edge_bits_retarget_ignored_when_out_of_allowed_set() {
        let ctx = NodeContext::mainnet();
        let nominal = 1440 * 60;
        let fast = nominal / (ctx.n_edge_bits_target_threshold as u64) - 1;
        let retargeted = retarget_edge_bits(&ctx, ctx.edge_bits_allowed.1, fast, nominal);
        assert_eq!(retargeted, ctx.edge_bits_allowed.1);
    }

    #[test]
    fn bits_retarget_never_exceeds_pow_limit() {
        let ctx = NodeContext::mainnet();
        let nominal = 1440 * 60;
        // an absurdly long observed timespan would normally rescale the
        // target upward (easier); it must still be capped at pow_limit.
        let retargeted = retarget_bits(&ctx, ctx.pow_limit_bits, nominal * 1000, nominal);
        assert!(bits_to_target(retargeted) <= bits_to_target(ctx.pow_limit_bits));
    }

    #[test]
    fn testnet_escape_triggers_after_double_spacing() {
        let ctx = NodeContext::testnet();
        let double_spacing = ctx.target_spacing_secs * 2;
        assert_eq!(
            testnet_min_difficulty_escape(&ctx, 1_000, 1_000 + double_spacing),
            None
        );
        assert_eq!(
            testnet_min_difficulty_escape(&ctx, 1_000, 1_000 + double_spacing + 1),
            Some(ctx.pow_limit_bits)
        );
    }

    #[test]
    fn regtest_holds_whatever_it_was_handed() {
        assert_eq!(regtest_holds_difficulty(20, 0x207fffff), (20, 0x207fffff));
    }
}
