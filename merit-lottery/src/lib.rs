//! AmbassadorLottery and InviteLottery (§4.4, §4.5): deterministic
//! weighted sampling over the referral graph and the control loop that
//! sizes each block's invite mint.

pub mod ambassador;
pub mod invite;
pub mod sampler;

pub use ambassador::{run as run_ambassador_lottery, AmbassadorCandidate, AmbassadorLotteryResult};
pub use invite::{select_invite_winners, total_winners as invite_total_winners, Algorithm as InviteAlgorithm};
