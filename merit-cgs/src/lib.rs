//! The ANV/CGS engine (§4.2): age-decayed balances and the convex
//! community growth score that weights the ambassador and invite
//! lotteries. ANV itself (the linear running sum) lives in
//! [`merit_referral::ReferralGraph`]; this crate is the non-linear layer
//! on top, read fresh for each tip via [`CgsContext`].

pub mod aged_balance;
pub mod contribution;
pub mod context;
pub mod convex;
mod decimal;
pub mod params;

pub use aged_balance::{age_scale, aged_value};
pub use context::{CgsContext, CgsError};
pub use contribution::{NodeContribution, SubtreeContribution};
pub use convex::convex_f;
pub use params::CgsParams;
