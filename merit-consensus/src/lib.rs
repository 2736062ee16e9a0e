//! Block header wire format, the consensus parameter table, difficulty
//! retarget, and block undo records (§3.1, §4.8, §6.3, §6.4, §9).

pub mod context;
pub mod header;
pub mod retarget;
pub mod undo;

pub use context::{Network, NodeContext, Ratio};
pub use header::{BlockHeader, CuckooProof, FullBlockHeader, HEADER_BYTES, PROOF_SIZE};
pub use undo::{BlockUndo, InviteTxUndo, LotteryUndo, TxUndo, LOTTERY_UNDO_SENTINEL};
