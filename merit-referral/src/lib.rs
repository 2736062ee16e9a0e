//! The permissioned address space: the referral graph that gates which
//! addresses may ever receive funds, its ANV bookkeeping, and the UTXO /
//! invite-token indices the CGS engine and lotteries read from.

pub mod address;
pub mod graph;
pub mod keys;
pub mod referral;
pub mod utxo;
pub mod varint;

pub use address::{root_address, Address, AddressType};
pub use graph::{GraphError, ReferralGraph};
pub use referral::{normalise_alias, Referral};
pub use utxo::{AddressIndexKey, AddressUnspentKey, CoinAgeIndex, UnspentOutput};
