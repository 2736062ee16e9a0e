use merit_crypto::hash::Hash;

mod store;

#[cfg(test)]
mod tests;

pub type BlockHeight = u64;
pub type BlockHash = Hash<32>;
/// serialised block header bytes, opaque to the store.
pub type HeaderBytes = Vec<u8>;

pub use store::*;
