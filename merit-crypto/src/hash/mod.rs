//! Cryptographic hashing primitives for Merit
//!
//! * [`Hasher`] streams bytes into a digest without an intermediate buffer
//! * [`struct@Hash`] is a conveniently strongly typed byte array
//!
//! The node hashes block and transaction data with `Blake2b`. Two digest
//! widths are in active use: 256 bits for block/transaction/referral
//! identifiers, and 160 bits for addresses (the digest of a public key,
//! see [`Hasher::<160>::hash`]).
//!
//! # Example
//!
//! ```
//! use merit_crypto::hash::Hasher;
//!
//! let mut hasher = Hasher::<256>::new();
//! hasher.input(b"my key");
//!
//! let digest = hasher.finalize();
//! ```

#[allow(clippy::module_inception)]
mod hash;
mod hasher;
mod serde;

pub use self::{hash::Hash, hasher::Hasher};
