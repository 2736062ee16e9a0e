//! Cuckoo Cycle proof-of-work (§4.6/§4.7): a bipartite graph whose edges
//! are keyed siphashes of the block header, and the fixed-length cycle
//! that constitutes a valid proof.

pub mod edge;
pub mod solver;
pub mod verifier;

pub use edge::{edge_endpoints, siphash_keys_from_header};
pub use solver::find_cycle;
pub use verifier::{verify, CuckooError};
