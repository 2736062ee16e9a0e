extern crate core;

pub mod hash;
pub mod memsec;
pub mod sha256;
pub mod siphash;
