use crate::hash::Hash;
use cryptoxide::blake2b::Blake2b;

/// handy method to create a hash of given `BITS` bit size.
///
/// The hash algorithm is `Blake2b`. Merit uses `256` for block/transaction/
/// referral hashes and `160` for address digests.
///
/// # Generate a cryptographic hash with Blake2b 256
///
/// ```
/// # use merit_crypto::hash::Hasher;
///
/// let mut hasher = Hasher::<256>::new();
/// hasher.input(b"My transaction");
///
/// let digest = hasher.finalize();
/// ```
///
/// # Generate a cryptographic hash with Blake2b 160
///
/// This is used to generate the hash of public keys for addresses.
///
/// ```
/// # use merit_crypto::hash::Hasher;
///
/// let digest = Hasher::<160>::hash(b"My Public Key");
/// ```
pub struct Hasher<const BITS: usize>(Blake2b);

impl<const BITS: usize> Hasher<BITS> {
    /// update the [`Hasher`] with the given inputs
    #[inline]
    pub fn input(&mut self, bytes: &[u8]) {
        use cryptoxide::digest::Digest as _;
        self.0.input(bytes);
    }
}

macro_rules! common_hasher {
    ($size:literal) => {
        impl Hasher<$size> {
            /// create a new [`Hasher`]
            #[inline]
            pub fn new() -> Self {
                Self(Blake2b::new($size / 8))
            }

            /// convenient function to directly generate the hash
            /// of the given bytes without creating the intermediary
            /// types [`Hasher`] and calling [`Hasher::input`].
            #[inline]
            pub fn hash(bytes: &[u8]) -> Hash<{ $size / 8 }> {
                let mut hasher = Self::new();
                hasher.input(bytes);
                hasher.finalize()
            }

            /// hash bytes prefixed by a one-byte domain tag, so the same
            /// payload hashes differently depending on the kind of object
            /// it belongs to (referral vs. transaction vs. header).
            #[inline]
            pub fn hash_tagged(bytes: &[u8], tag: u8) -> Hash<{ $size / 8 }> {
                let mut hasher = Self::new();
                hasher.input(&[tag]);
                hasher.input(bytes);
                hasher.finalize()
            }

            /// consume the [`Hasher`] and returns the computed digest
            pub fn finalize(mut self) -> Hash<{ $size / 8 }> {
                use cryptoxide::digest::Digest as _;
                let mut hash = [0; $size / 8];
                self.0.result(&mut hash);
                Hash::new(hash)
            }
        }

        impl Default for Hasher<$size> {
            fn default() -> Self {
                Self::new()
            }
        }
    };
}

common_hasher!(160);
common_hasher!(224);
common_hasher!(256);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = Hasher::<256>::hash(b"merit");
        let b = Hasher::<256>::hash(b"merit");
        assert_eq!(a, b);
    }

    #[test]
    fn tagged_differs_from_untagged() {
        let plain = Hasher::<256>::hash(b"payload");
        let tagged = Hasher::<256>::hash_tagged(b"payload", 1);
        assert_ne!(plain, tagged);
    }
}
