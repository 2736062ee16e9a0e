//! Plain SHA-256, used only to derive the SipHash key for compact-block
//! short IDs (`SHA-256(header || nonce)`, low 128 bits). Everything else in
//! the node hashes with `Blake2b` via [`crate::hash`].

use sha2::{Digest, Sha256};

pub fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_digest() {
        let digest = sha256(b"");
        let expected = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
        assert_eq!(hex::encode(digest), expected);
    }
}
