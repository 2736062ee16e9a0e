use crate::address::{Address, AddressType};
use crate::varint;
use merit_crypto::hash::{Hash, Hasher};
use std::io::{Cursor, Read, Write};
use thiserror::Error;

pub const MIN_ALIAS_LEN: usize = 2;
pub const MAX_ALIAS_LEN: usize = 20;

#[derive(Error, Debug)]
pub enum Error {
    #[error("unexpected end of referral buffer")]
    UnexpectedEof,
    #[error("unknown referral version {0}")]
    UnknownVersion(u8),
    #[error("unknown address type {0}")]
    UnknownAddressType(u8),
    #[error("alias too long: {0} bytes")]
    AliasTooLong(usize),
    #[error("alias too short: {0} bytes")]
    AliasTooShort(usize),
    #[error("alias contains a disallowed character")]
    AliasInvalidChar,
    #[error("alias has a leading '.'")]
    AliasLeadingDot,
    #[error("signature does not verify under pubkey")]
    BadSignature,
    #[error("malformed public key")]
    BadPubkey,
    #[error("malformed signature encoding")]
    BadSignatureEncoding,
}

pub const CURRENT_VERSION: u8 = 1;

/// `(version, parent_address, address_type, key_hash, pubkey, signature, alias?)`
///
/// "this address is invited into the graph and I (pubkey) vouch".
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Referral {
    pub version: u8,
    pub parent_address: Address,
    pub address_type: AddressType,
    pub key_hash: Address,
    pub pubkey: [u8; 33],
    pub alias: Option<String>,
    pub signature: Vec<u8>,
}

impl Referral {
    /// the address this referral beacons: the hash of its own key/script
    /// material (`key_hash`), tagged by `address_type`. Distinct from the
    /// `parent_address`, which is whoever vouched for it.
    pub fn address(&self) -> Address {
        self.key_hash
    }

    /// canonical serialisation of the fields the signature covers: every
    /// field except the signature itself. Per the wire format the
    /// referral's own hash is computed over the *whole* encoding
    /// (including signature) but the signature covers only this payload.
    pub fn signing_payload(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_unsigned(&mut cursor);
        cursor.into_inner()
    }

    fn write_unsigned(&self, cursor: &mut Cursor<Vec<u8>>) {
        cursor.write_all(&[self.version]).unwrap();
        cursor.write_all(self.parent_address.as_ref()).unwrap();
        cursor.write_all(&[self.address_type.to_u8()]).unwrap();
        cursor.write_all(self.key_hash.as_ref()).unwrap();
        cursor.write_all(&self.pubkey).unwrap();

        let alias_bytes = self.alias.as_deref().unwrap_or("").as_bytes();
        varint::write(cursor, alias_bytes.len() as u64);
        cursor.write_all(alias_bytes).unwrap();
    }

    /// `[ version:u8 | parent_address:20B | address_type:u8 | key_hash:20B
    ///  | pubkey:33B | alias_len:varint | alias:bytes | signature:64..72B ]`
    pub fn encode(&self) -> Vec<u8> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_unsigned(&mut cursor);
        cursor.write_all(&self.signature).unwrap();
        cursor.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = Cursor::new(bytes);

        let mut version = [0u8; 1];
        cursor
            .read_exact(&mut version)
            .map_err(|_| Error::UnexpectedEof)?;
        let version = version[0];
        if version != CURRENT_VERSION {
            return Err(Error::UnknownVersion(version));
        }

        let mut parent_address = [0u8; 20];
        cursor
            .read_exact(&mut parent_address)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut address_type = [0u8; 1];
        cursor
            .read_exact(&mut address_type)
            .map_err(|_| Error::UnexpectedEof)?;
        let address_type = AddressType::from_u8(address_type[0])
            .ok_or(Error::UnknownAddressType(address_type[0]))?;

        let mut key_hash = [0u8; 20];
        cursor
            .read_exact(&mut key_hash)
            .map_err(|_| Error::UnexpectedEof)?;

        let mut pubkey = [0u8; 33];
        cursor
            .read_exact(&mut pubkey)
            .map_err(|_| Error::UnexpectedEof)?;

        let alias_len = varint::read(&mut cursor).map_err(|_| Error::UnexpectedEof)? as usize;
        let mut alias_bytes = vec![0u8; alias_len];
        cursor
            .read_exact(&mut alias_bytes)
            .map_err(|_| Error::UnexpectedEof)?;
        let alias = if alias_bytes.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&alias_bytes).into_owned())
        };

        let mut signature = Vec::new();
        cursor
            .read_to_end(&mut signature)
            .map_err(|_| Error::UnexpectedEof)?;

        Ok(Self {
            version,
            parent_address: Hash::from(parent_address),
            address_type,
            key_hash: Hash::from(key_hash),
            pubkey,
            alias,
            signature,
        })
    }

    /// the hash identifying this referral on-chain: the full encoding
    /// (signature included), tagged so it cannot collide with a
    /// transaction or block hash of the same bytes.
    pub fn hash(&self) -> Hash<32> {
        Hasher::<256>::hash_tagged(&self.encode(), 1)
    }

    /// verify `signature` was produced by `pubkey` over `signing_payload`.
    pub fn verify_signature(&self) -> Result<(), Error> {
        use secp256k1::ecdsa::Signature;
        use secp256k1::{Message, PublicKey, Secp256k1};

        let secp = Secp256k1::verification_only();
        let pubkey = PublicKey::from_slice(&self.pubkey).map_err(|_| Error::BadPubkey)?;
        let signature =
            Signature::from_der(&self.signature).map_err(|_| Error::BadSignatureEncoding)?;

        let digest = Hasher::<256>::hash(&self.signing_payload());
        let message = Message::from_digest_slice(digest.as_ref()).map_err(|_| Error::BadSignature)?;

        secp.verify_ecdsa(&message, &signature, &pubkey)
            .map_err(|_| Error::BadSignature)
    }
}

/// Normalise and validate an alias per the referral graph's rules.
///
/// `safer_alias_active` selects between the strict post-activation rules
/// (case-folded ASCII restricted to `[A-Za-z0-9_.-]`, no leading dot,
/// length 2..=20) and the looser pre-activation rules (length only).
/// Implementations MUST honour the height gate bit-for-bit: this is a pure
/// function of the flag, the caller looks up the flag from chain height.
pub fn normalise_alias(raw: &str, safer_alias_active: bool) -> Result<String, Error> {
    if raw.is_empty() {
        return Ok(String::new());
    }

    if !safer_alias_active {
        if raw.len() > MAX_ALIAS_LEN {
            return Err(Error::AliasTooLong(raw.len()));
        }
        return Ok(raw.to_ascii_lowercase());
    }

    if raw.len() < MIN_ALIAS_LEN {
        return Err(Error::AliasTooShort(raw.len()));
    }
    if raw.len() > MAX_ALIAS_LEN {
        return Err(Error::AliasTooLong(raw.len()));
    }
    if raw.starts_with('.') {
        return Err(Error::AliasLeadingDot);
    }
    if !raw
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
    {
        return Err(Error::AliasInvalidChar);
    }

    Ok(raw.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Referral {
        Referral {
            version: CURRENT_VERSION,
            parent_address: Address::zero(),
            address_type: AddressType::PubkeyHash,
            key_hash: Hash::from([7u8; 20]),
            pubkey: [2u8; 33],
            alias: Some("alice".to_string()),
            signature: vec![0u8; 70],
        }
    }

    #[test]
    fn wire_round_trip() {
        let r = sample();
        let encoded = r.encode();
        let decoded = Referral::decode(&encoded).unwrap();
        assert_eq!(r, decoded);
    }

    #[test]
    fn empty_alias_round_trips_as_none() {
        let mut r = sample();
        r.alias = None;
        let encoded = r.encode();
        let decoded = Referral::decode(&encoded).unwrap();
        assert_eq!(decoded.alias, None);
    }

    #[test]
    fn unknown_address_type_rejected() {
        let mut bytes = sample().encode();
        bytes[21] = 9; // address_type byte
        assert!(matches!(
            Referral::decode(&bytes),
            Err(Error::UnknownAddressType(9))
        ));
    }

    #[test]
    fn safer_alias_rejects_upper_and_short_and_leading_dot() {
        assert!(normalise_alias("Alice", true).is_ok());
        assert_eq!(
            normalise_alias("Alice", true).unwrap(),
            normalise_alias("alice", true).unwrap()
        );
        assert!(normalise_alias("a", true).is_err());
        assert!(normalise_alias(".bob", true).is_err());
        assert!(normalise_alias("bad!name", true).is_err());
    }

    #[test]
    fn pre_activation_rules_are_looser() {
        assert!(normalise_alias("a", false).is_ok());
        assert!(normalise_alias(".bob", false).is_ok());
    }

    #[test]
    fn empty_alias_always_permitted() {
        assert_eq!(normalise_alias("", true).unwrap(), "");
        assert_eq!(normalise_alias("", false).unwrap(), "");
    }
}
