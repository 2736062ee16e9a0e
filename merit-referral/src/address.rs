use merit_crypto::hash::Hash;
use std::fmt;

/// A 160-bit address identifier: the hash of a spending key, script, or
/// parameterised script.
pub type Address = Hash<20>;

/// The kind of object an [`Address`] commits to. Unknown values are
/// rejected when a referral referencing them is validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AddressType {
    PubkeyHash = 1,
    ScriptHash = 2,
    ParamScriptHash = 3,
}

impl AddressType {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            1 => Some(Self::PubkeyHash),
            2 => Some(Self::ScriptHash),
            3 => Some(Self::ParamScriptHash),
            _ => None,
        }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AddressType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::PubkeyHash => "pubkey-hash",
            Self::ScriptHash => "script-hash",
            Self::ParamScriptHash => "param-script-hash",
        };
        f.write_str(s)
    }
}

/// the all-zero address used as the parent of the genesis referral.
pub fn root_address() -> Address {
    Address::zero()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_known_values() {
        for (v, ty) in [
            (1u8, AddressType::PubkeyHash),
            (2, AddressType::ScriptHash),
            (3, AddressType::ParamScriptHash),
        ] {
            assert_eq!(AddressType::from_u8(v), Some(ty));
            assert_eq!(ty.to_u8(), v);
        }
    }

    #[test]
    fn rejects_unknown_type() {
        assert_eq!(AddressType::from_u8(0), None);
        assert_eq!(AddressType::from_u8(4), None);
    }
}
