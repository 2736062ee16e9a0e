use merit_crypto::hash::Hash;

/// `C/<parent20>/<addr20>` compound key used for child enumeration.
/// Fixed 40-byte width lets the graph seek to `(parent, 0x00..)` as a
/// cheap lower bound and scan forward while the parent prefix matches.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct DBParentChild(pub Hash<20>, pub Hash<20>);

impl DBParentChild {
    pub fn lower_bound(parent: Hash<20>) -> Self {
        Self(parent, Hash::zero())
    }

    pub fn parent(&self) -> Hash<20> {
        self.0
    }

    pub fn child(&self) -> Hash<20> {
        self.1
    }
}

impl From<DBParentChild> for Box<[u8]> {
    fn from(value: DBParentChild) -> Self {
        let mut out = Vec::with_capacity(40);
        out.extend_from_slice(value.0.as_ref());
        out.extend_from_slice(value.1.as_ref());
        out.into()
    }
}

impl From<Box<[u8]>> for DBParentChild {
    fn from(value: Box<[u8]>) -> Self {
        assert_eq!(value.len(), 40);
        let parent: [u8; 20] = value[0..20].try_into().unwrap();
        let child: [u8; 20] = value[20..40].try_into().unwrap();
        Self(Hash::from(parent), Hash::from(child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let key = DBParentChild(Hash::from([1u8; 20]), Hash::from([2u8; 20]));
        let raw: Box<[u8]> = key.into();
        assert_eq!(raw.len(), 40);
        let back = DBParentChild::from(raw);
        assert_eq!(key, back);
    }

    #[test]
    fn ordering_groups_by_parent_first() {
        let a = DBParentChild(Hash::from([1u8; 20]), Hash::from([9u8; 20]));
        let b = DBParentChild(Hash::from([2u8; 20]), Hash::from([0u8; 20]));
        assert!(a < b);
    }
}
