//! Kademlia node Id or a lookup target
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Debug, Display, Formatter},
    str::FromStr,
};

use crate::{Error, Result};

/// The size of node IDs in bytes.
pub const ID_SIZE: usize = 20;
/// The size of node IDs in bits.
pub const ID_BITS: usize = ID_SIZE * 8;

#[derive(Clone, Copy, PartialEq, Ord, PartialOrd, Eq, Hash, Default, Serialize, Deserialize)]
/// Kademlia node Id or a lookup target.
///
/// Ordering compares the bytes as a big-endian unsigned integer, so it doubles as the
/// ordering of XOR distances returned by [Id::xor].
pub struct Id(#[serde(with = "serde_bytes")] pub [u8; ID_SIZE]);

impl Id {
    /// Random Id from the thread local rng.
    pub fn random() -> Id {
        Self::random_with(&mut rand::thread_rng())
    }

    /// Random Id drawn from an explicitly passed generator.
    pub fn random_with<R: Rng + ?Sized>(rng: &mut R) -> Id {
        let mut bytes = [0_u8; ID_SIZE];
        rng.fill(&mut bytes[..]);

        Id(bytes)
    }

    /// Create a new Id from some bytes. Returns Err if `bytes` is not of length
    /// [ID_SIZE].
    pub fn from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Id> {
        let bytes = bytes.as_ref();
        if bytes.len() != ID_SIZE {
            return Err(Error::InvalidIdSize(bytes.len()));
        }

        let mut tmp: [u8; ID_SIZE] = [0; ID_SIZE];
        tmp.copy_from_slice(bytes);

        Ok(Id(tmp))
    }

    /// Id of the SHA-1 digest of some bytes.
    pub fn hash<T: AsRef<[u8]>>(bytes: T) -> Id {
        Id(sha1_smol::Sha1::from(bytes).digest().bytes())
    }

    /// XOR distance between this Id and another.
    ///
    /// Distance to self is the zero Id, and distances compare with [Ord].
    pub fn xor(&self, other: &Id) -> Id {
        let mut result = [0_u8; ID_SIZE];

        for (i, byte) in result.iter_mut().enumerate() {
            *byte = self.0[i] ^ other.0[i];
        }

        Id(result)
    }

    /// Number of leading bits shared with another Id, between `0` and [ID_BITS].
    pub fn prefix_len(&self, other: &Id) -> usize {
        for i in 0..ID_SIZE {
            let xor = self.0[i] ^ other.0[i];

            if xor != 0 {
                return i * 8 + xor.leading_zeros() as usize;
            }
        }

        ID_BITS
    }

    pub fn as_bytes(&self) -> &[u8; ID_SIZE] {
        &self.0
    }
}

impl FromStr for Id {
    type Err = Error;

    fn from_str(s: &str) -> Result<Id> {
        if s.len() != ID_SIZE * 2 {
            return Err(Error::InvalidId(format!(
                "expected {} hex characters, got {}",
                ID_SIZE * 2,
                s.len()
            )));
        }

        let bytes = hex::decode(s).map_err(|error| Error::InvalidId(error.to_string()))?;

        Id::from_bytes(bytes)
    }
}

impl Display for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Id {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

impl From<[u8; ID_SIZE]> for Id {
    fn from(bytes: [u8; ID_SIZE]) -> Id {
        Id(bytes)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn distance_to_self() {
        let id = Id::random();

        assert_eq!(id.xor(&id), Id::default());
        assert_eq!(id.prefix_len(&id), ID_BITS);
    }

    #[test]
    fn distance_is_symmetric() {
        for _ in 0..50 {
            let a = Id::random();
            let b = Id::random();

            assert_eq!(a.xor(&b), b.xor(&a));
            assert_eq!(a.prefix_len(&b), b.prefix_len(&a));
        }
    }

    #[test]
    fn prefix_len() {
        let a = Id([0; ID_SIZE]);

        let mut b = [0; ID_SIZE];
        b[0] = 0b1000_0000;
        assert_eq!(a.prefix_len(&Id(b)), 0);

        let mut b = [0; ID_SIZE];
        b[1] = 0b0000_0100;
        assert_eq!(a.prefix_len(&Id(b)), 13);

        let mut b = [0; ID_SIZE];
        b[ID_SIZE - 1] = 1;
        assert_eq!(a.prefix_len(&Id(b)), ID_BITS - 1);
    }

    #[test]
    fn distance_orders_big_endian() {
        let target = Id([0; ID_SIZE]);

        let mut near = [0; ID_SIZE];
        near[19] = 0xff;
        let mut far = [0; ID_SIZE];
        far[0] = 0x01;

        assert!(Id(near).xor(&target) < Id(far).xor(&target));
    }

    #[test]
    fn from_str() {
        let str = "5a3ce9c14e7a08645677bbd1cfe7d8f956d53256";
        let id = Id::from_str(str).unwrap();

        assert_eq!(id.to_string(), str);
        assert_eq!(format!("{:?}", id), format!("Id({})", str));
    }

    #[test]
    fn invalid_strings() {
        assert!(matches!(Id::from_str("abc"), Err(Error::InvalidId(_))));
        assert!(matches!(
            Id::from_str("zz3ce9c14e7a08645677bbd1cfe7d8f956d53256"),
            Err(Error::InvalidId(_))
        ));
    }

    #[test]
    fn from_bytes_size() {
        assert!(matches!(Id::from_bytes([0; 19]), Err(Error::InvalidIdSize(19))));
        assert!(Id::from_bytes([7; 20]).is_ok());
    }

    #[test]
    fn seeded_random_is_reproducible() {
        use rand::{rngs::StdRng, SeedableRng};

        let a = Id::random_with(&mut StdRng::seed_from_u64(7));
        let b = Id::random_with(&mut StdRng::seed_from_u64(7));

        assert_eq!(a, b);
    }
}
