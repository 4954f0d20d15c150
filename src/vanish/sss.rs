//! Shamir's secret sharing over GF(256), one polynomial per secret byte.

use std::collections::HashSet;

use gf256::gf256;
use rand::Rng;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
/// A share of a secret, the evaluations of every byte's polynomial at `index`.
pub struct Share {
    /// The x coordinate, starting at 1.
    pub index: u8,
    pub bytes: Vec<u8>,
}

impl Share {
    /// `index || bytes`, the form stored in the DHT.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.bytes.len() + 1);
        bytes.push(self.index);
        bytes.extend_from_slice(&self.bytes);

        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Share> {
        match bytes {
            [index, rest @ ..] if *index != 0 && !rest.is_empty() => Ok(Share {
                index: *index,
                bytes: rest.to_vec(),
            }),
            _ => Err(Error::MalformedShare),
        }
    }
}

/// Split `secret` into `shares` shares, any `threshold` of which recover it.
pub fn split<R: Rng + ?Sized>(
    secret: &[u8],
    shares: u8,
    threshold: u8,
    rng: &mut R,
) -> Result<Vec<Share>> {
    if threshold == 0 || threshold > shares {
        return Err(Error::InvalidShareParameters { shares, threshold });
    }

    let mut result: Vec<Share> = (1..=shares)
        .map(|index| Share {
            index,
            bytes: Vec::with_capacity(secret.len()),
        })
        .collect();

    let mut coefficients = Vec::with_capacity(threshold as usize);

    for &byte in secret {
        coefficients.clear();
        coefficients.push(gf256::new(byte));
        coefficients.extend((1..threshold).map(|_| gf256::new(rng.gen())));

        for share in result.iter_mut() {
            let y = evaluate(&coefficients, gf256::new(share.index));
            share.bytes.push(u8::from(y));
        }
    }

    Ok(result)
}

/// Recover the secret from shares with distinct indices, by interpolating at zero.
///
/// Passing fewer shares than the threshold yields garbage, not an error.
pub fn combine(shares: &[Share]) -> Result<Vec<u8>> {
    let len = match shares.first() {
        Some(share) => share.bytes.len(),
        None => return Err(Error::MalformedShare),
    };

    let mut indices = HashSet::with_capacity(shares.len());

    for share in shares {
        if share.index == 0 || share.bytes.len() != len || !indices.insert(share.index) {
            return Err(Error::MalformedShare);
        }
    }

    let weights: Vec<gf256> = shares
        .iter()
        .map(|share| {
            let xi = gf256::new(share.index);

            shares
                .iter()
                .filter(|other| other.index != share.index)
                .fold(gf256::new(1), |acc, other| {
                    let xj = gf256::new(other.index);
                    acc * xj / (xj - xi)
                })
        })
        .collect();

    let secret = (0..len)
        .map(|i| {
            let y = shares
                .iter()
                .zip(&weights)
                .fold(gf256::new(0), |acc, (share, weight)| {
                    acc + gf256::new(share.bytes[i]) * *weight
                });

            u8::from(y)
        })
        .collect();

    Ok(secret)
}

/// Horner's method, `coefficients[0]` is the constant term.
fn evaluate(coefficients: &[gf256], x: gf256) -> gf256 {
    coefficients
        .iter()
        .rev()
        .fold(gf256::new(0), |acc, &coefficient| acc * x + coefficient)
}

#[cfg(test)]
mod test {
    use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};

    use super::*;

    #[test]
    fn any_threshold_subset_recovers() {
        let mut rng = StdRng::seed_from_u64(1);
        let secret: Vec<u8> = (0..32).map(|_| rng.gen()).collect();

        let shares = split(&secret, 20, 10, &mut rng).unwrap();
        assert_eq!(shares.len(), 20);

        for _ in 0..10 {
            let subset: Vec<Share> = shares.choose_multiple(&mut rng, 10).cloned().collect();
            assert_eq!(combine(&subset).unwrap(), secret);
        }
    }

    #[test]
    fn below_threshold_does_not_recover() {
        let mut rng = StdRng::seed_from_u64(2);
        let secret = b"0123456789abcdef0123456789abcdef".to_vec();

        let shares = split(&secret, 20, 10, &mut rng).unwrap();

        assert_ne!(combine(&shares[..9]).unwrap(), secret);
    }

    #[test]
    fn threshold_one_is_replication() {
        let mut rng = StdRng::seed_from_u64(3);
        let shares = split(b"abc", 3, 1, &mut rng).unwrap();

        for share in &shares {
            assert_eq!(share.bytes, b"abc");
        }
    }

    #[test]
    fn invalid_parameters() {
        let mut rng = StdRng::seed_from_u64(4);

        assert!(matches!(
            split(b"abc", 3, 4, &mut rng),
            Err(Error::InvalidShareParameters {
                shares: 3,
                threshold: 4
            })
        ));
        assert!(split(b"abc", 3, 0, &mut rng).is_err());
    }

    #[test]
    fn duplicate_indices_are_rejected() {
        let share = Share {
            index: 1,
            bytes: vec![1, 2],
        };

        assert!(matches!(
            combine(&[share.clone(), share]),
            Err(Error::MalformedShare)
        ));
    }

    #[test]
    fn share_bytes() {
        let share = Share {
            index: 7,
            bytes: vec![1, 2, 3],
        };

        assert_eq!(share.to_bytes(), vec![7, 1, 2, 3]);
        assert_eq!(Share::from_bytes(&share.to_bytes()).unwrap(), share);

        assert!(Share::from_bytes(&[7]).is_err());
        assert!(Share::from_bytes(&[0, 1]).is_err());
        assert!(Share::from_bytes(&[]).is_err());
    }
}
