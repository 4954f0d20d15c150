//! Self-destructing data.
//!
//! The data is encrypted under a random key, the key is split into shares with a
//! threshold, and the shares are stored in the DHT at locations derived from a random
//! access key and the current epoch. Once the shares stop being republished, nodes
//! churn or evict them, and the data becomes unrecoverable.

pub mod cipher;
pub mod epoch;
mod republish;
pub mod sss;

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::common::{Contact, Id};
use crate::{Dht, Error, Result};

pub use republish::RepublishHandle;
pub use sss::Share;

/// Default interval between republishing shares, one epoch.
pub const DEFAULT_REPUBLISH_INTERVAL: Duration =
    Duration::from_secs(epoch::EPOCH_HOURS as u64 * 60 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Vanishing data object, everything needed to recover the data while its shares live.
pub struct Vdo {
    /// Selects the share locations of every epoch, at most `i64::MAX`.
    pub access_key: u64,
    /// `nonce || sealed box` of the data.
    pub ciphertext: Bytes,
    pub number_of_shares: u8,
    pub threshold: u8,
}

impl Dht {
    /// Encrypt `data` and scatter the key's shares across the network.
    ///
    /// When `valid_period_epochs` is positive the shares are republished that many
    /// times, once per [crate::rpc::Config::republish_interval], for as long as the
    /// returned handle is kept.
    pub async fn vanish(
        &self,
        data: &[u8],
        number_of_shares: u8,
        threshold: u8,
        valid_period_epochs: u32,
    ) -> Result<(Vdo, Option<RepublishHandle>)> {
        let key = cipher::generate_key();
        let ciphertext = cipher::encrypt(&key, data);

        let (shares, access_key) = {
            let mut rng = self.rng();

            let shares = sss::split(&key.0, number_of_shares, threshold, &mut *rng)?;
            // Non-negative in a signed 64 bit integer, as bencode integers are.
            let access_key = rng.gen::<u64>() >> 1;

            (shares, access_key)
        };

        let epoch_start = epoch::epoch_start(&Local::now(), 0);
        let stored = store_shares(self, access_key, epoch_start, &shares).await;

        debug!(access_key, epoch_start, stored, "Vanished data");

        let handle = if valid_period_epochs > 0 {
            Some(RepublishHandle::spawn(
                self.clone(),
                access_key,
                shares,
                valid_period_epochs,
                self.config().republish_interval,
            ))
        } else {
            None
        };

        let vdo = Vdo {
            access_key,
            ciphertext: Bytes::from(ciphertext),
            number_of_shares,
            threshold,
        };

        Ok((vdo, handle))
    }

    /// Recover the data of a [Vdo], from shares stored during the previous, current or next epoch.
    pub async fn unvanish(&self, vdo: &Vdo) -> Result<Vec<u8>> {
        let threshold = vdo.threshold as usize;
        let mut shares: BTreeMap<u8, Share> = BTreeMap::new();

        'epochs: for epoch_start in epoch::search_epochs(&Local::now()) {
            let locations = epoch::share_locations(vdo.access_key, epoch_start, vdo.number_of_shares);

            for location in locations {
                let value = match self.iterative_find_value(location).await {
                    Ok(value) => value,
                    Err(_) => continue,
                };

                match Share::from_bytes(&value) {
                    // Only key sized shares combine.
                    Ok(share)
                        if share.index <= vdo.number_of_shares
                            && share.bytes.len() == cipher::KEY_SIZE =>
                    {
                        shares.entry(share.index).or_insert(share);
                    }
                    _ => debug!(?location, "Ignoring malformed share"),
                }

                if shares.len() >= threshold {
                    break 'epochs;
                }
            }
        }

        if threshold == 0 || shares.len() < threshold {
            return Err(Error::InsufficientShares {
                found: shares.len(),
                threshold: vdo.threshold,
            });
        }

        let shares: Vec<Share> = shares.into_values().take(threshold).collect();
        let key = cipher::key_from_slice(&sss::combine(&shares)?)?;

        cipher::decrypt(&key, &vdo.ciphertext)
    }

    /// Vanish `data` and keep the resulting [Vdo] locally under `vdo_id`, so that other
    /// nodes can fetch it with [Dht::unvanish_data].
    pub async fn vanish_data(
        &self,
        vdo_id: Id,
        data: &[u8],
        number_of_shares: u8,
        threshold: u8,
        valid_period_epochs: u32,
    ) -> Result<(Vdo, Option<RepublishHandle>)> {
        let (vdo, handle) = self
            .vanish(data, number_of_shares, threshold, valid_period_epochs)
            .await?;

        self.local_store_vdo(vdo_id, vdo.clone()).await;

        Ok((vdo, handle))
    }

    /// Fetch the [Vdo] that `contact` keeps under `vdo_id` and recover its data.
    pub async fn unvanish_data(&self, contact: &Contact, vdo_id: Id) -> Result<Vec<u8>> {
        let vdo = self
            .get_vdo(contact, vdo_id)
            .await?
            .ok_or(Error::NotFound(vdo_id))?;

        self.unvanish(&vdo).await
    }
}

/// Store every share at its location for the given epoch, returns how many were stored
/// by at least one node.
pub(crate) async fn store_shares(
    dht: &Dht,
    access_key: u64,
    epoch_start: i64,
    shares: &[Share],
) -> usize {
    let locations = epoch::share_locations(access_key, epoch_start, shares.len() as u8);

    let mut stored = 0;

    for (location, share) in locations.into_iter().zip(shares) {
        if !dht
            .iterative_store(location, Bytes::from(share.to_bytes()))
            .await
            .is_empty()
        {
            stored += 1;
        }
    }

    stored
}
