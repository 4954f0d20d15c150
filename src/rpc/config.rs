use std::time::Duration;

use crate::common::Id;
use crate::vanish::DEFAULT_REPUBLISH_INTERVAL;

use super::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_ROUND_TIMEOUT};

/// Default bound on the number of values in the local store.
pub const DEFAULT_MAX_VALUES: usize = 10_000;
/// Default bound on the number of vanishing data objects in the local store.
pub const DEFAULT_MAX_VDOS: usize = 1_000;

#[derive(Debug, Clone)]
/// Dht Configurations
pub struct Config {
    /// Node Id.
    ///
    /// Defaults to None, where a random Id is drawn from the node's rng.
    pub id: Option<Id>,
    /// Duration to wait for a response before the callee is deemed unreachable.
    ///
    /// Defaults to [DEFAULT_REQUEST_TIMEOUT]
    pub request_timeout: Duration,
    /// Duration a lookup round waits for its outstanding requests.
    ///
    /// Responses that arrive later are still collected by the following round.
    ///
    /// Defaults to [DEFAULT_ROUND_TIMEOUT]
    pub round_timeout: Duration,
    /// Interval between republishing the shares of a vanished object.
    ///
    /// Defaults to [DEFAULT_REPUBLISH_INTERVAL], the length of an epoch.
    pub republish_interval: Duration,
    /// Maximum number of values kept in the local store, least recently used are dropped.
    ///
    /// Defaults to [DEFAULT_MAX_VALUES]
    pub max_values: usize,
    /// Maximum number of vanishing data objects kept in the local store.
    ///
    /// Defaults to [DEFAULT_MAX_VDOS]
    pub max_vdos: usize,
    /// Seed for the node's random number generator, for reproducible runs.
    ///
    /// Defaults to None, seeded from the operating system.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            id: None,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
            republish_interval: DEFAULT_REPUBLISH_INTERVAL,
            max_values: DEFAULT_MAX_VALUES,
            max_vdos: DEFAULT_MAX_VDOS,
            seed: None,
        }
    }
}
