//! Main Crate Error

use std::net::SocketAddr;

use crate::common::Id;

#[derive(thiserror::Error, Debug)]
/// Vanishing DHT crate error enum.
pub enum Error {
    #[error(transparent)]
    /// Transparent [std::io::Error]
    IO(#[from] std::io::Error),

    #[error("Failed to parse packet bytes: {0}")]
    BencodeError(#[from] serde_bencode::Error),

    /// The remote node could not be reached, or the transport failed mid call.
    #[error("Node at {0} is unreachable: {1}")]
    Unreachable(SocketAddr, String),

    /// The remote node did not respond within the request timeout.
    #[error("Request to {0} timed out")]
    Timeout(SocketAddr),

    /// The remote node answered with an error.
    #[error("Remote error: {0}")]
    Remote(String),

    /// The remote node answered with a response that doesn't match the request.
    #[error("Unexpected response from {0}")]
    UnexpectedResponse(SocketAddr),

    /// Id is absent from the routing table or the local stores.
    #[error("{0} not found")]
    NotFound(Id),

    /// An iterative value lookup queried every reachable candidate without finding the value.
    #[error("Value not found")]
    ValueNotFound,

    /// Fewer than `threshold` distinct shares could be recovered.
    #[error("Recovered {found} shares, but {threshold} are needed")]
    InsufficientShares { found: usize, threshold: u8 },

    #[error("Invalid share parameters: {shares} shares with threshold {threshold}")]
    InvalidShareParameters { shares: u8, threshold: u8 },

    /// A value retrieved from a share location is not an `index || share` pair.
    #[error("Malformed share")]
    MalformedShare,

    /// Ciphertext failed authentication or is truncated.
    #[error("Failed to decrypt vanishing data object")]
    Decryption,

    #[error("Invalid Id: {0}")]
    InvalidId(String),

    #[error("Invalid Id size, expected 20, got {0}")]
    InvalidIdSize(usize),

    #[error("Invalid contact encoding, got {0} bytes")]
    InvalidContactSize(usize),
}

/// Alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;
