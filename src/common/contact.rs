//! Struct and implementation of the Contact entry in the Kademlia routing table
use std::{
    fmt::{self, Display, Formatter},
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
};

use crate::common::{Id, ID_SIZE};
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
/// Contact entry in Kademlia routing table.
///
/// Identity is the [Id], host and port only say where to reach it.
pub struct Contact {
    pub id: Id,
    pub host: IpAddr,
    pub port: u16,
}

impl Contact {
    /// Creates a new Contact from an id and socket address.
    pub fn new(id: Id, address: SocketAddr) -> Contact {
        Contact {
            id,
            host: address.ip(),
            port: address.port(),
        }
    }

    /// Creates a random contact, useful for testing.
    pub fn random() -> Contact {
        Contact {
            id: Id::random(),
            host: Ipv4Addr::LOCALHOST.into(),
            port: rand::random(),
        }
    }

    // === Getters ===

    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    // === Compact encoding ===

    /// `id (20) || ip (4 or 16) || port (2, big-endian)`
    pub fn to_compact(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(ID_SIZE + 18);

        bytes.extend_from_slice(self.id.as_bytes());

        match self.host {
            IpAddr::V4(ip) => bytes.extend_from_slice(&ip.octets()),
            IpAddr::V6(ip) => bytes.extend_from_slice(&ip.octets()),
        }

        bytes.extend_from_slice(&self.port.to_be_bytes());

        bytes
    }

    pub fn from_compact(bytes: &[u8]) -> Result<Contact> {
        let host: IpAddr = match bytes.len() {
            26 => {
                let octets: [u8; 4] = bytes[20..24]
                    .try_into()
                    .map_err(|_| Error::InvalidContactSize(bytes.len()))?;
                Ipv4Addr::from(octets).into()
            }
            38 => {
                let octets: [u8; 16] = bytes[20..36]
                    .try_into()
                    .map_err(|_| Error::InvalidContactSize(bytes.len()))?;
                Ipv6Addr::from(octets).into()
            }
            len => return Err(Error::InvalidContactSize(len)),
        };

        let port_start = bytes.len() - 2;
        let port = u16::from_be_bytes([bytes[port_start], bytes[port_start + 1]]);

        Ok(Contact {
            id: Id::from_bytes(&bytes[..ID_SIZE])?,
            host,
            port,
        })
    }
}

impl Display for Contact {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{{\"NodeID\": \"{}\", \"Host\": \"{}\", \"Port\": \"{}\"}}",
            self.id, self.host, self.port
        )
    }
}
