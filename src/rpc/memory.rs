//! In-process transport, nodes reach each other through a shared registry.

use std::collections::{HashMap, HashSet};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use tracing::trace;

use crate::common::{Request, Response};
use crate::{Error, Result};

use super::{RequestHandler, Transport};

const FIRST_PORT: u16 = 10_000;

#[derive(Default)]
struct Registry {
    next_port: u16,
    handlers: HashMap<SocketAddr, Weak<dyn RequestHandler>>,
    offline: HashSet<SocketAddr>,
}

#[derive(Clone, Default)]
/// A simulated network of in-process nodes.
///
/// Every [MemoryTransport] created from the same network can reach the others,
/// unless taken offline with [MemoryNetwork::set_online].
pub struct MemoryNetwork {
    registry: Arc<Mutex<Registry>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a transport with a fresh address on this network.
    pub fn transport(&self) -> MemoryTransport {
        let mut registry = self.lock();

        let port = FIRST_PORT.wrapping_add(registry.next_port);
        registry.next_port = registry.next_port.wrapping_add(1);

        MemoryTransport {
            address: SocketAddr::from((Ipv4Addr::LOCALHOST, port)),
            network: self.clone(),
        }
    }

    /// Take a node offline or bring it back, offline nodes neither receive nor answer.
    pub fn set_online(&self, address: SocketAddr, online: bool) {
        let mut registry = self.lock();

        if online {
            registry.offline.remove(&address);
        } else {
            registry.offline.insert(address);
        }
    }

    fn handler(&self, address: &SocketAddr) -> Option<Arc<dyn RequestHandler>> {
        let registry = self.lock();

        if registry.offline.contains(address) {
            return None;
        }

        registry.handlers.get(address).and_then(Weak::upgrade)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for MemoryNetwork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let registry = self.lock();

        f.debug_struct("MemoryNetwork")
            .field("nodes", &registry.handlers.len())
            .field("offline", &registry.offline.len())
            .finish()
    }
}

#[derive(Debug)]
/// A node's endpoint on a [MemoryNetwork].
pub struct MemoryTransport {
    address: SocketAddr,
    network: MemoryNetwork,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_addr(&self) -> SocketAddr {
        self.address
    }

    fn serve(&self, handler: Weak<dyn RequestHandler>) {
        self.network.lock().handlers.insert(self.address, handler);
    }

    async fn request(&self, to: SocketAddr, request: Request) -> Result<Response> {
        if self.network.lock().offline.contains(&self.address) {
            return Err(Error::Unreachable(to, "sender is offline".to_string()));
        }

        let handler = self
            .network
            .handler(&to)
            .ok_or_else(|| Error::Unreachable(to, "no node at address".to_string()))?;

        trace!(from = ?self.address, ?to, request = request.kind.name(), "Memory request");

        // Served on its own task, like an incoming datagram would be.
        tokio::spawn(async move { handler.handle_request(request).await })
            .await
            .map_err(|error| Error::Unreachable(to, error.to_string()))
    }
}
