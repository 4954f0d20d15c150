//! Local stores and the answers to incoming requests.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tracing::trace;

use crate::common::{Contact, Id, Request, RequestKind, ResponseKind, RoutingTable};
use crate::vanish::Vdo;

#[derive(Debug)]
/// Answers incoming requests from the routing table and the local stores.
///
/// It doesn't implement any rate-limiting or blocking.
pub struct Server {
    /// Values stored by other nodes, or cached by value lookups.
    values: LruCache<Id, Bytes>,
    /// Vanishing data objects kept by this node under a chosen id.
    vdos: LruCache<Id, Vdo>,
}

impl Server {
    pub fn new(max_values: usize, max_vdos: usize) -> Self {
        Self {
            values: LruCache::new(NonZeroUsize::new(max_values).unwrap_or(NonZeroUsize::MIN)),
            vdos: LruCache::new(NonZeroUsize::new(max_vdos).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    // === Local stores ===

    pub fn store(&mut self, key: Id, value: Bytes) {
        self.values.put(key, value);
    }

    pub fn get_value(&mut self, key: &Id) -> Option<Bytes> {
        self.values.get(key).cloned()
    }

    pub fn store_vdo(&mut self, vdo_id: Id, vdo: Vdo) {
        self.vdos.put(vdo_id, vdo);
    }

    pub fn get_vdo(&mut self, vdo_id: &Id) -> Option<Vdo> {
        self.vdos.get(vdo_id).cloned()
    }

    // === Requests ===

    /// Handle an incoming request.
    ///
    /// Refreshing the sender into the routing table is the caller's concern, it needs
    /// a round trip when the sender's bucket is full.
    pub fn handle_request(
        &mut self,
        routing_table: &RoutingTable,
        local: &Contact,
        request: &Request,
    ) -> ResponseKind {
        trace!(from = ?request.sender.id, request = request.kind.name(), "Handling request");

        match &request.kind {
            RequestKind::Ping => ResponseKind::Pong {
                sender: local.clone(),
            },
            RequestKind::Store { key, value } => {
                self.store(*key, value.clone());
                ResponseKind::Stored
            }
            RequestKind::FindNode { target } => {
                ResponseKind::Nodes(routing_table.closest(target, Some(&request.sender.id)))
            }
            RequestKind::FindValue { key } => match self.get_value(key) {
                Some(value) => ResponseKind::Value(value),
                None => ResponseKind::Nodes(routing_table.closest(key, Some(&request.sender.id))),
            },
            RequestKind::GetVdo { vdo_id } => ResponseKind::Vdo(self.get_vdo(vdo_id)),
        }
    }
}
