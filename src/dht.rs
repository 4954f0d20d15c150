//! Dht node.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use rand::{rngs::StdRng, SeedableRng};
use tokio::sync::RwLock;
use tracing::{debug, trace};

use crate::{
    common::{Contact, Id, Insertion, Request, RequestKind, Response, ResponseKind, RoutingTable},
    rpc::{
        iterative_query::{self, IterativeQuery, LookupOutcome, QueryReply},
        Config, RequestHandler, Transport,
    },
    server::Server,
    vanish::Vdo,
    Error, Result,
};

#[derive(Clone)]
/// A Kademlia node, cheap to clone.
pub struct Dht(pub(crate) Arc<Inner>);

pub(crate) struct Inner {
    this: Weak<Inner>,
    contact: Contact,
    routing_table: RwLock<RoutingTable>,
    server: tokio::sync::Mutex<Server>,
    transport: Arc<dyn Transport>,
    rng: Mutex<StdRng>,
    config: Config,
}

impl Dht {
    /// Returns a builder to edit settings before creating a Dht node.
    pub fn builder() -> DhtBuilder {
        DhtBuilder::default()
    }

    /// Create a node on `transport` and start answering incoming requests.
    pub fn new(transport: Arc<dyn Transport>, config: Config) -> Self {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let id = config.id.unwrap_or_else(|| Id::random_with(&mut rng));
        let contact = Contact::new(id, transport.local_addr());

        let inner = Arc::new_cyclic(|this| Inner {
            this: this.clone(),
            routing_table: RwLock::new(RoutingTable::new(id)),
            server: tokio::sync::Mutex::new(Server::new(config.max_values, config.max_vdos)),
            contact,
            transport,
            rng: Mutex::new(rng),
            config,
        });

        let handler: Weak<dyn RequestHandler> = Arc::<Inner>::downgrade(&inner);
        inner.transport.serve(handler);

        debug!(id = ?inner.contact.id, address = ?inner.contact.address(), "Dht node started");

        Dht(inner)
    }

    // === Getters ===

    pub fn id(&self) -> &Id {
        &self.0.contact.id
    }

    /// This node's own contact.
    pub fn contact(&self) -> &Contact {
        &self.0.contact
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.0.contact.address()
    }

    pub fn config(&self) -> &Config {
        &self.0.config
    }

    /// Number of contacts in the routing table.
    pub async fn routing_table_size(&self) -> usize {
        self.0.routing_table.read().await.size()
    }

    // === Single hop RPCs ===

    /// Ping a node by its address, returns its contact.
    pub async fn ping(&self, address: SocketAddr) -> Result<Contact> {
        match self.request(address, RequestKind::Ping).await? {
            ResponseKind::Pong { sender } => {
                self.update_contact(sender.clone()).await;
                Ok(sender)
            }
            _ => Err(Error::UnexpectedResponse(address)),
        }
    }

    /// Ask `contact` to store `value` under `key`.
    pub async fn store(&self, contact: &Contact, key: Id, value: Bytes) -> Result<()> {
        let address = contact.address();

        match self.request(address, RequestKind::Store { key, value }).await? {
            ResponseKind::Stored => {
                self.update_contact(contact.clone()).await;
                Ok(())
            }
            _ => Err(Error::UnexpectedResponse(address)),
        }
    }

    /// Ask `contact` for the contacts it knows closest to `target`.
    pub async fn find_node(&self, contact: &Contact, target: Id) -> Result<Vec<Contact>> {
        let address = contact.address();

        match self.request(address, RequestKind::FindNode { target }).await? {
            ResponseKind::Nodes(contacts) => {
                self.update_contact(contact.clone()).await;
                self.learn(&contacts).await;
                Ok(contacts)
            }
            _ => Err(Error::UnexpectedResponse(address)),
        }
    }

    /// Ask `contact` for the value under `key`, or the contacts it knows closest to it.
    pub async fn find_value(&self, contact: &Contact, key: Id) -> Result<QueryReply> {
        let address = contact.address();

        let reply = match self.request(address, RequestKind::FindValue { key }).await? {
            ResponseKind::Value(value) => QueryReply::Value(value),
            ResponseKind::Nodes(contacts) => {
                self.learn(&contacts).await;
                QueryReply::Nodes(contacts)
            }
            _ => return Err(Error::UnexpectedResponse(address)),
        };

        self.update_contact(contact.clone()).await;

        Ok(reply)
    }

    /// Ask `contact` for a vanishing data object it keeps under `vdo_id`.
    pub async fn get_vdo(&self, contact: &Contact, vdo_id: Id) -> Result<Option<Vdo>> {
        let address = contact.address();

        match self.request(address, RequestKind::GetVdo { vdo_id }).await? {
            ResponseKind::Vdo(vdo) => {
                self.update_contact(contact.clone()).await;
                Ok(vdo)
            }
            _ => Err(Error::UnexpectedResponse(address)),
        }
    }

    // === Local state ===

    /// Value stored at this node under `key`.
    pub async fn local_find_value(&self, key: &Id) -> Result<Bytes> {
        self.0
            .server
            .lock()
            .await
            .get_value(key)
            .ok_or(Error::NotFound(*key))
    }

    /// Store a value at this node only.
    pub async fn local_store(&self, key: Id, value: Bytes) {
        self.0.server.lock().await.store(key, value);
    }

    /// Keep a vanishing data object at this node, served to [RequestKind::GetVdo] requests.
    pub async fn local_store_vdo(&self, vdo_id: Id, vdo: Vdo) {
        self.0.server.lock().await.store_vdo(vdo_id, vdo);
    }

    /// Contact with the given id from the routing table, or this node's own contact.
    pub async fn find_contact(&self, id: &Id) -> Result<Contact> {
        if id == self.id() {
            return Ok(self.0.contact.clone());
        }

        self.0
            .routing_table
            .read()
            .await
            .find_contact(id)
            .cloned()
            .ok_or(Error::NotFound(*id))
    }

    /// Up to `k` known contacts closest to `target`, ascending by distance.
    pub async fn find_closest_contacts(&self, target: &Id, exclude: Option<&Id>) -> Vec<Contact> {
        self.0.routing_table.read().await.closest(target, exclude)
    }

    /// Refresh a contact that proved to be alive.
    ///
    /// When its bucket is full, the least recently seen contact is pinged first and
    /// evicted in favor of `contact` only if it doesn't respond.
    pub async fn update_contact(&self, contact: Contact) {
        if let Some(head) = self.offer_contact(contact.clone()).await {
            self.resolve_full_bucket(head, contact).await;
        }
    }

    // === Iterative operations ===

    /// Find the closest responding nodes to `target` across the network.
    pub async fn iterative_find_node(&self, target: Id) -> Vec<Contact> {
        let seeds = self.find_closest_contacts(&target, None).await;
        let query = IterativeQuery::new(*self.id(), target, seeds);

        let dht = self.clone();
        let outcome = iterative_query::run(query, self.0.config.round_timeout, move |contact| {
            let dht = dht.clone();

            async move {
                let result = dht
                    .find_node(&contact, target)
                    .await
                    .map(QueryReply::Nodes);

                (contact, result)
            }
        })
        .await;

        match outcome {
            LookupOutcome::Contacts(contacts) => contacts,
            LookupOutcome::Value { .. } => Vec::new(),
        }
    }

    /// Store `value` at the closest nodes to `key`, returns the nodes that acknowledged it.
    pub async fn iterative_store(&self, key: Id, value: Bytes) -> Vec<Contact> {
        let contacts = self.iterative_find_node(key).await;

        let results = join_all(
            contacts
                .iter()
                .map(|contact| self.store(contact, key, value.clone())),
        )
        .await;

        let stored: Vec<Contact> = contacts
            .into_iter()
            .zip(results)
            .filter_map(|(contact, result)| match result {
                Ok(()) => Some(contact),
                Err(error) => {
                    debug!(to = ?contact.id, ?error, "Iterative store request failed");
                    None
                }
            })
            .collect();

        debug!(?key, stored = stored.len(), "Iterative store done");

        stored
    }

    /// Find the value under `key` across the network.
    ///
    /// Once found, the value is also stored at the closest node seen during the
    /// lookup that didn't have it.
    pub async fn iterative_find_value(&self, key: Id) -> Result<Bytes> {
        let seeds = self.find_closest_contacts(&key, None).await;
        let query = IterativeQuery::new(*self.id(), key, seeds);

        let dht = self.clone();
        let outcome = iterative_query::run(query, self.0.config.round_timeout, move |contact| {
            let dht = dht.clone();

            async move {
                let result = dht.find_value(&contact, key).await;
                (contact, result)
            }
        })
        .await;

        match outcome {
            LookupOutcome::Value { value, cache_at } => {
                if let Some(contact) = cache_at {
                    if let Err(error) = self.store(&contact, key, value.clone()).await {
                        debug!(to = ?contact.id, ?error, "Failed to cache value");
                    }
                }

                Ok(value)
            }
            LookupOutcome::Contacts(_) => Err(Error::ValueNotFound),
        }
    }

    /// Join the network through a known node, then look up our own id to fill the routing table.
    pub async fn bootstrap(&self, address: SocketAddr) -> Result<Vec<Contact>> {
        self.ping(address).await?;

        Ok(self.iterative_find_node(*self.id()).await)
    }

    // === Private Methods ===

    pub(crate) fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.0
            .rng
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    async fn request(&self, address: SocketAddr, kind: RequestKind) -> Result<ResponseKind> {
        let msg_id = Id::random_with(&mut *self.rng());
        let request = Request::new(msg_id, self.0.contact.clone(), kind);

        trace!(to = ?address, ?msg_id, request = request.kind.name(), "Sending request");

        let response = tokio::time::timeout(
            self.0.config.request_timeout,
            self.0.transport.request(address, request),
        )
        .await
        .map_err(|_| Error::Timeout(address))??;

        if response.msg_id != msg_id {
            return Err(Error::UnexpectedResponse(address));
        }

        match response.kind {
            ResponseKind::Error(error) => Err(Error::Remote(error)),
            kind => Ok(kind),
        }
    }

    /// Offer a contact to the routing table, returns the head to probe if its bucket is full.
    async fn offer_contact(&self, contact: Contact) -> Option<Contact> {
        match self.0.routing_table.write().await.update(contact) {
            Insertion::BucketFull { head } => Some(head),
            _ => None,
        }
    }

    /// Ping the head of a full bucket, without holding the routing table lock meanwhile.
    async fn resolve_full_bucket(&self, head: Contact, contact: Contact) {
        let alive = matches!(
            self.request(head.address(), RequestKind::Ping).await,
            Ok(ResponseKind::Pong { .. })
        );

        let mut table = self.0.routing_table.write().await;

        if alive {
            table.refresh(&head.id);
        } else if table.evict(&head.id, contact.clone()) {
            debug!(evicted = ?head.id, added = ?contact.id, "Evicted unresponsive contact");
        }
    }

    /// Offer contacts learned from a response, then probe the heads of the full buckets
    /// they landed in, one probe per head.
    async fn learn(&self, contacts: &[Contact]) {
        let mut full: Vec<(Contact, Contact)> = Vec::new();

        {
            let mut table = self.0.routing_table.write().await;

            for contact in contacts {
                if let Insertion::BucketFull { head } = table.update(contact.clone()) {
                    if !full.iter().any(|(known, _)| known.id == head.id) {
                        full.push((head, contact.clone()));
                    }
                }
            }
        }

        join_all(
            full.into_iter()
                .map(|(head, contact)| self.resolve_full_bucket(head, contact)),
        )
        .await;
    }

    async fn handle_request(&self, request: Request) -> Response {
        let kind = {
            let table = self.0.routing_table.read().await;
            let mut server = self.0.server.lock().await;

            server.handle_request(&table, &self.0.contact, &request)
        };

        let sender = request.sender.clone();

        // A full bucket needs a round trip, the response shouldn't wait for it.
        if let Some(head) = self.offer_contact(sender.clone()).await {
            let dht = self.clone();
            tokio::spawn(async move { dht.resolve_full_bucket(head, sender).await });
        }

        request.reply(kind)
    }
}

#[async_trait]
impl RequestHandler for Inner {
    async fn handle_request(&self, request: Request) -> Response {
        match self.this.upgrade() {
            Some(inner) => Dht(inner).handle_request(request).await,
            None => request.reply(ResponseKind::Error("node is shutting down".to_string())),
        }
    }
}

impl std::fmt::Debug for Dht {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dht")
            .field("contact", &self.0.contact)
            .field("transport", &self.0.transport)
            .finish()
    }
}

#[derive(Debug, Default, Clone)]
/// Builder for a [Dht] node, see [Config] for the defaults.
pub struct DhtBuilder(Config);

impl DhtBuilder {
    /// Set an explicit node id.
    pub fn id(mut self, id: Id) -> Self {
        self.0.id = Some(id);
        self
    }

    /// Set the timeout of a single request.
    pub fn request_timeout(mut self, request_timeout: Duration) -> Self {
        self.0.request_timeout = request_timeout;
        self
    }

    /// Set how long a lookup round waits for its requests.
    pub fn round_timeout(mut self, round_timeout: Duration) -> Self {
        self.0.round_timeout = round_timeout;
        self
    }

    /// Set the interval between republishing vanished shares.
    pub fn republish_interval(mut self, republish_interval: Duration) -> Self {
        self.0.republish_interval = republish_interval;
        self
    }

    /// Set the bounds of the local value and vanishing data object stores.
    pub fn store_limits(mut self, max_values: usize, max_vdos: usize) -> Self {
        self.0.max_values = max_values;
        self.0.max_vdos = max_vdos;
        self
    }

    /// Seed the node's random number generator.
    pub fn seed(mut self, seed: u64) -> Self {
        self.0.seed = Some(seed);
        self
    }

    pub fn build<T: Transport>(self, transport: T) -> Dht {
        Dht::new(Arc::new(transport), self.0)
    }
}
