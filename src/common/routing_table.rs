//! Kademlia routing table

use std::collections::VecDeque;
use std::fmt::{self, Debug, Formatter};

use crate::common::{ClosestContacts, Contact, Id, ID_BITS};

/// K = the default maximum size of a k-bucket.
pub const MAX_BUCKET_SIZE_K: usize = 20;
/// One bucket per possible shared prefix length with our own id.
pub const BUCKET_COUNT: usize = ID_BITS;

/// Outcome of offering a contact to the [RoutingTable].
#[derive(Debug, Clone, PartialEq)]
pub enum Insertion {
    /// The contact was already known and moved to the tail of its bucket.
    Refreshed,
    /// The contact was appended to a bucket with room.
    Added,
    /// The bucket is full; `head` is the least recently confirmed contact that
    /// should be pinged before deciding who stays.
    BucketFull { head: Contact },
    /// The contact is this node itself.
    Ignored,
}

#[derive(Clone)]
/// Kademlia routing table, buckets are indexed by the shared prefix length with our id.
pub struct RoutingTable {
    id: Id,
    buckets: Vec<KBucket>,
}

impl RoutingTable {
    /// Create a new [RoutingTable] with a given id.
    pub fn new(id: Id) -> Self {
        RoutingTable {
            id,
            buckets: vec![KBucket::new(); BUCKET_COUNT],
        }
    }

    /// Returns the [Id] of this node, where the distance is measured from.
    pub fn id(&self) -> &Id {
        &self.id
    }

    // === Public Methods ===

    /// Index of the bucket for `id`, `160 - prefix_len` clamped to `159`.
    ///
    /// Returns `None` for our own id, which is never bucketed.
    pub fn bucket_index(&self, id: &Id) -> Option<usize> {
        let prefix_len = self.id.prefix_len(id);

        if prefix_len == ID_BITS {
            return None;
        }

        Some((ID_BITS - prefix_len).min(BUCKET_COUNT - 1))
    }

    /// Returns the bucket `id` belongs to, or `None` for our own id.
    pub fn find_bucket(&self, id: &Id) -> Option<&KBucket> {
        self.bucket_index(id).map(|index| &self.buckets[index])
    }

    /// Offer a contact to the table.
    ///
    /// Known contacts move to the tail of their bucket, new contacts are appended
    /// if there is room, otherwise the caller gets the bucket's head back to check
    /// for liveness, see [Self::refresh] and [Self::evict].
    pub fn update(&mut self, contact: Contact) -> Insertion {
        let index = match self.bucket_index(&contact.id) {
            Some(index) => index,
            None => return Insertion::Ignored,
        };

        let bucket = &mut self.buckets[index];

        if bucket.move_to_tail(&contact.id) {
            return Insertion::Refreshed;
        }

        if !bucket.is_full() {
            bucket.push(contact);
            return Insertion::Added;
        }

        match bucket.head() {
            Some(head) => Insertion::BucketFull { head: head.clone() },
            None => Insertion::Ignored,
        }
    }

    /// Move a known contact to the tail of its bucket.
    ///
    /// Returns `false` if the contact is unknown.
    pub fn refresh(&mut self, id: &Id) -> bool {
        match self.bucket_index(id) {
            Some(index) => self.buckets[index].move_to_tail(id),
            None => false,
        }
    }

    /// Remove the unresponsive `stale` contact and append `incoming` in its place.
    ///
    /// The bucket may have changed since `stale` was read as its head, so `incoming`
    /// is only appended if it is still absent and the bucket has room.
    /// Returns `true` if `incoming` was added.
    pub fn evict(&mut self, stale: &Id, incoming: Contact) -> bool {
        let index = match self.bucket_index(&incoming.id) {
            Some(index) => index,
            None => return false,
        };

        let bucket = &mut self.buckets[index];
        bucket.remove(stale);

        if bucket.contains(&incoming.id) || bucket.is_full() {
            return false;
        }

        bucket.push(incoming);
        true
    }

    /// Returns the contact with the given id if it is in the table.
    pub fn find_contact(&self, id: &Id) -> Option<&Contact> {
        self.find_bucket(id).and_then(|bucket| bucket.get(id))
    }

    /// Returns up to [MAX_BUCKET_SIZE_K] contacts closest to the target, sorted by
    /// ascending distance, skipping the `exclude` id if given.
    pub fn closest(&self, target: &Id, exclude: Option<&Id>) -> Vec<Contact> {
        let mut closest = ClosestContacts::new(*target);

        for contact in self.contacts() {
            if Some(&contact.id) != exclude {
                closest.add(contact.clone());
            }
        }

        closest.into_contacts().take(MAX_BUCKET_SIZE_K).collect()
    }

    /// Returns `true` if this routing table is empty.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.is_empty())
    }

    /// Return the number of contacts in this routing table.
    pub fn size(&self) -> usize {
        self.buckets.iter().map(KBucket::len).sum()
    }

    /// Returns an iterator over the contacts in this routing table.
    pub fn contacts(&self) -> impl Iterator<Item = &Contact> {
        self.buckets.iter().flat_map(|bucket| bucket.iter())
    }
}

impl Debug for RoutingTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "RoutingTable{{ id: {}, size: {} }}", self.id, self.size())
    }
}

/// Kbuckets are similar to LRU caches that checks and evicts unresponsive contacts,
/// without dropping any responsive contacts in the process.
#[derive(Debug, Clone, Default)]
pub struct KBucket {
    /// Contacts in the k-bucket, sorted by the least recently seen.
    contacts: VecDeque<Contact>,
}

impl KBucket {
    pub fn new() -> Self {
        KBucket {
            contacts: VecDeque::with_capacity(MAX_BUCKET_SIZE_K),
        }
    }

    // === Getters ===

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.contacts.len() >= MAX_BUCKET_SIZE_K
    }

    /// Least recently confirmed contact.
    pub fn head(&self) -> Option<&Contact> {
        self.contacts.front()
    }

    /// Most recently confirmed contact.
    pub fn tail(&self) -> Option<&Contact> {
        self.contacts.back()
    }

    pub fn contains(&self, id: &Id) -> bool {
        self.iter().any(|contact| &contact.id == id)
    }

    pub fn get(&self, id: &Id) -> Option<&Contact> {
        self.iter().find(|contact| &contact.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.iter()
    }

    // === Private Methods ===

    fn move_to_tail(&mut self, id: &Id) -> bool {
        match self.contacts.iter().position(|contact| &contact.id == id) {
            Some(index) => {
                if let Some(contact) = self.contacts.remove(index) {
                    self.contacts.push_back(contact);
                }
                true
            }
            None => false,
        }
    }

    fn push(&mut self, contact: Contact) {
        self.contacts.push_back(contact);
    }

    fn remove(&mut self, id: &Id) {
        self.contacts.retain(|contact| &contact.id != id);
    }
}
