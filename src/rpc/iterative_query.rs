//! Manage iterative lookups and drive their rounds of concurrent requests.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinSet;
use tracing::{debug, trace};

use crate::common::{ClosestContacts, Contact, Id, MAX_BUCKET_SIZE_K};
use crate::Result;

use super::ALPHA;

/// What a single lookup request got back from a candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryReply {
    Nodes(Vec<Contact>),
    Value(Bytes),
}

/// The result of driving an [IterativeQuery] to completion.
#[derive(Debug, Clone, PartialEq)]
pub enum LookupOutcome {
    /// Up to [MAX_BUCKET_SIZE_K] contacts that responded, ascending by distance to the target.
    Contacts(Vec<Contact>),
    /// A candidate returned the value, `cache_at` is the closest contact encountered that
    /// neither returned the value nor failed.
    Value {
        value: Bytes,
        cache_at: Option<Contact>,
    },
}

/// An iterative process of concurrently sending requests to the closest known contacts to
/// the target, merging closer contacts discovered in the responses, and repeating this
/// process until a round brings no improvement.
#[derive(Debug)]
pub struct IterativeQuery {
    candidates: ClosestContacts,
    responders: ClosestContacts,
    /// Every candidate ever added, visited or not.
    encountered: ClosestContacts,
    seen: HashSet<Id>,
    excluded: HashSet<Id>,
    /// Closest distance ever seen.
    best: Option<Id>,
    round_start_best: Option<Id>,
    improving: bool,
    final_round: bool,
    finished: bool,
}

impl IterativeQuery {
    /// Seed a query with up to [ALPHA] of the given contacts, `self_id` is never visited.
    pub fn new(self_id: Id, target: Id, seeds: impl IntoIterator<Item = Contact>) -> Self {
        let mut query = Self {
            candidates: ClosestContacts::new(target),
            responders: ClosestContacts::new(target),
            encountered: ClosestContacts::new(target),
            seen: HashSet::from([self_id]),
            excluded: HashSet::new(),
            best: None,
            round_start_best: None,
            improving: true,
            final_round: false,
            finished: false,
        };

        for contact in seeds.into_iter().take(ALPHA) {
            query.add_candidate(contact);
        }

        trace!(?target, seeds = query.candidates.len(), "New Query");

        query
    }

    // === Getters ===

    pub fn target(&self) -> &Id {
        self.candidates.target()
    }

    pub fn is_improving(&self) -> bool {
        self.improving
    }

    pub fn candidates(&self) -> &ClosestContacts {
        &self.candidates
    }

    pub fn responders(&self) -> &ClosestContacts {
        &self.responders
    }

    /// Returns true once no further round should be started.
    pub fn is_done(&self, in_flight: usize) -> bool {
        self.finished
            || self.responders.len() >= MAX_BUCKET_SIZE_K
            || (self.candidates.is_empty() && in_flight == 0)
    }

    // === Public Methods ===

    /// Start a round, returns up to [ALPHA] of the closest unvisited candidates to query.
    pub fn start_round(&mut self) -> Vec<Contact> {
        if self.final_round {
            return Vec::new();
        }

        self.round_start_best = self.best;

        if !self.improving {
            self.final_round = true;
        }

        let mut to_visit = Vec::with_capacity(ALPHA);

        while to_visit.len() < ALPHA {
            match self.candidates.pop_front() {
                Some(entry) => to_visit.push(entry.contact),
                None => break,
            }
        }

        to_visit
    }

    /// End a round, a round that didn't get strictly closer than the previous best
    /// turns the query into its final round.
    pub fn end_round(&mut self) {
        if self.final_round {
            self.finished = true;
            return;
        }

        let improved = match (self.best, self.round_start_best) {
            (Some(best), Some(previous)) => best < previous,
            (Some(_), None) => true,
            (None, _) => false,
        };

        if !improved {
            trace!(target = ?self.target(), "Query stopped improving");
            self.improving = false;
        }
    }

    /// Record a contact that answered with closer contacts.
    pub fn add_responder(&mut self, responder: Contact, contacts: Vec<Contact>) {
        self.responders.add(responder);

        if !self.improving {
            return;
        }

        for contact in contacts {
            self.add_candidate(contact);
        }
    }

    /// Record a contact that failed to answer, it is never retried.
    pub fn add_failure(&mut self, contact: &Contact) {
        self.excluded.insert(contact.id);
    }

    /// Record a contact that answered with the value.
    pub fn add_value_holder(&mut self, contact: &Contact) {
        self.excluded.insert(contact.id);
    }

    /// Closest encountered contact that neither failed nor returned the value.
    pub fn cache_candidate(&self) -> Option<Contact> {
        self.encountered
            .iter()
            .find(|entry| !self.excluded.contains(&entry.contact.id))
            .map(|entry| entry.contact.clone())
    }

    /// Closest responding contacts.
    pub fn into_contacts(self) -> Vec<Contact> {
        self.responders
            .into_contacts()
            .take(MAX_BUCKET_SIZE_K)
            .collect()
    }

    // === Private Methods ===

    fn add_candidate(&mut self, contact: Contact) {
        if !self.seen.insert(contact.id) {
            return;
        }

        let distance = contact.id.xor(self.target());

        if self.best.map_or(true, |best| distance < best) {
            self.best = Some(distance);
        }

        self.encountered.add(contact.clone());
        self.candidates.add(contact);
    }
}

/// Drive `query` to completion, sending one `request` per visited candidate.
///
/// Each round runs its requests in a [JoinSet] and waits for them or for `round_timeout`,
/// requests still in flight are collected by the following round. When the lookup returns,
/// the set is dropped and whatever is still in flight is aborted.
pub async fn run<F, Fut>(
    mut query: IterativeQuery,
    round_timeout: Duration,
    request: F,
) -> LookupOutcome
where
    F: Fn(Contact) -> Fut,
    Fut: Future<Output = (Contact, Result<QueryReply>)> + Send + 'static,
{
    let mut tasks = JoinSet::new();

    loop {
        for contact in query.start_round() {
            trace!(target = ?query.target(), to = ?contact.id, "Visiting");
            tasks.spawn(request(contact));
        }

        let deadline = tokio::time::sleep(round_timeout);
        tokio::pin!(deadline);

        while !tasks.is_empty() {
            tokio::select! {
                _ = &mut deadline => break,
                joined = tasks.join_next() => match joined {
                    Some(Ok((contact, Ok(QueryReply::Nodes(contacts))))) => {
                        query.add_responder(contact, contacts);

                        if query.responders().len() >= MAX_BUCKET_SIZE_K {
                            break;
                        }
                    }
                    Some(Ok((contact, Ok(QueryReply::Value(value))))) => {
                        query.add_value_holder(&contact);

                        debug!(target = ?query.target(), from = ?contact.id, "Query found value");

                        return LookupOutcome::Value {
                            value,
                            cache_at: query.cache_candidate(),
                        };
                    }
                    Some(Ok((contact, Err(error)))) => {
                        debug!(to = ?contact.id, ?error, "Query request failed");
                        query.add_failure(&contact);
                    }
                    Some(Err(error)) => {
                        debug!(?error, "Query request task failed");
                    }
                    None => break,
                },
            }
        }

        query.end_round();

        if query.is_done(tasks.len()) {
            break;
        }
    }

    debug!(
        target = ?query.target(),
        candidates = ?query.candidates().len(),
        responders = ?query.responders().len(),
        "Done query"
    );

    LookupOutcome::Contacts(query.into_contacts())
}
