use std::collections::VecDeque;

use crate::common::{Contact, Id};

/// A [Contact] with its precomputed distance to a lookup target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactDistance {
    pub contact: Contact,
    pub distance: Id,
}

impl ContactDistance {
    pub fn new(contact: Contact, target: &Id) -> Self {
        Self {
            distance: contact.id.xor(target),
            contact,
        }
    }
}

/// Contacts sorted by ascending distance to a target, without duplicate ids.
#[derive(Debug, Clone)]
pub struct ClosestContacts {
    target: Id,
    contacts: VecDeque<ContactDistance>,
}

impl ClosestContacts {
    pub fn new(target: Id) -> Self {
        Self {
            target,
            contacts: VecDeque::new(),
        }
    }

    // === Getters ===

    pub fn target(&self) -> &Id {
        &self.target
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Distance of the closest contact, if any.
    pub fn front_distance(&self) -> Option<&Id> {
        self.contacts.front().map(|entry| &entry.distance)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ContactDistance> {
        self.contacts.iter()
    }

    // === Public Methods ===

    /// Insert a contact at its sorted position, returns `false` if its id is
    /// already present.
    pub fn add(&mut self, contact: Contact) -> bool {
        let entry = ContactDistance::new(contact, &self.target);

        // Equal distance to the same target means an equal id.
        match self
            .contacts
            .binary_search_by(|probe| probe.distance.cmp(&entry.distance))
        {
            Ok(_) => false,
            Err(position) => {
                self.contacts.insert(position, entry);
                true
            }
        }
    }

    /// Remove and return the closest contact.
    pub fn pop_front(&mut self) -> Option<ContactDistance> {
        self.contacts.pop_front()
    }

    pub fn into_contacts(self) -> impl Iterator<Item = Contact> {
        self.contacts.into_iter().map(|entry| entry.contact)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn sorted_and_deduplicated() {
        let target = Id::random();
        let mut closest = ClosestContacts::new(target);

        let contacts: Vec<Contact> = (0..50).map(|_| Contact::random()).collect();

        for contact in &contacts {
            assert!(closest.add(contact.clone()));
        }
        for contact in &contacts {
            assert!(!closest.add(contact.clone()));
        }

        assert_eq!(closest.len(), 50);

        let distances: Vec<Id> = closest.iter().map(|entry| entry.distance).collect();
        let mut sorted = distances.clone();
        sorted.sort();

        assert_eq!(distances, sorted);
    }

    #[test]
    fn pop_front_is_closest() {
        let target = Id::random();
        let mut closest = ClosestContacts::new(target);

        for _ in 0..10 {
            closest.add(Contact::random());
        }

        let front = *closest.front_distance().unwrap();
        let popped = closest.pop_front().unwrap();

        assert_eq!(popped.distance, front);
        assert_eq!(popped.distance, popped.contact.id.xor(&target));
        assert!(closest.iter().all(|entry| entry.distance > front));
    }
}
