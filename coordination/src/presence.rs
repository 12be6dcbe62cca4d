//! Presence tracker
//!
//! Membership and login are orthogonal: a participant can sit in a room
//! while logged out. Only members who are also present count toward a
//! room's quorum.

use std::collections::{BTreeSet, HashSet};

use serde::{Deserialize, Serialize};

use crate::identity::IdentityId;
use crate::room::Room;

/// Identities currently authenticated
#[derive(Debug, Default)]
pub struct PresenceTracker {
    present: HashSet<IdentityId>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the identity was already present
    pub fn mark_present(&mut self, identity: IdentityId) -> bool {
        self.present.insert(identity)
    }

    /// Returns false if the identity was not present
    pub fn mark_absent(&mut self, identity: IdentityId) -> bool {
        self.present.remove(&identity)
    }

    pub fn is_present(&self, identity: IdentityId) -> bool {
        self.present.contains(&identity)
    }

    pub fn count(&self) -> usize {
        self.present.len()
    }

    /// Room members who are currently present
    pub fn quorum(&self, room: &Room) -> Quorum {
        Quorum {
            members: room
                .members
                .iter()
                .copied()
                .filter(|id| self.present.contains(id))
                .collect(),
        }
    }
}

/// Present members of one room
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quorum {
    pub members: BTreeSet<IdentityId>,
}

impl Quorum {
    pub fn total(&self) -> usize {
        self.members.len()
    }

    pub fn contains(&self, identity: IdentityId) -> bool {
        self.members.contains(&identity)
    }

    /// How many quorum members appear in `marked`
    pub fn count_marked<'a, I>(&self, marked: I) -> usize
    where
        I: IntoIterator<Item = &'a IdentityId>,
    {
        marked
            .into_iter()
            .filter(|id| self.members.contains(id))
            .count()
    }
}

/// Progress of an "everyone has done X" check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    pub done: usize,
    pub total: usize,
}

impl Completion {
    pub fn new(done: usize, total: usize) -> Self {
        Self { done, total }
    }

    /// Never vacuously true: an empty quorum is not "all done"
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }
}
