//! Column family definitions for the RocksDB store
//!
//! Each column family holds one record type; keys embed zero-padded ids so
//! lexicographic iteration follows creation order.

/// Identity records with their password digests
pub const CF_USERS: &str = "users";

/// Name → identity id uniqueness index
pub const CF_NAMES: &str = "names";

/// Ledger proposals
pub const CF_PROPOSALS: &str = "proposals";

/// Ledger votes
pub const CF_VOTES: &str = "votes";

/// Id sequences
pub const CF_META: &str = "meta";

/// All column family names
pub const ALL_CFS: &[&str] = &[CF_USERS, CF_NAMES, CF_PROPOSALS, CF_VOTES, CF_META];

/// Key builders
pub mod keys {
    pub const USER_PREFIX: &str = "user:";
    pub const PROPOSAL_PREFIX: &str = "prop:";
    pub const VOTE_PREFIX: &str = "vote:";

    pub const USER_SEQUENCE: &str = "seq:users";
    pub const PROPOSAL_SEQUENCE: &str = "seq:proposals";

    pub fn user(id: u64) -> String {
        format!("{}{:020}", USER_PREFIX, id)
    }

    pub fn name(name: &str) -> String {
        format!("name:{}", name)
    }

    pub fn proposal(id: u64) -> String {
        format!("{}{:020}", PROPOSAL_PREFIX, id)
    }

    /// Vote key (proposal + user); one key per ballot enforces uniqueness
    pub fn vote(proposal_id: u64, user_id: u64) -> String {
        format!("{}{:020}:{:020}", VOTE_PREFIX, proposal_id, user_id)
    }

    /// Prefix shared by every vote on one proposal
    pub fn votes_for(proposal_id: u64) -> String {
        format!("{}{:020}:", VOTE_PREFIX, proposal_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_sort_numerically() {
        assert!(keys::user(9) < keys::user(10));
        assert!(keys::proposal(99) < keys::proposal(100));
    }

    #[test]
    fn test_vote_key_has_proposal_prefix() {
        let key = keys::vote(7, 3);
        assert!(key.starts_with(&keys::votes_for(7)));
        assert!(!key.starts_with(&keys::votes_for(70)));
    }

    #[test]
    fn test_all_cfs_unique() {
        let mut names = ALL_CFS.to_vec();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), ALL_CFS.len());
    }
}
