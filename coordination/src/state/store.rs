//! RocksDB-backed identities and ledger
//!
//! One database with a column family per record type. Values are bincode
//! encoded. Reads share the database lock; writes that must check
//! uniqueness first (names, ballots) hold it exclusively so the check and
//! the batch commit are a single step.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info};

use super::schema::{self, keys, ALL_CFS};
use crate::credentials::{hash_password, validate_registration, CredentialStore};
use crate::error::{SessionError, SessionResult};
use crate::identity::{Identity, IdentityId};
use crate::ledger::{
    self, validate_proposal, Ledger, LedgerTally, LedgerWipe, Proposal, ProposalId,
    ProposalStatus, Vote,
};
use crate::tally::VoteChoice;

/// Error type for store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rocksdb::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Lock poisoned")]
    LockPoisoned,

    #[error("Column family not found: {0}")]
    ColumnFamilyNotFound(String),
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::LockPoisoned => SessionError::LockPoisoned,
            other => SessionError::storage(other.to_string()),
        }
    }
}

/// Shared reference to RocksStore
pub type SharedRocksStore = Arc<RocksStore>;

/// Identity plus its password digest, as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredIdentity {
    identity: Identity,
    digest: String,
}

/// Counts removed by [`RocksStore::wipe_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WipeReport {
    pub identities: usize,
    pub proposals: usize,
    pub votes: usize,
}

fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    bincode::serde::encode_to_vec(value, bincode::config::standard())
        .map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| StoreError::Deserialization(e.to_string()))
}

fn handle<'a>(db: &'a DB, name: &str) -> StoreResult<&'a ColumnFamily> {
    db.cf_handle(name)
        .ok_or_else(|| StoreError::ColumnFamilyNotFound(name.to_string()))
}

fn get<T: DeserializeOwned>(db: &DB, cf_name: &str, key: &str) -> StoreResult<Option<T>> {
    let cf = handle(db, cf_name)?;
    match db.get_cf(&cf, key.as_bytes())? {
        Some(bytes) => Ok(Some(decode(&bytes)?)),
        None => Ok(None),
    }
}

fn put<T: Serialize>(
    db: &DB,
    batch: &mut WriteBatch,
    cf_name: &str,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let cf = handle(db, cf_name)?;
    batch.put_cf(&cf, key.as_bytes(), encode(value)?);
    Ok(())
}

/// Values under `prefix`, in key order
fn scan<T: DeserializeOwned>(db: &DB, cf_name: &str, prefix: &str) -> StoreResult<Vec<T>> {
    let cf = handle(db, cf_name)?;
    let mut values = Vec::new();
    for item in db.prefix_iterator_cf(&cf, prefix.as_bytes()) {
        let (key, value) = item?;
        if !key.starts_with(prefix.as_bytes()) {
            break; // Prefix no longer matches
        }
        values.push(decode(&value)?);
    }
    Ok(values)
}

/// Queue deletion of every key in a column family, returning how many
fn clear_cf(db: &DB, batch: &mut WriteBatch, cf_name: &str) -> StoreResult<usize> {
    let cf = handle(db, cf_name)?;
    let mut removed = 0;
    for item in db.iterator_cf(&cf, IteratorMode::Start) {
        let (key, _) = item?;
        batch.delete_cf(&cf, key);
        removed += 1;
    }
    Ok(removed)
}

/// Next value of an id sequence; the caller commits the updated counter
fn next_id(db: &DB, batch: &mut WriteBatch, sequence: &str) -> StoreResult<u64> {
    let current: u64 = get(db, schema::CF_META, sequence)?.unwrap_or(0);
    let next = current + 1;
    put(db, batch, schema::CF_META, sequence, &next)?;
    Ok(next)
}

/// Persistent credential store and ledger
pub struct RocksStore {
    db: RwLock<DB>,
    path: PathBuf,
    min_password_length: usize,
}

impl RocksStore {
    /// Open or create a store at the given path
    pub fn open(path: impl Into<PathBuf>, min_password_length: usize) -> StoreResult<Self> {
        let path = path.into();

        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = ALL_CFS
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Options::default()))
            .collect();

        let db = DB::open_cf_descriptors(&opts, &path, cf_descriptors)?;
        info!(path = %path.display(), "State store opened");

        Ok(Self {
            db: RwLock::new(db),
            path,
            min_password_length,
        })
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedRocksStore {
        Arc::new(self)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, DB>> {
        self.db.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, DB>> {
        self.db.write().map_err(|_| StoreError::LockPoisoned)
    }

    fn stored_identity(db: &DB, id: IdentityId) -> StoreResult<Option<StoredIdentity>> {
        get(db, schema::CF_USERS, &keys::user(id))
    }

    /// Delete every identity, proposal, and vote. Column families and id
    /// sequences are kept.
    pub fn wipe_all(&self) -> StoreResult<WipeReport> {
        let db = self.write()?;
        let mut batch = WriteBatch::default();

        let report = WipeReport {
            identities: clear_cf(&db, &mut batch, schema::CF_USERS)?,
            proposals: clear_cf(&db, &mut batch, schema::CF_PROPOSALS)?,
            votes: clear_cf(&db, &mut batch, schema::CF_VOTES)?,
        };
        clear_cf(&db, &mut batch, schema::CF_NAMES)?;
        db.write(batch)?;

        info!(
            identities = report.identities,
            proposals = report.proposals,
            votes = report.votes,
            "State store wiped"
        );
        Ok(report)
    }
}

impl CredentialStore for RocksStore {
    fn register(&self, name: &str, password: &str, position: &str) -> SessionResult<Identity> {
        let registration =
            validate_registration(name, password, position, self.min_password_length)?;

        let db = self.write()?;
        let name_key = keys::name(&registration.name);
        if get::<IdentityId>(&db, schema::CF_NAMES, &name_key)?.is_some() {
            return Err(SessionError::conflict(format!(
                "name '{}' is already registered",
                registration.name
            )));
        }

        let mut batch = WriteBatch::default();
        let id = next_id(&db, &mut batch, keys::USER_SEQUENCE)?;
        let identity = Identity::new(id, &registration.name, &registration.position);
        let stored = StoredIdentity {
            digest: hash_password(&identity.name, password),
            identity: identity.clone(),
        };
        put(&db, &mut batch, schema::CF_USERS, &keys::user(id), &stored)?;
        put(&db, &mut batch, schema::CF_NAMES, &name_key, &id)?;
        db.write(batch).map_err(StoreError::from)?;

        debug!(identity = id, name = %identity.name, "Identity registered");
        Ok(identity)
    }

    fn authenticate(&self, name: &str, password: &str) -> SessionResult<Identity> {
        let db = self.read()?;
        let invalid = || SessionError::unauthorized("invalid credentials");

        let id: IdentityId =
            get(&db, schema::CF_NAMES, &keys::name(name.trim()))?.ok_or_else(invalid)?;
        let stored = Self::stored_identity(&db, id)?.ok_or_else(invalid)?;

        if stored.digest != hash_password(&stored.identity.name, password) {
            return Err(invalid());
        }
        Ok(stored.identity)
    }

    fn verify_password(&self, id: IdentityId, password: &str) -> SessionResult<()> {
        if password.is_empty() {
            return Err(SessionError::unauthorized("password required"));
        }
        let db = self.read()?;
        match Self::stored_identity(&db, id)? {
            Some(stored) if stored.digest == hash_password(&stored.identity.name, password) => {
                Ok(())
            }
            _ => Err(SessionError::unauthorized("invalid password")),
        }
    }

    fn get(&self, id: IdentityId) -> SessionResult<Option<Identity>> {
        let db = self.read()?;
        Ok(Self::stored_identity(&db, id)?.map(|stored| stored.identity))
    }

    fn list(&self) -> SessionResult<Vec<Identity>> {
        let db = self.read()?;
        let stored: Vec<StoredIdentity> = scan(&db, schema::CF_USERS, keys::USER_PREFIX)?;
        Ok(stored.into_iter().map(|s| s.identity).collect())
    }

    fn count(&self) -> SessionResult<usize> {
        Ok(self.list()?.len())
    }

    fn wipe(&self) -> SessionResult<usize> {
        let db = self.write()?;
        let mut batch = WriteBatch::default();
        let removed = clear_cf(&db, &mut batch, schema::CF_USERS)?;
        clear_cf(&db, &mut batch, schema::CF_NAMES)?;
        db.write(batch).map_err(StoreError::from)?;
        Ok(removed)
    }
}

impl Ledger for RocksStore {
    fn create_proposal(
        &self,
        title: &str,
        description: &str,
        proposed_by: &str,
    ) -> SessionResult<Proposal> {
        let (title, description) = validate_proposal(title, description)?;
        let db = self.write()?;
        let mut batch = WriteBatch::default();

        let id = next_id(&db, &mut batch, keys::PROPOSAL_SEQUENCE)?;
        let proposal = Proposal {
            id,
            title,
            description,
            proposed_by: proposed_by.to_string(),
            created_at: Utc::now(),
            status: ProposalStatus::Active,
        };
        put(&db, &mut batch, schema::CF_PROPOSALS, &keys::proposal(id), &proposal)?;
        db.write(batch).map_err(StoreError::from)?;

        debug!(proposal = id, "Ledger proposal created");
        Ok(proposal)
    }

    fn list_proposals(&self) -> SessionResult<Vec<Proposal>> {
        let db = self.read()?;
        let mut proposals: Vec<Proposal> =
            scan(&db, schema::CF_PROPOSALS, keys::PROPOSAL_PREFIX)?;
        proposals.reverse();
        Ok(proposals)
    }

    fn get_proposal(&self, id: ProposalId) -> SessionResult<Option<Proposal>> {
        let db = self.read()?;
        Ok(get(&db, schema::CF_PROPOSALS, &keys::proposal(id))?)
    }

    fn cast_vote(
        &self,
        proposal_id: ProposalId,
        user_id: IdentityId,
        choice: VoteChoice,
    ) -> SessionResult<Vote> {
        let db = self.write()?;
        if get::<Proposal>(&db, schema::CF_PROPOSALS, &keys::proposal(proposal_id))?.is_none() {
            return Err(ledger::unknown_proposal(proposal_id));
        }

        let key = keys::vote(proposal_id, user_id);
        if get::<Vote>(&db, schema::CF_VOTES, &key)?.is_some() {
            return Err(ledger::already_voted());
        }

        let vote = Vote {
            proposal_id,
            user_id,
            choice,
            voted_at: Utc::now(),
        };
        let mut batch = WriteBatch::default();
        put(&db, &mut batch, schema::CF_VOTES, &key, &vote)?;
        db.write(batch).map_err(StoreError::from)?;
        Ok(vote)
    }

    fn tally(&self, proposal_id: ProposalId) -> SessionResult<LedgerTally> {
        let db = self.read()?;
        if get::<Proposal>(&db, schema::CF_PROPOSALS, &keys::proposal(proposal_id))?.is_none() {
            return Err(ledger::unknown_proposal(proposal_id));
        }
        let votes: Vec<Vote> = scan(&db, schema::CF_VOTES, &keys::votes_for(proposal_id))?;
        Ok(votes.iter().collect())
    }

    fn wipe(&self) -> SessionResult<LedgerWipe> {
        let db = self.write()?;
        let mut batch = WriteBatch::default();
        let removed = LedgerWipe {
            proposals: clear_cf(&db, &mut batch, schema::CF_PROPOSALS)?,
            votes: clear_cf(&db, &mut batch, schema::CF_VOTES)?,
        };
        db.write(batch).map_err(StoreError::from)?;
        Ok(removed)
    }
}
