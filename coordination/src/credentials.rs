//! Credential store collaborator
//!
//! Verifies name/password pairs and hands out [`Identity`] records. The
//! coordinator only needs identities and a total count; how passwords are
//! stored is an implementation detail of each store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{SessionError, SessionResult};
use crate::identity::{Identity, IdentityId};

/// Shared reference to a credential store
pub type SharedCredentialStore = Arc<dyn CredentialStore>;

/// Registered identities and their credentials
pub trait CredentialStore: Send + Sync {
    /// Register a new identity
    fn register(&self, name: &str, password: &str, position: &str) -> SessionResult<Identity>;

    /// Verify a name/password pair
    fn authenticate(&self, name: &str, password: &str) -> SessionResult<Identity>;

    /// Step-up check of an already authenticated identity's password
    fn verify_password(&self, id: IdentityId, password: &str) -> SessionResult<()>;

    /// Look up an identity by id
    fn get(&self, id: IdentityId) -> SessionResult<Option<Identity>>;

    /// All identities in registration order
    fn list(&self) -> SessionResult<Vec<Identity>>;

    /// Number of registered identities
    fn count(&self) -> SessionResult<usize>;

    /// Remove every identity, returning how many were removed
    fn wipe(&self) -> SessionResult<usize>;
}

/// Digest stored in place of a password
pub fn hash_password(name: &str, password: &str) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(name.as_bytes());
    hasher.update(&[0]);
    hasher.update(password.as_bytes());
    hasher.finalize().to_hex().to_string()
}

/// Normalized registration fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    pub name: String,
    pub position: String,
}

/// Check registration fields shared by every store implementation
pub fn validate_registration(
    name: &str,
    password: &str,
    position: &str,
    min_password_length: usize,
) -> SessionResult<Registration> {
    let name = name.trim();
    let position = position.trim();

    if name.is_empty() || password.is_empty() || position.is_empty() {
        return Err(SessionError::invalid_input(
            "name, password, and position are required",
        ));
    }
    if password.chars().count() < min_password_length {
        return Err(SessionError::invalid_input(format!(
            "weak password: must be at least {} characters",
            min_password_length
        )));
    }

    Ok(Registration {
        name: name.to_string(),
        position: position.to_string(),
    })
}

fn invalid_credentials() -> SessionError {
    SessionError::unauthorized("invalid credentials")
}

#[derive(Default)]
struct CredentialTables {
    next_id: IdentityId,
    identities: BTreeMap<IdentityId, (Identity, String)>,
    by_name: HashMap<String, IdentityId>,
}

/// In-memory credential store
pub struct MemoryCredentialStore {
    min_password_length: usize,
    tables: RwLock<CredentialTables>,
}

impl MemoryCredentialStore {
    pub fn new(min_password_length: usize) -> Self {
        Self {
            min_password_length,
            tables: RwLock::new(CredentialTables {
                next_id: 1,
                ..Default::default()
            }),
        }
    }

    /// Create a shared reference to this store
    pub fn shared(self) -> SharedCredentialStore {
        Arc::new(self)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn register(&self, name: &str, password: &str, position: &str) -> SessionResult<Identity> {
        let registration =
            validate_registration(name, password, position, self.min_password_length)?;

        let mut tables = self.tables.write().map_err(|_| SessionError::LockPoisoned)?;
        if tables.by_name.contains_key(&registration.name) {
            return Err(SessionError::conflict(format!(
                "name '{}' is already registered",
                registration.name
            )));
        }

        let id = tables.next_id;
        tables.next_id += 1;

        let identity = Identity::new(id, &registration.name, &registration.position);
        let digest = hash_password(&identity.name, password);
        tables.by_name.insert(identity.name.clone(), id);
        tables.identities.insert(id, (identity.clone(), digest));

        debug!(identity = id, name = %identity.name, "Identity registered");
        Ok(identity)
    }

    fn authenticate(&self, name: &str, password: &str) -> SessionResult<Identity> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        let id = tables
            .by_name
            .get(name.trim())
            .ok_or_else(invalid_credentials)?;
        let (identity, digest) = tables.identities.get(id).ok_or_else(invalid_credentials)?;

        if *digest != hash_password(&identity.name, password) {
            return Err(invalid_credentials());
        }
        Ok(identity.clone())
    }

    fn verify_password(&self, id: IdentityId, password: &str) -> SessionResult<()> {
        if password.is_empty() {
            return Err(SessionError::unauthorized("password required"));
        }
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        match tables.identities.get(&id) {
            Some((identity, digest)) if *digest == hash_password(&identity.name, password) => {
                Ok(())
            }
            _ => Err(SessionError::unauthorized("invalid password")),
        }
    }

    fn get(&self, id: IdentityId) -> SessionResult<Option<Identity>> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        Ok(tables.identities.get(&id).map(|(identity, _)| identity.clone()))
    }

    fn list(&self) -> SessionResult<Vec<Identity>> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        Ok(tables
            .identities
            .values()
            .map(|(identity, _)| identity.clone())
            .collect())
    }

    fn count(&self) -> SessionResult<usize> {
        let tables = self.tables.read().map_err(|_| SessionError::LockPoisoned)?;
        Ok(tables.identities.len())
    }

    fn wipe(&self) -> SessionResult<usize> {
        let mut tables = self.tables.write().map_err(|_| SessionError::LockPoisoned)?;
        let removed = tables.identities.len();
        tables.identities.clear();
        tables.by_name.clear();
        Ok(removed)
    }
}
