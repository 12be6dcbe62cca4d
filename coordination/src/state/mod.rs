//! Durable state behind the `heavy-state` feature
//!
//! A RocksDB store that implements both collaborator traits:
//!
//! - `users` / `names`: identities, password digests, and the name index
//! - `proposals` / `votes`: the persistent ledger
//! - `meta`: id sequences
//!
//! Live round state is never written here; a restart loses any round in
//! progress.
//!
//! ```ignore
//! let store = RocksStore::open("./assembly-state", 4)?.shared();
//! let credentials: SharedCredentialStore = store.clone();
//! let ledger: SharedLedger = store;
//! ```

pub mod schema;
pub mod store;

pub use store::{RocksStore, SharedRocksStore, StoreError, StoreResult, WipeReport};
