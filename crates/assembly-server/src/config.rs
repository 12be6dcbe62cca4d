//! Server configuration
//!
//! Layered lowest to highest: built-in defaults, an optional TOML file,
//! `ASSEMBLY_*` environment variables, then command-line flags (applied by
//! the binary).
//!
//! ```toml
//! bind = "0.0.0.0:5000"
//! state_path = "./assembly-state"
//!
//! [session]
//! tiebreak_quorum = "room"
//! ```

use std::path::{Path, PathBuf};

use assembly_coordination::{SessionConfig, SessionError, SessionResult};
use serde::{Deserialize, Serialize};

/// Default listen address
pub const DEFAULT_BIND: &str = "127.0.0.1:5000";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on
    pub bind: String,

    /// RocksDB directory for identities and the ledger. Without it (or
    /// without the `heavy-state` feature) everything lives in memory.
    pub state_path: Option<PathBuf>,

    /// Coordinator settings
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            state_path: None,
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_toml_str(content: &str) -> SessionResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SessionError::config(format!("invalid server config: {}", e)))?;
        config.session.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> SessionResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SessionError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    /// File config when a path is given, defaults otherwise
    pub fn load_or_default(path: Option<&Path>) -> SessionResult<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Overlay `ASSEMBLY_BIND`, `ASSEMBLY_STATE_PATH`, and the session
    /// variables
    pub fn with_env_overrides(mut self) -> SessionResult<Self> {
        if let Ok(bind) = std::env::var("ASSEMBLY_BIND") {
            self.bind = bind;
        }
        if let Ok(path) = std::env::var("ASSEMBLY_STATE_PATH") {
            if !path.trim().is_empty() {
                self.state_path = Some(PathBuf::from(path));
            }
        }
        self.session = self.session.with_env_overrides()?;
        Ok(self)
    }
}
