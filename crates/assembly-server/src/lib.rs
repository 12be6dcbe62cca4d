//! JSON-over-HTTP surface for assembly voting sessions
//!
//! Wraps the coordination engine in a polling-friendly API:
//! - `auth`: opaque bearer tokens
//! - `service`: the facade composing coordinator, credentials, and ledger
//! - `routes`: axum handlers
//!
//! ```ignore
//! let service = VotingService::new(coordinator, credentials, ledger).shared();
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:5000").await?;
//! axum::serve(listener, router(service)).await?;
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod service;

pub use auth::{SessionTokens, MAX_TOKENS_PER_IDENTITY};
pub use config::{ServerConfig, DEFAULT_BIND};
pub use error::{ApiError, ApiResult};
pub use routes::router;
pub use service::{SharedService, VotingService};
