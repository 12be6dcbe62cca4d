//! Opaque bearer-token sessions
//!
//! Tokens are random v4 UUIDs mapped to the identity that logged in. They
//! carry no claims; losing the table (a restart) logs everyone out.

use std::collections::HashMap;
use std::sync::RwLock;

use assembly_coordination::{IdentityId, SessionError, SessionResult};
use axum::http::{header, HeaderMap};
use tracing::debug;
use uuid::Uuid;

/// Live tokens one identity may hold; logging in past this drops the
/// oldest
pub const MAX_TOKENS_PER_IDENTITY: usize = 4;

struct Grant {
    identity: IdentityId,
    serial: u64,
}

#[derive(Default)]
struct TokenTable {
    grants: HashMap<Uuid, Grant>,
    issued: u64,
}

/// Live bearer tokens
pub struct SessionTokens {
    table: RwLock<TokenTable>,
    per_identity: usize,
}

impl Default for SessionTokens {
    fn default() -> Self {
        Self::with_limit(MAX_TOKENS_PER_IDENTITY)
    }
}

impl SessionTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `per_identity` live tokens for each identity
    pub fn with_limit(per_identity: usize) -> Self {
        Self {
            table: RwLock::new(TokenTable::default()),
            per_identity: per_identity.max(1),
        }
    }

    /// Mint a new token for `identity`, evicting its oldest if at the limit
    pub fn issue(&self, identity: IdentityId) -> SessionResult<String> {
        let mut table = self.table.write().map_err(|_| SessionError::LockPoisoned)?;

        let mut held: Vec<(u64, Uuid)> = table
            .grants
            .iter()
            .filter(|(_, grant)| grant.identity == identity)
            .map(|(token, grant)| (grant.serial, *token))
            .collect();
        if held.len() >= self.per_identity {
            held.sort_unstable();
            let excess = held.len() + 1 - self.per_identity;
            for (_, token) in held.into_iter().take(excess) {
                table.grants.remove(&token);
            }
            debug!(identity, evicted = excess, "Oldest session tokens evicted");
        }

        table.issued += 1;
        let serial = table.issued;
        let token = Uuid::new_v4();
        table.grants.insert(token, Grant { identity, serial });
        debug!(identity, "Session token issued");
        Ok(token.to_string())
    }

    /// The identity behind a token; unknown or malformed tokens are
    /// `Unauthorized`
    pub fn resolve(&self, token: &str) -> SessionResult<IdentityId> {
        let token = Uuid::parse_str(token.trim())
            .map_err(|_| SessionError::unauthorized("malformed session token"))?;
        self.table
            .read()
            .map_err(|_| SessionError::LockPoisoned)?
            .grants
            .get(&token)
            .map(|grant| grant.identity)
            .ok_or_else(|| SessionError::unauthorized("session expired or unknown"))
    }

    /// Drop every token held by `identity`, returning how many were revoked
    pub fn revoke_all(&self, identity: IdentityId) -> SessionResult<usize> {
        let mut table = self.table.write().map_err(|_| SessionError::LockPoisoned)?;
        let before = table.grants.len();
        table.grants.retain(|_, grant| grant.identity != identity);
        Ok(before - table.grants.len())
    }

    pub fn active(&self) -> SessionResult<usize> {
        Ok(self
            .table
            .read()
            .map_err(|_| SessionError::LockPoisoned)?
            .grants
            .len())
    }
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> SessionResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| SessionError::unauthorized("missing Authorization header"))?
        .to_str()
        .map_err(|_| SessionError::unauthorized("malformed Authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(SessionError::unauthorized(
            "expected 'Authorization: Bearer <token>'",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_issue_and_resolve() {
        let tokens = SessionTokens::new();
        let token = tokens.issue(7).unwrap();
        assert_eq!(tokens.resolve(&token).unwrap(), 7);
        assert!(matches!(
            tokens.resolve("not-a-token"),
            Err(SessionError::Unauthorized { .. })
        ));
        assert!(tokens.resolve(&Uuid::new_v4().to_string()).is_err());
    }

    #[test]
    fn test_revoke_all_only_hits_one_identity() {
        let tokens = SessionTokens::new();
        let first = tokens.issue(1).unwrap();
        let second = tokens.issue(1).unwrap();
        let other = tokens.issue(2).unwrap();

        assert_eq!(tokens.revoke_all(1).unwrap(), 2);
        assert!(tokens.resolve(&first).is_err());
        assert!(tokens.resolve(&second).is_err());
        assert_eq!(tokens.resolve(&other).unwrap(), 2);
        assert_eq!(tokens.active().unwrap(), 1);
    }

    #[test]
    fn test_repeat_logins_evict_oldest() {
        let tokens = SessionTokens::with_limit(2);
        let oldest = tokens.issue(1).unwrap();
        let middle = tokens.issue(1).unwrap();
        let other = tokens.issue(2).unwrap();
        let newest = tokens.issue(1).unwrap();

        assert!(tokens.resolve(&oldest).is_err());
        assert_eq!(tokens.resolve(&middle).unwrap(), 1);
        assert_eq!(tokens.resolve(&newest).unwrap(), 1);
        assert_eq!(tokens.resolve(&other).unwrap(), 2);
        assert_eq!(tokens.active().unwrap(), 3);

        for _ in 0..10 {
            tokens.issue(1).unwrap();
        }
        assert_eq!(tokens.active().unwrap(), 3);
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(bearer_token(&headers).unwrap(), "abc");

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());
    }
}
