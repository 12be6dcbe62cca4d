//! Room registry
//!
//! Rooms partition participants into voting sessions. The registry keeps the
//! room table and its inverse, the membership index, in step: an identity is
//! in at most one room, and a room disappears the moment its last member
//! leaves.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{SessionError, SessionResult};
use crate::identity::IdentityId;

/// Characters a generated room code is drawn from
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// Case-insensitive room code, stored in uppercase canonical form
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Canonicalize user input (trim and uppercase)
    pub fn parse(input: &str) -> SessionResult<Self> {
        let code = input.trim().to_uppercase();
        if code.is_empty() {
            return Err(SessionError::invalid_input("room code is required"));
        }
        if !code.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SessionError::invalid_input(format!(
                "room code '{}' must be alphanumeric",
                input.trim()
            )));
        }
        Ok(Self(code))
    }

    /// Draw a random code of `length` characters
    pub fn generate<R: Rng>(rng: &mut R, length: usize) -> Self {
        let code = (0..length)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RoomCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A live room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub code: RoomCode,
    pub name: String,
    /// Never serialized back to participants
    #[serde(skip_serializing, default)]
    pub passcode: Option<String>,
    pub created_by: IdentityId,
    pub members: BTreeSet<IdentityId>,
    pub created_at: DateTime<Utc>,
}

impl Room {
    pub fn has_passcode(&self) -> bool {
        self.passcode.is_some()
    }

    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            room_code: self.code.clone(),
            room_name: self.name.clone(),
            users_count: self.members.len(),
            created_by: self.created_by,
            created_date: self.created_at,
        }
    }

    pub fn info(&self) -> RoomInfo {
        RoomInfo {
            room_code: self.code.clone(),
            room_name: self.name.clone(),
            users_count: self.members.len(),
            has_passcode: self.has_passcode(),
            created_date: self.created_at,
        }
    }
}

/// The caller's own room
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub room_code: RoomCode,
    pub room_name: String,
    pub users_count: usize,
    pub created_by: IdentityId,
    pub created_date: DateTime<Utc>,
}

/// Public view of any room; exposes only whether a passcode exists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_code: RoomCode,
    pub room_name: String,
    pub users_count: usize,
    pub has_passcode: bool,
    pub created_date: DateTime<Utc>,
}

/// What happened when an identity left its room
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub code: RoomCode,
    /// The identity was the last member and the room was deleted
    pub room_closed: bool,
}

/// Room table plus membership index
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, Room>,
    memberships: HashMap<IdentityId, RoomCode>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a room with a fresh code and `identity` as its only member.
    ///
    /// An identity already in a room leaves it first. The departure, if any,
    /// is returned alongside the new code.
    pub fn create<R: Rng>(
        &mut self,
        identity: IdentityId,
        name: Option<String>,
        passcode: Option<String>,
        rng: &mut R,
        code_length: usize,
        attempts: u32,
    ) -> SessionResult<(RoomCode, Option<Departure>)> {
        let code = self.allocate_code(rng, code_length, attempts)?;
        let departure = self.leave(identity).ok();

        let name = match name.map(|n| n.trim().to_string()) {
            Some(n) if !n.is_empty() => n,
            _ => format!("Room {}", rng.gen_range(1000..=9999)),
        };

        let room = Room {
            code: code.clone(),
            name,
            passcode: normalize_passcode(passcode),
            created_by: identity,
            members: BTreeSet::from([identity]),
            created_at: Utc::now(),
        };

        info!(room = %code, identity, name = %room.name, "Room created");
        self.rooms.insert(code.clone(), room);
        self.memberships.insert(identity, code.clone());

        Ok((code, departure))
    }

    fn allocate_code<R: Rng>(
        &self,
        rng: &mut R,
        code_length: usize,
        attempts: u32,
    ) -> SessionResult<RoomCode> {
        for attempt in 0..attempts {
            let code = RoomCode::generate(rng, code_length);
            if !self.rooms.contains_key(&code) {
                return Ok(code);
            }
            debug!(room = %code, attempt, "Room code collision, regenerating");
        }
        Err(SessionError::duplicate(format!(
            "could not allocate an unused room code after {} attempts",
            attempts
        )))
    }

    /// Join an existing room, moving the identity out of any previous room
    pub fn join(
        &mut self,
        identity: IdentityId,
        code: &RoomCode,
        passcode: Option<&str>,
    ) -> SessionResult<(Room, Option<Departure>)> {
        let room = self
            .rooms
            .get(code)
            .ok_or_else(|| SessionError::not_found(format!("Room {}", code)))?;

        if let Some(expected) = room.passcode.as_deref() {
            if passcode != Some(expected) {
                return Err(SessionError::unauthorized("invalid passcode"));
            }
        }

        let moving = self
            .memberships
            .get(&identity)
            .is_some_and(|current| current != code);
        let departure = if moving {
            self.leave(identity).ok()
        } else {
            None
        };

        let room = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| SessionError::not_found(format!("Room {}", code)))?;
        room.members.insert(identity);
        self.memberships.insert(identity, code.clone());

        info!(room = %code, identity, members = room.members.len(), "Joined room");
        Ok((room.clone(), departure))
    }

    /// Remove the identity from its room, deleting the room if it is now empty
    pub fn leave(&mut self, identity: IdentityId) -> SessionResult<Departure> {
        let code = self
            .memberships
            .remove(&identity)
            .ok_or_else(|| SessionError::not_found("Room membership"))?;

        let room_closed = match self.rooms.get_mut(&code) {
            Some(room) => {
                room.members.remove(&identity);
                room.members.is_empty()
            }
            // index pointed at a deleted room; the membership is already gone
            None => false,
        };

        if room_closed {
            self.rooms.remove(&code);
            info!(room = %code, identity, "Last member left, room closed");
        } else {
            info!(room = %code, identity, "Left room");
        }

        Ok(Departure { code, room_closed })
    }

    /// The identity's current room. A stale index entry reads as roomless.
    pub fn current(&self, identity: IdentityId) -> SessionResult<&Room> {
        self.memberships
            .get(&identity)
            .and_then(|code| self.rooms.get(code))
            .ok_or_else(|| SessionError::not_found("Room membership"))
    }

    pub fn get(&self, code: &RoomCode) -> SessionResult<&Room> {
        self.rooms
            .get(code)
            .ok_or_else(|| SessionError::not_found(format!("Room {}", code)))
    }

    pub fn info(&self, code: &RoomCode) -> SessionResult<RoomInfo> {
        self.get(code).map(Room::info)
    }

    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    pub fn contains(&self, code: &RoomCode) -> bool {
        self.rooms.contains_key(code)
    }
}

fn normalize_passcode(passcode: Option<String>) -> Option<String> {
    passcode.filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_code_parse_canonicalizes() {
        let code = RoomCode::parse("  abc123 ").unwrap();
        assert_eq!(code.as_str(), "ABC123");
        assert!(RoomCode::parse("").is_err());
        assert!(RoomCode::parse("AB-12").is_err());
    }

    #[test]
    fn test_generated_code_shape() {
        let code = RoomCode::generate(&mut rng(), 6);
        assert_eq!(code.as_str().len(), 6);
        assert!(code
            .as_str()
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn test_create_is_immediately_joinable() {
        let mut registry = RoomRegistry::new();
        let (code, departure) = registry
            .create(1, Some("Plenary".into()), None, &mut rng(), 6, 8)
            .unwrap();
        assert!(departure.is_none());

        let (room, _) = registry.join(2, &code, None).unwrap();
        assert_eq!(room.name, "Plenary");
        assert_eq!(room.members, BTreeSet::from([1, 2]));
        assert_eq!(registry.current(2).unwrap().code, code);
    }

    #[test]
    fn test_default_room_name() {
        let mut registry = RoomRegistry::new();
        let (code, _) = registry.create(1, None, None, &mut rng(), 6, 8).unwrap();
        let name = &registry.get(&code).unwrap().name;
        assert!(name.starts_with("Room "));
        let number: u32 = name["Room ".len()..].parse().unwrap();
        assert!((1000..=9999).contains(&number));
    }

    #[test]
    fn test_code_collision_regenerates() {
        let mut registry = RoomRegistry::new();
        let (first, _) = registry.create(1, None, None, &mut rng(), 6, 8).unwrap();
        // same seed draws the same first code, forcing a retry
        let (second, _) = registry.create(2, None, None, &mut rng(), 6, 8).unwrap();
        assert_ne!(first, second);
        assert_eq!(registry.room_count(), 2);
    }

    #[test]
    fn test_code_collision_exhausts_attempts() {
        let mut registry = RoomRegistry::new();
        registry.create(1, None, None, &mut rng(), 6, 1).unwrap();
        let err = registry.create(2, None, None, &mut rng(), 6, 1).unwrap_err();
        assert!(matches!(err, SessionError::DuplicateAction { .. }));
        assert!(registry.current(2).is_err());
    }

    #[test]
    fn test_join_unknown_room() {
        let mut registry = RoomRegistry::new();
        let code = RoomCode::parse("ZZZZZZ").unwrap();
        assert!(matches!(
            registry.join(1, &code, None),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_passcode_enforced() {
        let mut registry = RoomRegistry::new();
        let (code, _) = registry
            .create(1, None, Some("x".into()), &mut rng(), 6, 8)
            .unwrap();

        assert!(matches!(
            registry.join(2, &code, None),
            Err(SessionError::Unauthorized { .. })
        ));
        assert!(matches!(
            registry.join(2, &code, Some("y")),
            Err(SessionError::Unauthorized { .. })
        ));
        assert!(registry.join(2, &code, Some("x")).is_ok());
        assert!(registry.info(&code).unwrap().has_passcode);
    }

    #[test]
    fn test_empty_passcode_means_open_room() {
        let mut registry = RoomRegistry::new();
        let (code, _) = registry
            .create(1, None, Some(String::new()), &mut rng(), 6, 8)
            .unwrap();
        assert!(!registry.info(&code).unwrap().has_passcode);
        assert!(registry.join(2, &code, Some("anything")).is_ok());
    }

    #[test]
    fn test_rejoin_is_idempotent() {
        let mut registry = RoomRegistry::new();
        let (code, _) = registry.create(1, None, None, &mut rng(), 6, 8).unwrap();
        registry.join(2, &code, None).unwrap();
        let (room, departure) = registry.join(2, &code, None).unwrap();
        assert!(departure.is_none());
        assert_eq!(room.members.len(), 2);
    }

    #[test]
    fn test_join_moves_identity_between_rooms() {
        let mut registry = RoomRegistry::new();
        let mut rng = rng();
        let (a, _) = registry.create(1, None, None, &mut rng, 6, 8).unwrap();
        let (b, _) = registry.create(2, None, None, &mut rng, 6, 8).unwrap();
        registry.join(3, &a, None).unwrap();

        let (_, departure) = registry.join(3, &b, None).unwrap();
        assert_eq!(
            departure,
            Some(Departure {
                code: a.clone(),
                room_closed: false
            })
        );
        assert!(!registry.get(&a).unwrap().members.contains(&3));
        assert_eq!(registry.current(3).unwrap().code, b);
    }

    #[test]
    fn test_last_member_leaving_frees_code() {
        let mut registry = RoomRegistry::new();
        let (code, _) = registry.create(1, None, None, &mut rng(), 6, 8).unwrap();
        registry.join(2, &code, None).unwrap();

        assert!(!registry.leave(1).unwrap().room_closed);
        assert!(registry.leave(2).unwrap().room_closed);
        assert!(registry.get(&code).is_err());

        // the same seed now yields the same code on the first attempt
        let (again, _) = registry.create(5, None, None, &mut rng(), 6, 1).unwrap();
        assert_eq!(again, code);
    }

    #[test]
    fn test_leave_without_room() {
        let mut registry = RoomRegistry::new();
        assert!(matches!(
            registry.leave(42),
            Err(SessionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_create_leaves_previous_room() {
        let mut registry = RoomRegistry::new();
        let mut rng = rng();
        let (old, _) = registry.create(1, None, None, &mut rng, 6, 8).unwrap();
        let (new, departure) = registry.create(1, None, None, &mut rng, 6, 8).unwrap();

        assert_eq!(
            departure,
            Some(Departure {
                code: old.clone(),
                room_closed: true
            })
        );
        assert!(!registry.contains(&old));
        assert_eq!(registry.current(1).unwrap().code, new);
    }
}
