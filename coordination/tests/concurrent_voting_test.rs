//! Concurrency tests for the shared coordinator
//!
//! Many request handlers hit one coordinator at once; these tests check
//! that no ballot is lost or double counted and that one-shot transitions
//! fire once.

use std::sync::Arc;
use std::thread;

use assembly_coordination::{
    CredentialStore, EventBus, IdentityId, MemoryCredentialStore, RoomCode, SessionConfig,
    SessionCoordinator, SessionError, SessionEvent, SharedCoordinator, VoteChoice, VoteCounts,
};

const MEMBERS: usize = 12;

/// A shared coordinator with `MEMBERS` present participants in one room
fn crowded_room() -> (SharedCoordinator, RoomCode, Vec<IdentityId>) {
    let credentials = MemoryCredentialStore::new(4).shared();
    let coordinator = SessionCoordinator::with_seed(
        SessionConfig::default(),
        credentials.clone(),
        EventBus::with_capacity(1024).shared(),
        5,
    )
    .unwrap()
    .shared();

    let ids: Vec<IdentityId> = (0..MEMBERS)
        .map(|i| {
            let id = credentials
                .register(&format!("delegate{}", i), "secret", "Delegate")
                .unwrap()
                .id;
            coordinator.mark_present(id).unwrap();
            id
        })
        .collect();

    let room = coordinator.create_room(ids[0], None, None).unwrap().room_code;
    for id in &ids[1..] {
        coordinator.join_room(*id, room.as_str(), None).unwrap();
    }
    (coordinator, room, ids)
}

/// Test: parallel ballots on one proposal are all counted exactly once
#[test]
fn test_parallel_votes_are_not_lost() {
    let (coordinator, room, ids) = crowded_room();
    let proposer = ids[0];
    coordinator
        .submit_proposal(proposer, "Water", "Clean water")
        .unwrap();

    let handles: Vec<_> = ids[1..]
        .iter()
        .enumerate()
        .map(|(i, voter)| {
            let coordinator = Arc::clone(&coordinator);
            let voter = *voter;
            let choice = if i % 2 == 0 {
                VoteChoice::Yes
            } else {
                VoteChoice::No
            };
            thread::spawn(move || coordinator.record_submission_vote(voter, proposer, choice))
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let counts = coordinator.submission_counts(&room, proposer).unwrap();
    assert_eq!(counts, VoteCounts::new(6, 5, 0));
}

/// Test: racing duplicate ballots from one voter count once
#[test]
fn test_racing_duplicates_count_once() {
    let (coordinator, room, ids) = crowded_room();
    let (proposer, voter) = (ids[0], ids[1]);
    coordinator
        .submit_proposal(proposer, "Water", "Clean water")
        .unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let coordinator = Arc::clone(&coordinator);
            thread::spawn(move || {
                coordinator.record_submission_vote(voter, proposer, VoteChoice::Yes)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let accepted = results.iter().filter(|r| r.is_ok()).count();
    let duplicates = results
        .iter()
        .filter(|r| matches!(r, Err(SessionError::DuplicateAction { .. })))
        .count();

    assert_eq!(accepted, 1);
    assert_eq!(duplicates, 7);
    assert_eq!(
        coordinator.submission_counts(&room, proposer).unwrap().yes,
        1
    );
}

/// Test: concurrent arrivals and status polls arm the tiebreak exactly once
#[test]
fn test_concurrent_arrivals_arm_once() {
    let (coordinator, room, ids) = crowded_room();
    let mut events = coordinator.events().subscribe();
    coordinator.start_tiebreaker(ids[0]).unwrap();

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let coordinator = Arc::clone(&coordinator);
            let room = room.clone();
            let id = *id;
            thread::spawn(move || {
                coordinator.arrive_at_tiebreaker(id).unwrap();
                // every arrival also polls, like a waiting screen would
                coordinator.arrival_status(&room).unwrap()
            })
        })
        .collect();

    let polls: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(polls.iter().any(|status| status.all_arrived));

    let armed = std::iter::from_fn(|| events.try_recv().ok())
        .filter(|event| matches!(event, SessionEvent::TiebreakArmed { .. }))
        .count();
    assert_eq!(armed, 1);
    assert!(coordinator.round_snapshot(&room).unwrap().tiebreak_armed);
}

/// Test: readiness from many threads reaches a consistent total
#[test]
fn test_parallel_ready_marks() {
    let (coordinator, room, ids) = crowded_room();

    let handles: Vec<_> = ids
        .iter()
        .map(|id| {
            let coordinator = Arc::clone(&coordinator);
            let id = *id;
            thread::spawn(move || coordinator.mark_ready(id))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let status = coordinator.ready_status(&room).unwrap();
    assert_eq!(status.ready, MEMBERS);
    assert!(status.all_ready);
}
