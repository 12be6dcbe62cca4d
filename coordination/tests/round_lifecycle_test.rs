//! Integration tests for the round coordinator
//!
//! Drives whole rooms through readiness, proposals, voting, and the
//! tiebreak sub-round, checking aggregate status and phase at each step.

use assembly_coordination::{
    CredentialStore, EventBus, IdentityId, MemoryCredentialStore, RoomCode, RoundPhase,
    SessionConfig, SessionCoordinator, SessionError, SessionEvent, SharedCredentialStore, Verdict,
    VoteChoice, VoteCounts,
};

/// A coordinator with `names` registered, present, and in one room
struct Assembly {
    coordinator: SessionCoordinator,
    credentials: SharedCredentialStore,
    room: RoomCode,
    ids: Vec<IdentityId>,
}

impl Assembly {
    fn new(names: &[&str]) -> Self {
        Self::with_config(names, SessionConfig::default(), Some("x"))
    }

    fn with_config(names: &[&str], config: SessionConfig, passcode: Option<&str>) -> Self {
        let credentials = MemoryCredentialStore::new(4).shared();
        let coordinator = SessionCoordinator::with_seed(
            config,
            credentials.clone(),
            EventBus::new().shared(),
            11,
        )
        .unwrap();

        let ids: Vec<IdentityId> = names
            .iter()
            .map(|name| {
                let identity = credentials.register(name, "secret", "Delegate").unwrap();
                coordinator.mark_present(identity.id).unwrap();
                identity.id
            })
            .collect();

        let room = coordinator
            .create_room(ids[0], Some("General Assembly".into()), passcode.map(String::from))
            .unwrap()
            .room_code;
        for id in &ids[1..] {
            coordinator.join_room(*id, room.as_str(), passcode).unwrap();
        }

        Self {
            coordinator,
            credentials,
            room,
            ids,
        }
    }

    fn phase(&self) -> RoundPhase {
        self.coordinator.phase(&self.room).unwrap()
    }

    /// Every member submits a proposal titled after its index
    fn submit_all(&self) {
        for (i, id) in self.ids.iter().enumerate() {
            self.coordinator
                .submit_proposal(*id, &format!("Proposal {}", i), "Details")
                .unwrap();
        }
    }
}

/// Test: readiness counts only present members and flips at the last one
#[test]
fn test_three_member_readiness_scenario() {
    let a = Assembly::new(&["alice", "bob", "carol"]);
    let c = &a.coordinator;

    c.mark_ready(a.ids[0]).unwrap();
    c.mark_ready(a.ids[1]).unwrap();
    let status = c.ready_status(&a.room).unwrap();
    assert_eq!((status.ready, status.total, status.all_ready), (2, 3, false));

    c.mark_ready(a.ids[2]).unwrap();
    let status = c.ready_status(&a.room).unwrap();
    assert_eq!((status.ready, status.total, status.all_ready), (3, 3, true));
    assert_eq!(a.phase(), RoundPhase::ProposalCollection);
}

/// Test: logging out shrinks the quorum and drops the leaver's readiness
#[test]
fn test_logout_shrinks_ready_quorum() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    c.mark_ready(a.ids[0]).unwrap();

    c.logout(a.ids[0]).unwrap();
    let status = c.ready_status(&a.room).unwrap();
    assert_eq!((status.ready, status.total), (0, 1));
    assert!(!status.all_ready);
}

/// Test: ready markers survive a lobby refresh but proposals do not
#[test]
fn test_lobby_resets_round_but_keeps_readiness() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;

    assert_eq!(c.enter_lobby(a.ids[0]).unwrap(), 1);
    c.mark_ready(a.ids[0]).unwrap();
    c.submit_proposal(a.ids[1], "Water", "Clean water").unwrap();

    // refresh during the lobby keeps the round number
    assert_eq!(c.enter_lobby(a.ids[1]).unwrap(), 1);

    let snapshot = c.round_snapshot(&a.room).unwrap();
    assert!(snapshot.ready.contains(&a.ids[0]));
    assert!(snapshot.submitted.is_empty());
    assert_eq!(snapshot.phase, RoundPhase::Lobby);
}

/// Test: submission count is scoped to the room quorum
#[test]
fn test_all_submitted_gates_voting() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;

    c.submit_proposal(a.ids[0], "Water", "Clean water").unwrap();
    let status = c.submission_status(&a.room).unwrap();
    assert_eq!((status.submitted, status.total), (1, 2));
    assert!(!status.all_submitted);

    // resubmission overwrites instead of counting twice
    c.submit_proposal(a.ids[0], "Water v2", "Cleaner water").unwrap();
    assert_eq!(c.submission_status(&a.room).unwrap().submitted, 1);

    c.submit_proposal(a.ids[1], "Energy", "Solar").unwrap();
    assert!(c.submission_status(&a.room).unwrap().all_submitted);
    assert_eq!(a.phase(), RoundPhase::Voting);

    let for_bob = c.proposals_to_vote_on(a.ids[1]).unwrap();
    assert_eq!(for_bob.len(), 1);
    assert_eq!(for_bob[0].title, "Water v2");
}

/// Test: a second ballot on the same proposer is rejected and not counted
#[test]
fn test_duplicate_vote_counts_once() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    a.submit_all();

    let (alice, bob) = (a.ids[0], a.ids[1]);
    c.record_submission_vote(alice, bob, VoteChoice::Yes).unwrap();
    let err = c
        .record_submission_vote(alice, bob, VoteChoice::No)
        .unwrap_err();
    assert!(matches!(err, SessionError::DuplicateAction { .. }));

    assert_eq!(
        c.submission_counts(&a.room, bob).unwrap(),
        VoteCounts::new(1, 0, 0)
    );
}

/// Test: voting on a participant who submitted nothing is NotFound
#[test]
fn test_vote_on_unknown_proposer() {
    let a = Assembly::new(&["alice", "bob"]);
    let err = a
        .coordinator
        .record_submission_vote(a.ids[0], a.ids[1], VoteChoice::Yes)
        .unwrap_err();
    assert!(matches!(err, SessionError::NotFound { .. }));
}

/// Test: 2-2 is tied, 3-1 is not
#[test]
fn test_tied_proposals_scenario() {
    let a = Assembly::new(&["p1", "p2", "v1", "v2", "v3", "v4"]);
    let c = &a.coordinator;
    let (p1, p2) = (a.ids[0], a.ids[1]);
    c.submit_proposal(p1, "Water", "Clean water").unwrap();
    c.submit_proposal(p2, "Energy", "Solar").unwrap();

    let voters = &a.ids[2..];
    for (voter, choice) in voters
        .iter()
        .zip([VoteChoice::Yes, VoteChoice::Yes, VoteChoice::No, VoteChoice::No])
    {
        c.record_submission_vote(*voter, p1, choice).unwrap();
    }
    for (voter, choice) in voters
        .iter()
        .zip([VoteChoice::Yes, VoteChoice::Yes, VoteChoice::Yes, VoteChoice::No])
    {
        c.record_submission_vote(*voter, p2, choice).unwrap();
    }

    let tied = c.tied_proposals(&a.room).unwrap();
    assert_eq!(tied.len(), 1);
    assert_eq!(tied[0].proposer_id, p1);
    assert_eq!(tied[0].proposed_by, "p1");

    let results = c.voting_results(&a.room).unwrap();
    assert_eq!(results[0].proposer_id, p2);
    assert_eq!(results[0].yes_percent, 75);
    assert_eq!(results[1].status, Verdict::Tied);
}

/// Test: with no ties, everyone finishing voting goes straight to results
#[test]
fn test_no_tie_skips_tiebreak() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    a.submit_all();
    c.record_submission_vote(a.ids[0], a.ids[1], VoteChoice::Yes)
        .unwrap();
    c.record_submission_vote(a.ids[1], a.ids[0], VoteChoice::No)
        .unwrap();

    c.mark_voting_complete(a.ids[0]).unwrap();
    assert!(!c.voting_status(&a.room).unwrap().all_voted);
    c.mark_voting_complete(a.ids[1]).unwrap();
    assert!(c.voting_status(&a.room).unwrap().all_voted);
    assert_eq!(a.phase(), RoundPhase::Results);
}

/// Test: a full round with one tie resolved by the tiebreak sub-round
#[test]
fn test_full_round_with_tiebreak() {
    let a = Assembly::new(&["alice", "bob", "carol", "dave"]);
    let c = &a.coordinator;
    let mut events = c.events().subscribe();
    let [alice, bob, carol, dave] = [a.ids[0], a.ids[1], a.ids[2], a.ids[3]];

    c.enter_lobby(alice).unwrap();
    for id in &a.ids {
        c.mark_ready(*id).unwrap();
    }
    assert!(c.ready_status(&a.room).unwrap().all_ready);

    a.submit_all();
    assert!(c.submission_status(&a.room).unwrap().all_submitted);

    // alice: 1-1 tie; bob: passes; carol: fails; dave: nobody decisive
    let ballots = [
        (bob, alice, VoteChoice::Yes),
        (carol, alice, VoteChoice::No),
        (dave, alice, VoteChoice::Abstain),
        (alice, bob, VoteChoice::Yes),
        (carol, bob, VoteChoice::Yes),
        (dave, bob, VoteChoice::No),
        (alice, carol, VoteChoice::No),
        (bob, carol, VoteChoice::No),
        (dave, carol, VoteChoice::Yes),
        (alice, dave, VoteChoice::Abstain),
        (bob, dave, VoteChoice::Abstain),
        (carol, dave, VoteChoice::Abstain),
    ];
    for (voter, proposer, choice) in ballots {
        c.record_submission_vote(voter, proposer, choice).unwrap();
    }
    for id in &a.ids {
        c.mark_voting_complete(*id).unwrap();
    }
    assert!(c.voting_status(&a.room).unwrap().all_voted);
    assert_eq!(a.phase(), RoundPhase::VoteComplete);

    let tied = c.tied_proposals(&a.room).unwrap();
    assert_eq!(tied.len(), 1);
    assert_eq!(tied[0].proposer_id, alice);

    c.start_tiebreaker(alice).unwrap();
    assert_eq!(a.phase(), RoundPhase::TiebreakArrival);
    for id in &a.ids[..3] {
        assert!(!c.arrive_at_tiebreaker(*id).unwrap().all_arrived);
    }
    let arrival = c.arrive_at_tiebreaker(dave).unwrap();
    assert!(arrival.all_arrived);
    assert_eq!(arrival.total, 4);
    assert_eq!(a.phase(), RoundPhase::TiebreakAgreement);

    for id in &a.ids {
        c.agree_to_tiebreak(*id).unwrap();
    }
    assert!(c.agreement_status(&a.room).unwrap().all_agreed);
    assert_eq!(a.phase(), RoundPhase::TiebreakVoting);

    c.record_tiebreak_vote(bob, alice, VoteChoice::Yes).unwrap();
    c.record_tiebreak_vote(carol, alice, VoteChoice::Yes).unwrap();
    c.record_tiebreak_vote(dave, alice, VoteChoice::No).unwrap();

    // polling arrival again after the threshold keeps the ballots
    assert!(c.arrival_status(&a.room).unwrap().all_arrived);
    assert!(c.round_snapshot(&a.room).unwrap().tiebreak_armed);

    for id in &a.ids {
        c.mark_tiebreak_complete(*id).unwrap();
    }
    assert!(c.tiebreak_status(&a.room).unwrap().all_complete);
    assert_eq!(a.phase(), RoundPhase::TiebreakComplete);

    let results = c.final_results(&a.room).unwrap();
    assert_eq!(a.phase(), RoundPhase::Results);

    let water = results.iter().find(|r| r.proposer_id == alice).unwrap();
    assert_eq!(water.status, Verdict::Passed);
    assert_eq!((water.yes, water.no), (2, 1));
    let energy = results.iter().find(|r| r.proposer_id == bob).unwrap();
    assert_eq!((energy.yes, energy.no), (2, 1));
    let last = results.last().unwrap();
    assert_eq!(last.proposer_id, dave);
    assert_eq!(last.total_votes, 3);
    assert_eq!(last.abstain_percent, 100);

    let mut armed = 0;
    let mut phases = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::TiebreakArmed { .. } => armed += 1,
            SessionEvent::PhaseAdvanced { to, .. } => phases.push(to),
            _ => {}
        }
    }
    assert_eq!(armed, 1);
    assert_eq!(
        phases,
        vec![
            RoundPhase::ReadyCheck,
            RoundPhase::ProposalCollection,
            RoundPhase::Voting,
            RoundPhase::VoteComplete,
            RoundPhase::TiebreakAgreement,
            RoundPhase::TiebreakVoting,
            RoundPhase::TiebreakComplete,
            RoundPhase::Results,
        ]
    );
}

/// Test: restarting the tiebreaker discards the earlier tiebreak ballots
#[test]
fn test_restart_tiebreaker_discards_votes() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    a.submit_all();
    let (alice, bob) = (a.ids[0], a.ids[1]);

    c.start_tiebreaker(alice).unwrap();
    c.record_tiebreak_vote(bob, alice, VoteChoice::No).unwrap();
    let before = c.final_results(&a.room).unwrap();
    let row = before.iter().find(|r| r.proposer_id == alice).unwrap();
    assert_eq!(row.no, 1);

    c.start_tiebreaker(bob).unwrap();
    let after = c.final_results(&a.room).unwrap();
    let row = after.iter().find(|r| r.proposer_id == alice).unwrap();
    assert_eq!(row.total_votes, 0);

    // counting starts from zero again
    c.record_tiebreak_vote(bob, alice, VoteChoice::Yes).unwrap();
    let again = c.final_results(&a.room).unwrap();
    let row = again.iter().find(|r| r.proposer_id == alice).unwrap();
    assert_eq!((row.yes, row.no), (1, 0));
}

/// Test: tiebreak ballots are deduplicated unless legacy behavior is configured
#[test]
fn test_tiebreak_dedupe_is_configurable() {
    let a = Assembly::new(&["alice", "bob"]);
    a.submit_all();
    let c = &a.coordinator;
    c.record_tiebreak_vote(a.ids[1], a.ids[0], VoteChoice::Yes)
        .unwrap();
    assert!(matches!(
        c.record_tiebreak_vote(a.ids[1], a.ids[0], VoteChoice::Yes),
        Err(SessionError::DuplicateAction { .. })
    ));

    let legacy = SessionConfig {
        dedupe_tiebreak_votes: false,
        ..Default::default()
    };
    let a = Assembly::with_config(&["alice", "bob"], legacy, None);
    a.submit_all();
    let c = &a.coordinator;
    c.record_tiebreak_vote(a.ids[1], a.ids[0], VoteChoice::Yes)
        .unwrap();
    c.record_tiebreak_vote(a.ids[1], a.ids[0], VoteChoice::Yes)
        .unwrap();
    let rows = c.final_results(&a.room).unwrap();
    let row = rows.iter().find(|r| r.proposer_id == a.ids[0]).unwrap();
    assert_eq!(row.yes, 2);
}

/// Test: tiebreak totals count every registered identity by default
#[test]
fn test_tiebreak_totals_use_global_count() {
    let a = Assembly::new(&["alice", "bob"]);
    a.credentials
        .register("observer", "secret", "Observer")
        .unwrap();
    let c = &a.coordinator;

    c.arrive_at_tiebreaker(a.ids[0]).unwrap();
    let status = c.arrive_at_tiebreaker(a.ids[1]).unwrap();
    assert_eq!((status.arrived, status.total), (2, 3));
    assert!(!status.all_arrived);

    c.agree_to_tiebreak(a.ids[0]).unwrap();
    assert_eq!(c.agreement_status(&a.room).unwrap().total, 3);
    c.reset_tiebreak_agreement(a.ids[1]).unwrap();
    assert_eq!(c.agreement_status(&a.room).unwrap().agreed, 0);
}

/// Test: with global totals, members spread over two rooms still get
/// through arrival, agreement, and completion
#[test]
fn test_global_tiebreak_across_two_rooms() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    let mut others = Vec::new();
    for name in ["carol", "dave"] {
        let id = a.credentials.register(name, "secret", "Delegate").unwrap().id;
        c.mark_present(id).unwrap();
        others.push(id);
    }
    let second = c.create_room(others[0], None, None).unwrap().room_code;
    c.join_room(others[1], second.as_str(), None).unwrap();
    let everyone: Vec<IdentityId> = a.ids.iter().chain(&others).copied().collect();

    for id in &everyone {
        c.arrive_at_tiebreaker(*id).unwrap();
    }
    for room in [&a.room, &second] {
        let status = c.arrival_status(room).unwrap();
        assert_eq!((status.arrived, status.total), (4, 4));
        assert!(status.all_arrived);
        assert_eq!(c.phase(room).unwrap(), RoundPhase::TiebreakAgreement);
    }

    for id in &everyone {
        c.agree_to_tiebreak(*id).unwrap();
    }
    for room in [&a.room, &second] {
        assert!(c.agreement_status(room).unwrap().all_agreed);
    }

    // one room finishing alone is not enough
    for id in &a.ids {
        c.mark_tiebreak_complete(*id).unwrap();
    }
    assert!(!c.tiebreak_status(&a.room).unwrap().all_complete);
    for id in &others {
        c.mark_tiebreak_complete(*id).unwrap();
    }
    for room in [&a.room, &second] {
        assert!(c.tiebreak_status(room).unwrap().all_complete);
        assert_eq!(c.phase(room).unwrap(), RoundPhase::TiebreakComplete);
    }
}

/// Test: rooms do not share readiness or submissions
#[test]
fn test_rooms_are_isolated() {
    let a = Assembly::new(&["alice", "bob"]);
    let c = &a.coordinator;
    let carol = a.credentials.register("carol", "secret", "Kenya").unwrap().id;
    c.mark_present(carol).unwrap();
    let other = c.create_room(carol, None, None).unwrap().room_code;

    c.mark_ready(carol).unwrap();
    c.submit_proposal(carol, "Trade", "Tariffs").unwrap();

    assert_eq!(c.ready_status(&a.room).unwrap().ready, 0);
    assert_eq!(c.submission_status(&a.room).unwrap().submitted, 0);
    assert!(c.ready_status(&other).unwrap().all_ready);
    assert!(c.proposals_to_vote_on(a.ids[0]).unwrap().is_empty());
}
