// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::sync::Arc;

use core_types::Candidate;
use vote_ledger::{LedgerError, MemoryVoteLedger, VoteLedger};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_votes_never_overdraw_budget() {
    let ledger = Arc::new(MemoryVoteLedger::new());
    ledger.open_session(1, 3, [99]).unwrap();
    for id in 1..=4 {
        ledger.nominate(1, &Candidate::new(id, format!("film-{id}"))).unwrap();
    }

    let mut tasks = Vec::new();
    for attempt in 0..16u64 {
        let ledger = Arc::clone(&ledger);
        tasks.push(tokio::spawn(async move {
            ledger.cast_vote(1, attempt % 4 + 1, 7).await
        }));
    }

    let mut accepted = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => accepted += 1,
            Err(LedgerError::QuotaExceeded { max_votes_per_user }) => {
                assert_eq!(max_votes_per_user, 3)
            }
            Err(other) => panic!("unexpected error {other:?}"),
        }
    }
    assert_eq!(accepted, 3);

    let snapshot = ledger.snapshot(1, 7).await.unwrap();
    assert_eq!(snapshot.user_votes_used(), 3);
    assert_eq!(snapshot.user_remaining_votes, 0);
    let total: u32 = snapshot.candidates.iter().map(|c| c.vote_count).sum();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn cancelled_session_still_renders_snapshot() {
    let ledger = MemoryVoteLedger::new();
    ledger.open_session(2, 2, [1]).unwrap();
    ledger.nominate(2, &Candidate::new(5, "Ran")).unwrap();
    ledger.cast_vote(2, 5, 1).await.unwrap();
    ledger.cancel(2).unwrap();

    let err = ledger.cast_vote(2, 5, 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::VotingClosed { .. }));
    let err = ledger.retract_vote(2, 5, 1).await.unwrap_err();
    assert!(matches!(err, LedgerError::VotingClosed { .. }));

    let snapshot = ledger.snapshot(2, 1).await.unwrap();
    assert!(!snapshot.can_vote);
    assert_eq!(snapshot.candidate(5).unwrap().vote_count, 1);
}
