// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::cmp::Ordering;

use core_types::{Candidate, CandidateId};

/// Total order used for standings: the pinned winner first, then tally
/// descending, then id ascending.
pub fn sort_candidates(candidates: &[Candidate], winner_id: Option<CandidateId>) -> Vec<CandidateId> {
    let mut ordered: Vec<&Candidate> = candidates.iter().collect();
    ordered.sort_by(|a, b| rank_cmp(a, b, winner_id));
    ordered.into_iter().map(|c| c.id).collect()
}

fn rank_cmp(a: &Candidate, b: &Candidate, winner_id: Option<CandidateId>) -> Ordering {
    let a_wins = winner_id == Some(a.id);
    let b_wins = winner_id == Some(b.id);
    b_wins
        .cmp(&a_wins)
        .then_with(|| b.vote_count.cmp(&a.vote_count))
        .then_with(|| a.id.cmp(&b.id))
}

/// Compares two orders position by position over their common prefix.
pub fn order_diverges(current: &[CandidateId], next: &[CandidateId]) -> bool {
    current.iter().zip(next.iter()).any(|(a, b)| a != b)
}
