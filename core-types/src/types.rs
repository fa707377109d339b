// Copyright (c) James Kassemi, SC, US. All rights reserved.

use serde::{Deserialize, Serialize};

pub type CandidateId = u64;
pub type SessionId = u64;
pub type UserId = u64;

/// Direction of a single-unit vote mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteDirection {
    Up,
    Down,
}

impl VoteDirection {
    pub fn delta(self) -> i32 {
        match self {
            VoteDirection::Up => 1,
            VoteDirection::Down => -1,
        }
    }
}

/// One nomination in a voting session, as seen by a particular caller.
///
/// Title, year, poster and media type are display metadata only; ranking never
/// inspects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub id: CandidateId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub year: Option<u16>,
    #[serde(default)]
    pub poster_url: Option<String>,
    pub vote_count: u32,
    pub user_vote_count: u32,
    pub user_has_voted: bool,
    #[serde(default)]
    pub is_blocked: bool,
    #[serde(default)]
    pub media_type: Option<String>,
}

impl Candidate {
    pub fn new(id: CandidateId, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            year: None,
            poster_url: None,
            vote_count: 0,
            user_vote_count: 0,
            user_has_voted: false,
            is_blocked: false,
            media_type: None,
        }
    }

    pub fn with_votes(mut self, vote_count: u32, user_vote_count: u32) -> Self {
        self.vote_count = vote_count;
        self.user_vote_count = user_vote_count;
        self.user_has_voted = user_vote_count > 0;
        self
    }

    /// Applies a one-unit change to both the aggregate tally and the caller's
    /// allocation. Decrements clamp at zero.
    pub fn apply_vote(&mut self, direction: VoteDirection) {
        let delta = direction.delta();
        self.vote_count = self.vote_count.saturating_add_signed(delta);
        self.user_vote_count = self.user_vote_count.saturating_add_signed(delta);
        self.user_has_voted = self.user_vote_count > 0;
    }
}

fn default_can_vote() -> bool {
    true
}

/// Authoritative view of one session for one caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub candidates: Vec<Candidate>,
    pub user_remaining_votes: u32,
    pub max_votes_per_user: u32,
    #[serde(default)]
    pub winner_id: Option<CandidateId>,
    #[serde(default = "default_can_vote")]
    pub can_vote: bool,
}

impl SessionSnapshot {
    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.candidates.iter().find(|c| c.id == id)
    }

    pub fn user_votes_used(&self) -> u32 {
        self.candidates.iter().map(|c| c.user_vote_count).sum()
    }
}
