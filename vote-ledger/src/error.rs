// Copyright (c) James Kassemi, SC, US. All rights reserved.

use thiserror::Error;

use core_types::{CandidateId, SessionId, UserId};

use crate::memory::SessionLifecycle;

pub type Result<T> = std::result::Result<T, LedgerError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("session {session_id} does not exist")]
    UnknownSession { session_id: SessionId },
    #[error("candidate {candidate_id} is not nominated in session {session_id}")]
    UnknownCandidate {
        session_id: SessionId,
        candidate_id: CandidateId,
    },
    #[error("candidate {candidate_id} is already nominated in session {session_id}")]
    DuplicateCandidate {
        session_id: SessionId,
        candidate_id: CandidateId,
    },
    #[error("no votes remaining (budget of {max_votes_per_user} used)")]
    QuotaExceeded { max_votes_per_user: u32 },
    #[error("no vote on candidate {candidate_id} to retract")]
    NothingToRetract { candidate_id: CandidateId },
    #[error("candidate {candidate_id} has been blocked from voting")]
    CandidateBlocked { candidate_id: CandidateId },
    #[error("session {session_id} is {lifecycle:?}; voting is closed")]
    VotingClosed {
        session_id: SessionId,
        lifecycle: SessionLifecycle,
    },
    #[error("user {user_id} cannot manage session {session_id}")]
    NotPermitted {
        user_id: UserId,
        session_id: SessionId,
    },
    #[error("session {session_id} needs a positive vote budget")]
    InvalidBudget { session_id: SessionId },
    #[error("transport failure: {0}")]
    Transport(String),
}

impl LedgerError {
    pub fn is_transport(&self) -> bool {
        matches!(self, LedgerError::Transport(_))
    }
}
