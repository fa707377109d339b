// Copyright (c) James Kassemi, SC, US. All rights reserved.

use thiserror::Error;

use core_types::{CandidateId, SessionId};
use vote_ledger::LedgerError;

pub type Result<T> = std::result::Result<T, RankingError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RankingError {
    #[error("session {session_id} is not tracked")]
    UnknownSession { session_id: SessionId },
    #[error("candidate {candidate_id} is not in session {session_id}")]
    UnknownCandidate {
        session_id: SessionId,
        candidate_id: CandidateId,
    },
    #[error("no votes remaining (budget of {max_votes_per_user} used)")]
    QuotaExceeded { max_votes_per_user: u32 },
    #[error("no vote on candidate {candidate_id} to retract")]
    NothingToRetract { candidate_id: CandidateId },
    #[error("candidate {candidate_id} has been blocked from voting")]
    CandidateBlocked { candidate_id: CandidateId },
    #[error("voting is closed for session {session_id}")]
    VotingClosed { session_id: SessionId },
    #[error("ledger request failed: {0}")]
    Ledger(#[from] LedgerError),
}

impl RankingError {
    /// True for transport-level failures that warrant a transient notification.
    pub fn is_network(&self) -> bool {
        matches!(self, RankingError::Ledger(err) if err.is_transport())
    }
}
