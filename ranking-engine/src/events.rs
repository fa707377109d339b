// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::time::Duration;

use core_types::{CandidateId, SessionId, VoteDirection};

/// Notifications for whoever renders a session's standings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingEvent {
    ReorderScheduled {
        session_id: SessionId,
        generation: u64,
        grace_period: Duration,
    },
    ReorderCommitted {
        session_id: SessionId,
        order: Vec<CandidateId>,
    },
    ReorderCancelled {
        session_id: SessionId,
    },
    MutationFailed {
        session_id: SessionId,
        candidate_id: CandidateId,
        direction: VoteDirection,
        reason: String,
    },
    RefreshFailed {
        session_id: SessionId,
        reason: String,
    },
}

impl RankingEvent {
    pub fn session_id(&self) -> SessionId {
        match self {
            RankingEvent::ReorderScheduled { session_id, .. }
            | RankingEvent::ReorderCommitted { session_id, .. }
            | RankingEvent::ReorderCancelled { session_id }
            | RankingEvent::MutationFailed { session_id, .. }
            | RankingEvent::RefreshFailed { session_id, .. } => *session_id,
        }
    }
}
