// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use core_types::status::{OverallStatus, ServiceStatusHandle};
use core_types::{Candidate, CandidateId, SessionId, SessionSnapshot, UserId};
use futures::future::join_all;
use parking_lot::RwLock;
use vote_ledger::VoteLedger;

use crate::error::{RankingError, Result};
use crate::reconciler::Reconciliation;
use crate::session::{MutationTicket, SessionRanking};

/// Independent [`SessionRanking`]s keyed by session, e.g. a dashboard showing
/// several nights at once. Nothing is shared between keys.
pub struct MultiSessionRankingRegistry {
    user_id: UserId,
    ledger: Arc<dyn VoteLedger>,
    grace_period: Duration,
    sessions: RwLock<BTreeMap<SessionId, SessionRanking>>,
}

impl MultiSessionRankingRegistry {
    pub fn new(user_id: UserId, ledger: Arc<dyn VoteLedger>, grace_period: Duration) -> Self {
        Self {
            user_id,
            ledger,
            grace_period,
            sessions: RwLock::new(BTreeMap::new()),
        }
    }

    /// Returns the session for `session_id`, creating an empty one if needed.
    pub fn track(&self, session_id: SessionId) -> SessionRanking {
        if let Some(existing) = self.sessions.read().get(&session_id) {
            return existing.clone();
        }
        self.sessions
            .write()
            .entry(session_id)
            .or_insert_with(|| {
                SessionRanking::new(
                    session_id,
                    self.user_id,
                    Arc::clone(&self.ledger),
                    self.grace_period,
                )
            })
            .clone()
    }

    pub fn initialize(&self, snapshot: SessionSnapshot) -> Reconciliation {
        self.track(snapshot.session_id).initialize(snapshot)
    }

    pub fn session(&self, session_id: SessionId) -> Option<SessionRanking> {
        self.sessions.read().get(&session_id).cloned()
    }

    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.read().keys().copied().collect()
    }

    /// Stops tracking a session and drops its pending reorder.
    pub fn remove(&self, session_id: SessionId) -> Option<SessionRanking> {
        let removed = self.sessions.write().remove(&session_id);
        if let Some(session) = &removed {
            session.cancel_pending_reorder();
        }
        removed
    }

    pub async fn refresh(&self, session_id: SessionId) -> Result<Reconciliation> {
        self.require(session_id)?.refresh().await
    }

    pub async fn refresh_all(&self) -> Vec<(SessionId, Result<Reconciliation>)> {
        let sessions: Vec<SessionRanking> = self.sessions.read().values().cloned().collect();
        join_all(sessions.into_iter().map(|session| async move {
            let result = session.refresh().await;
            (session.session_id(), result)
        }))
        .await
    }

    pub fn vote(&self, session_id: SessionId, candidate_id: CandidateId) -> Result<MutationTicket> {
        self.require(session_id)?.vote(candidate_id)
    }

    pub fn unvote(&self, session_id: SessionId, candidate_id: CandidateId) -> Result<MutationTicket> {
        self.require(session_id)?.unvote(candidate_id)
    }

    pub fn cancel_pending_reorder(&self, session_id: SessionId) -> Result<bool> {
        Ok(self.require(session_id)?.cancel_pending_reorder())
    }

    /// Returns how many sessions actually had a reorder pending.
    pub fn cancel_all_pending_reorders(&self) -> usize {
        let sessions: Vec<SessionRanking> = self.sessions.read().values().cloned().collect();
        sessions
            .iter()
            .filter(|session| session.cancel_pending_reorder())
            .count()
    }

    pub fn sorted_candidates(&self, session_id: SessionId) -> Result<Vec<Candidate>> {
        Ok(self.require(session_id)?.sorted_candidates())
    }

    pub fn user_remaining_votes(&self, session_id: SessionId) -> Result<u32> {
        Ok(self.require(session_id)?.user_remaining_votes())
    }

    pub fn max_votes_per_user(&self, session_id: SessionId) -> Result<u32> {
        Ok(self.require(session_id)?.max_votes_per_user())
    }

    pub fn publish_status(&self, status: &ServiceStatusHandle) {
        let sessions: Vec<SessionRanking> = self.sessions.read().values().cloned().collect();
        let gauges = sessions
            .iter()
            .flat_map(|session| session.status_gauges())
            .collect();
        status.set_gauges(gauges);
        status.set_overall(if sessions.is_empty() {
            OverallStatus::Warn
        } else {
            OverallStatus::Ok
        });
    }

    fn require(&self, session_id: SessionId) -> Result<SessionRanking> {
        self.session(session_id)
            .ok_or(RankingError::UnknownSession { session_id })
    }
}
