// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use core_types::{Candidate, CandidateId, SessionId, SessionSnapshot, UserId};
use log::{debug, info};
use parking_lot::RwLock;

use crate::error::{LedgerError, Result};
use crate::VoteLedger;

/// Whether a session still accepts votes and winner decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionLifecycle {
    Open,
    Archived,
    Cancelled,
}

/// Display metadata plus the aggregate tally for one nomination.
#[derive(Debug, Clone)]
struct Nomination {
    id: CandidateId,
    title: String,
    year: Option<u16>,
    poster_url: Option<String>,
    media_type: Option<String>,
    vote_count: u32,
    is_blocked: bool,
}

struct SessionRecord {
    max_votes_per_user: u32,
    managers: HashSet<UserId>,
    lifecycle: SessionLifecycle,
    winner_id: Option<CandidateId>,
    nominations: BTreeMap<CandidateId, Nomination>,
    allocations: HashMap<(UserId, CandidateId), u32>,
    attendees: BTreeSet<UserId>,
}

impl SessionRecord {
    fn votes_used(&self, user: UserId) -> u32 {
        self.allocations
            .iter()
            .filter(|((u, _), _)| *u == user)
            .map(|(_, count)| *count)
            .sum()
    }

    fn ensure_open(&self, session_id: SessionId) -> Result<()> {
        match self.lifecycle {
            SessionLifecycle::Open => Ok(()),
            lifecycle => Err(LedgerError::VotingClosed {
                session_id,
                lifecycle,
            }),
        }
    }

    fn nomination_mut(
        &mut self,
        session_id: SessionId,
        candidate_id: CandidateId,
    ) -> Result<&mut Nomination> {
        self.nominations
            .get_mut(&candidate_id)
            .ok_or(LedgerError::UnknownCandidate {
                session_id,
                candidate_id,
            })
    }
}

/// In-process authoritative store.
///
/// All checks and mutations for a call happen under one write lock, so the
/// per-user budget can never be overdrawn by concurrent callers.
pub struct MemoryVoteLedger {
    sessions: RwLock<HashMap<SessionId, SessionRecord>>,
    injected_failures: AtomicUsize,
}

impl Default for MemoryVoteLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryVoteLedger {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            injected_failures: AtomicUsize::new(0),
        }
    }

    pub fn open_session(
        &self,
        session_id: SessionId,
        max_votes_per_user: u32,
        managers: impl IntoIterator<Item = UserId>,
    ) -> Result<()> {
        if max_votes_per_user == 0 {
            return Err(LedgerError::InvalidBudget { session_id });
        }
        let record = SessionRecord {
            max_votes_per_user,
            managers: managers.into_iter().collect(),
            lifecycle: SessionLifecycle::Open,
            winner_id: None,
            nominations: BTreeMap::new(),
            allocations: HashMap::new(),
            attendees: BTreeSet::new(),
        };
        self.sessions.write().insert(session_id, record);
        info!("opened session {session_id} with budget {max_votes_per_user}");
        Ok(())
    }

    /// Adds a nomination. Only the display fields of `candidate` are kept;
    /// tallies always start at zero.
    pub fn nominate(&self, session_id: SessionId, candidate: &Candidate) -> Result<()> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(LedgerError::UnknownSession { session_id })?;
        session.ensure_open(session_id)?;
        if session.nominations.contains_key(&candidate.id) {
            return Err(LedgerError::DuplicateCandidate {
                session_id,
                candidate_id: candidate.id,
            });
        }
        session.nominations.insert(
            candidate.id,
            Nomination {
                id: candidate.id,
                title: candidate.title.clone(),
                year: candidate.year,
                poster_url: candidate.poster_url.clone(),
                media_type: candidate.media_type.clone(),
                vote_count: 0,
                is_blocked: false,
            },
        );
        Ok(())
    }

    /// Vetoes a nomination. Existing votes stay; no new votes are accepted.
    pub fn block_candidate(&self, session_id: SessionId, candidate_id: CandidateId) -> Result<()> {
        self.with_session(session_id, |session| {
            session.nomination_mut(session_id, candidate_id)?.is_blocked = true;
            Ok(())
        })
    }

    pub fn archive(&self, session_id: SessionId) -> Result<()> {
        self.set_lifecycle(session_id, SessionLifecycle::Archived)
    }

    pub fn cancel(&self, session_id: SessionId) -> Result<()> {
        self.set_lifecycle(session_id, SessionLifecycle::Cancelled)
    }

    pub fn attendees(&self, session_id: SessionId) -> Result<Vec<UserId>> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&session_id)
            .ok_or(LedgerError::UnknownSession { session_id })?;
        Ok(session.attendees.iter().copied().collect())
    }

    /// Makes the next `count` trait calls fail with [`LedgerError::Transport`].
    pub fn fail_next(&self, count: usize) {
        self.injected_failures.store(count, Ordering::SeqCst);
    }

    fn take_injected_failure(&self) -> Result<()> {
        let consumed = self
            .injected_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if consumed {
            Err(LedgerError::Transport("injected failure".to_string()))
        } else {
            Ok(())
        }
    }

    fn set_lifecycle(&self, session_id: SessionId, lifecycle: SessionLifecycle) -> Result<()> {
        self.with_session(session_id, |session| {
            session.lifecycle = lifecycle;
            Ok(())
        })?;
        info!("session {session_id} moved to {lifecycle:?}");
        Ok(())
    }

    fn with_session<T>(
        &self,
        session_id: SessionId,
        op: impl FnOnce(&mut SessionRecord) -> Result<T>,
    ) -> Result<T> {
        let mut sessions = self.sessions.write();
        let session = sessions
            .get_mut(&session_id)
            .ok_or(LedgerError::UnknownSession { session_id })?;
        op(session)
    }

    fn build_snapshot(&self, session_id: SessionId, caller: UserId) -> Result<SessionSnapshot> {
        let sessions = self.sessions.read();
        let session = sessions
            .get(&session_id)
            .ok_or(LedgerError::UnknownSession { session_id })?;
        let candidates = session
            .nominations
            .values()
            .map(|n| {
                let user_vote_count = session
                    .allocations
                    .get(&(caller, n.id))
                    .copied()
                    .unwrap_or(0);
                Candidate {
                    id: n.id,
                    title: n.title.clone(),
                    year: n.year,
                    poster_url: n.poster_url.clone(),
                    vote_count: n.vote_count,
                    user_vote_count,
                    user_has_voted: user_vote_count > 0,
                    is_blocked: n.is_blocked,
                    media_type: n.media_type.clone(),
                }
            })
            .collect();
        let used = session.votes_used(caller);
        Ok(SessionSnapshot {
            session_id,
            candidates,
            user_remaining_votes: session.max_votes_per_user.saturating_sub(used),
            max_votes_per_user: session.max_votes_per_user,
            winner_id: session.winner_id,
            can_vote: session.lifecycle == SessionLifecycle::Open,
        })
    }
}

#[async_trait::async_trait]
impl VoteLedger for MemoryVoteLedger {
    async fn snapshot(&self, session_id: SessionId, caller: UserId) -> Result<SessionSnapshot> {
        self.take_injected_failure()?;
        self.build_snapshot(session_id, caller)
    }

    async fn cast_vote(
        &self,
        session_id: SessionId,
        candidate_id: CandidateId,
        caller: UserId,
    ) -> Result<()> {
        self.take_injected_failure()?;
        self.with_session(session_id, |session| {
            session.ensure_open(session_id)?;
            let used = session.votes_used(caller);
            let max_votes_per_user = session.max_votes_per_user;
            let nomination = session.nomination_mut(session_id, candidate_id)?;
            if nomination.is_blocked {
                return Err(LedgerError::CandidateBlocked { candidate_id });
            }
            if used >= max_votes_per_user {
                return Err(LedgerError::QuotaExceeded { max_votes_per_user });
            }
            nomination.vote_count = nomination.vote_count.saturating_add(1);
            *session.allocations.entry((caller, candidate_id)).or_insert(0) += 1;
            session.attendees.insert(caller);
            debug!("user {caller} voted for {candidate_id} in session {session_id}");
            Ok(())
        })
    }

    async fn retract_vote(
        &self,
        session_id: SessionId,
        candidate_id: CandidateId,
        caller: UserId,
    ) -> Result<()> {
        self.take_injected_failure()?;
        self.with_session(session_id, |session| {
            session.ensure_open(session_id)?;
            session.nomination_mut(session_id, candidate_id)?;
            let key = (caller, candidate_id);
            let allocated = session.allocations.get(&key).copied().unwrap_or(0);
            if allocated == 0 {
                return Err(LedgerError::NothingToRetract { candidate_id });
            }
            if allocated == 1 {
                session.allocations.remove(&key);
            } else {
                session.allocations.insert(key, allocated - 1);
            }
            let nomination = session.nomination_mut(session_id, candidate_id)?;
            nomination.vote_count = nomination.vote_count.saturating_sub(1);
            debug!("user {caller} retracted a vote for {candidate_id} in session {session_id}");
            Ok(())
        })
    }

    async fn decide_winner(
        &self,
        session_id: SessionId,
        candidate_id: Option<CandidateId>,
        caller: UserId,
    ) -> Result<()> {
        self.take_injected_failure()?;
        self.with_session(session_id, |session| {
            if !session.managers.contains(&caller) {
                return Err(LedgerError::NotPermitted {
                    user_id: caller,
                    session_id,
                });
            }
            session.ensure_open(session_id)?;
            if let Some(id) = candidate_id {
                session.nomination_mut(session_id, id)?;
            }
            session.winner_id = candidate_id;
            Ok(())
        })?;
        match candidate_id {
            Some(id) => info!("session {session_id} decided on candidate {id}"),
            None => info!("session {session_id} winner cleared"),
        }
        Ok(())
    }
}
