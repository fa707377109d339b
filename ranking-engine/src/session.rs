// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::{Arc, Weak};
use std::time::Duration;

use core_types::status::StatusGauge;
use core_types::{Candidate, CandidateId, SessionId, SessionSnapshot, UserId, VoteDirection};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use vote_ledger::VoteLedger;

use crate::error::{RankingError, Result};
use crate::events::RankingEvent;
use crate::reconciler::{PendingReorder, RankingReconciler, Reconciliation};

const EVENT_CAPACITY: usize = 64;

/// What the UI needs to draw the reorder countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Countdown {
    pub pending: bool,
    pub seconds_remaining: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Confirmed,
    /// The ledger rejected the mutation; a corrective refresh has already run.
    Reverted { reason: String },
}

/// Background send of one optimistic vote or retraction.
pub struct MutationTicket {
    candidate_id: CandidateId,
    direction: VoteDirection,
    handle: JoinHandle<MutationOutcome>,
}

impl MutationTicket {
    pub fn candidate_id(&self) -> CandidateId {
        self.candidate_id
    }

    pub fn direction(&self) -> VoteDirection {
        self.direction
    }

    /// Waits for the request and, on failure, the corrective refresh.
    pub async fn settled(self) -> MutationOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => MutationOutcome::Reverted {
                reason: format!("mutation task ended early: {err}"),
            },
        }
    }
}

struct SessionState {
    reconciler: RankingReconciler,
    user_remaining_votes: u32,
    max_votes_per_user: u32,
    can_vote: bool,
    reorder_timer: Option<JoinHandle<()>>,
}

impl SessionState {
    fn check_mutation(
        &self,
        session_id: SessionId,
        candidate_id: CandidateId,
        direction: VoteDirection,
    ) -> Result<()> {
        if !self.can_vote {
            return Err(RankingError::VotingClosed { session_id });
        }
        let candidate =
            self.reconciler
                .candidate(candidate_id)
                .ok_or(RankingError::UnknownCandidate {
                    session_id,
                    candidate_id,
                })?;
        match direction {
            VoteDirection::Up => {
                if candidate.is_blocked {
                    return Err(RankingError::CandidateBlocked { candidate_id });
                }
                if self.user_remaining_votes == 0 {
                    return Err(RankingError::QuotaExceeded {
                        max_votes_per_user: self.max_votes_per_user,
                    });
                }
            }
            VoteDirection::Down => {
                if candidate.user_vote_count == 0 {
                    return Err(RankingError::NothingToRetract { candidate_id });
                }
            }
        }
        Ok(())
    }

    fn abort_timer(&mut self) {
        if let Some(timer) = self.reorder_timer.take() {
            timer.abort();
        }
    }
}

struct Shared {
    session_id: SessionId,
    user_id: UserId,
    ledger: Arc<dyn VoteLedger>,
    state: Mutex<SessionState>,
    events: broadcast::Sender<RankingEvent>,
}

impl Shared {
    fn emit(&self, event: RankingEvent) {
        let _ = self.events.send(event);
    }

    fn fire_reorder(&self, generation: u64) {
        let committed = {
            let mut state = self.state.lock();
            let committed = state.reconciler.commit_if_current(generation);
            if committed.is_some() {
                state.reorder_timer = None;
            }
            committed
        };
        if let Some(order) = committed {
            info!(
                "session {} standings reordered to {:?}",
                self.session_id, order
            );
            self.emit(RankingEvent::ReorderCommitted {
                session_id: self.session_id,
                order,
            });
        }
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        self.state.get_mut().abort_timer();
    }
}

/// Client-side standings for one session: the reconciler plus the caller's
/// vote budget, the grace-period timer, and background mutations.
///
/// Methods that may schedule a reorder spawn onto the current tokio runtime.
#[derive(Clone)]
pub struct SessionRanking {
    shared: Arc<Shared>,
}

impl SessionRanking {
    pub fn new(
        session_id: SessionId,
        user_id: UserId,
        ledger: Arc<dyn VoteLedger>,
        grace_period: Duration,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                session_id,
                user_id,
                ledger,
                state: Mutex::new(SessionState {
                    reconciler: RankingReconciler::new(grace_period),
                    user_remaining_votes: 0,
                    max_votes_per_user: 0,
                    can_vote: false,
                    reorder_timer: None,
                }),
                events,
            }),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.shared.session_id
    }

    pub fn user_id(&self) -> UserId {
        self.shared.user_id
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RankingEvent> {
        self.shared.events.subscribe()
    }

    /// Seeds the session from a snapshot the caller already holds.
    pub fn initialize(&self, snapshot: SessionSnapshot) -> Reconciliation {
        self.apply_snapshot(snapshot)
    }

    /// Merges an authoritative snapshot, starting or restarting the grace
    /// period if the order would change.
    pub fn apply_snapshot(&self, snapshot: SessionSnapshot) -> Reconciliation {
        let mut state = self.shared.state.lock();
        state.user_remaining_votes = snapshot.user_remaining_votes;
        state.max_votes_per_user = snapshot.max_votes_per_user;
        state.can_vote = snapshot.can_vote;
        let result =
            state
                .reconciler
                .reconcile(snapshot.candidates, snapshot.winner_id, Instant::now());
        if let Some(pending) = result.scheduled {
            self.install_timer(&mut state, pending);
        } else if result.superseded {
            state.abort_timer();
        }
        drop(state);
        if result.superseded {
            debug!(
                "session {} standings settled back, reorder dropped",
                self.shared.session_id
            );
            self.shared.emit(RankingEvent::ReorderCancelled {
                session_id: self.shared.session_id,
            });
        }
        if let Some(pending) = result.scheduled {
            debug!(
                "session {} reorder held back (generation {})",
                self.shared.session_id, pending.generation
            );
            self.shared.emit(RankingEvent::ReorderScheduled {
                session_id: self.shared.session_id,
                generation: pending.generation,
                grace_period: self.grace_period(),
            });
        }
        result
    }

    pub async fn refresh(&self) -> Result<Reconciliation> {
        match self
            .shared
            .ledger
            .snapshot(self.shared.session_id, self.shared.user_id)
            .await
        {
            Ok(snapshot) => Ok(self.apply_snapshot(snapshot)),
            Err(err) => {
                warn!(
                    "session {} refresh failed: {}",
                    self.shared.session_id, err
                );
                self.shared.emit(RankingEvent::RefreshFailed {
                    session_id: self.shared.session_id,
                    reason: err.to_string(),
                });
                Err(err.into())
            }
        }
    }

    pub fn vote(&self, candidate_id: CandidateId) -> Result<MutationTicket> {
        self.mutate(candidate_id, VoteDirection::Up)
    }

    pub fn unvote(&self, candidate_id: CandidateId) -> Result<MutationTicket> {
        self.mutate(candidate_id, VoteDirection::Down)
    }

    /// Pins or clears the winner on the ledger, then refreshes.
    pub async fn decide(&self, candidate_id: Option<CandidateId>) -> Result<Reconciliation> {
        self.shared
            .ledger
            .decide_winner(self.shared.session_id, candidate_id, self.shared.user_id)
            .await?;
        self.refresh().await
    }

    /// Drops the pending reorder and leaves the displayed order as it is.
    pub fn cancel_pending_reorder(&self) -> bool {
        let cancelled = {
            let mut state = self.shared.state.lock();
            state.abort_timer();
            state.reconciler.cancel_pending_reorder()
        };
        if cancelled {
            debug!("session {} reorder cancelled", self.shared.session_id);
            self.shared.emit(RankingEvent::ReorderCancelled {
                session_id: self.shared.session_id,
            });
        }
        cancelled
    }

    pub fn sorted_candidates(&self) -> Vec<Candidate> {
        self.shared.state.lock().reconciler.displayed().to_vec()
    }

    pub fn displayed_order(&self) -> Vec<CandidateId> {
        self.shared.state.lock().reconciler.displayed_order().to_vec()
    }

    pub fn user_remaining_votes(&self) -> u32 {
        self.shared.state.lock().user_remaining_votes
    }

    pub fn max_votes_per_user(&self) -> u32 {
        self.shared.state.lock().max_votes_per_user
    }

    pub fn can_vote(&self) -> bool {
        self.shared.state.lock().can_vote
    }

    pub fn winner_id(&self) -> Option<CandidateId> {
        self.shared.state.lock().reconciler.winner_id()
    }

    pub fn is_pending(&self) -> bool {
        self.shared.state.lock().reconciler.is_pending()
    }

    pub fn grace_period(&self) -> Duration {
        self.shared.state.lock().reconciler.grace_period()
    }

    pub fn countdown(&self) -> Countdown {
        let state = self.shared.state.lock();
        Countdown {
            pending: state.reconciler.is_pending(),
            seconds_remaining: state.reconciler.seconds_remaining(Instant::now()),
        }
    }

    pub fn status_gauges(&self) -> Vec<StatusGauge> {
        let state = self.shared.state.lock();
        let prefix = format!("session_{}", self.shared.session_id);
        vec![
            StatusGauge::new(
                format!("{prefix}_remaining_votes"),
                f64::from(state.user_remaining_votes),
            )
            .with_max(f64::from(state.max_votes_per_user))
            .with_unit("votes"),
            StatusGauge::new(
                format!("{prefix}_pending_reorder"),
                if state.reconciler.is_pending() { 1.0 } else { 0.0 },
            ),
        ]
    }

    /// Polls the ledger every `interval` until `cancel` fires.
    pub fn spawn_refresh_loop(
        &self,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        // Failures are already logged and broadcast by refresh().
                        let _ = session.refresh().await;
                    }
                }
            }
            debug!("session {} refresh loop stopped", session.session_id());
        })
    }

    fn mutate(&self, candidate_id: CandidateId, direction: VoteDirection) -> Result<MutationTicket> {
        {
            let mut state = self.shared.state.lock();
            state.check_mutation(self.shared.session_id, candidate_id, direction)?;
            state.reconciler.apply_optimistic_vote(candidate_id, direction);
            state.user_remaining_votes = match direction {
                VoteDirection::Up => state.user_remaining_votes.saturating_sub(1),
                VoteDirection::Down => state
                    .user_remaining_votes
                    .saturating_add(1)
                    .min(state.max_votes_per_user),
            };
        }
        let session = self.clone();
        let handle =
            tokio::spawn(async move { session.send_mutation(candidate_id, direction).await });
        Ok(MutationTicket {
            candidate_id,
            direction,
            handle,
        })
    }

    async fn send_mutation(
        &self,
        candidate_id: CandidateId,
        direction: VoteDirection,
    ) -> MutationOutcome {
        let shared = &self.shared;
        let result = match direction {
            VoteDirection::Up => {
                shared
                    .ledger
                    .cast_vote(shared.session_id, candidate_id, shared.user_id)
                    .await
            }
            VoteDirection::Down => {
                shared
                    .ledger
                    .retract_vote(shared.session_id, candidate_id, shared.user_id)
                    .await
            }
        };
        match result {
            Ok(()) => MutationOutcome::Confirmed,
            Err(err) => {
                error!(
                    "session {} {:?} on candidate {} failed: {}",
                    shared.session_id, direction, candidate_id, err
                );
                shared.emit(RankingEvent::MutationFailed {
                    session_id: shared.session_id,
                    candidate_id,
                    direction,
                    reason: err.to_string(),
                });
                if let Err(refresh_err) = self.refresh().await {
                    warn!(
                        "session {} corrective refresh failed: {}",
                        shared.session_id, refresh_err
                    );
                }
                MutationOutcome::Reverted {
                    reason: err.to_string(),
                }
            }
        }
    }

    fn install_timer(&self, state: &mut SessionState, pending: PendingReorder) {
        state.abort_timer();
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        state.reorder_timer = Some(tokio::spawn(async move {
            tokio::time::sleep_until(pending.deadline).await;
            if let Some(shared) = weak.upgrade() {
                shared.fire_reorder(pending.generation);
            }
        }));
    }
}
