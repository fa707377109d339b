// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use core_types::{Candidate, CandidateId, VoteDirection};
use tokio::time::Instant;

use crate::sort::{order_diverges, sort_candidates};

pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// A held-back reorder. `generation` identifies the schedule so a stale timer
/// can tell it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingReorder {
    pub generation: u64,
    pub deadline: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reconciliation {
    /// View to show right now: the current order with fresh counts.
    pub displayed: Vec<Candidate>,
    pub order_changed: bool,
    /// Set when this call started (or restarted) the grace period.
    pub scheduled: Option<PendingReorder>,
    /// A pending reorder was dropped because the standings settled back into
    /// the displayed order.
    pub superseded: bool,
}

/// Merges authoritative snapshots and optimistic edits into the displayed
/// standings for one session.
///
/// The displayed order only moves in two places: immediately, when a snapshot
/// does not disturb it, and in [`RankingReconciler::commit_pending_order`] once
/// a grace period runs out. Counts are refreshed in place on every call.
#[derive(Debug)]
pub struct RankingReconciler {
    grace_period: Duration,
    displayed_order: Vec<CandidateId>,
    displayed: Vec<Candidate>,
    latest: Vec<Candidate>,
    winner_id: Option<CandidateId>,
    pending: Option<PendingReorder>,
    next_generation: u64,
}

impl Default for RankingReconciler {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}

impl RankingReconciler {
    pub fn new(grace_period: Duration) -> Self {
        Self {
            grace_period,
            displayed_order: Vec::new(),
            displayed: Vec::new(),
            latest: Vec::new(),
            winner_id: None,
            pending: None,
            next_generation: 0,
        }
    }

    pub fn grace_period(&self) -> Duration {
        self.grace_period
    }

    pub fn displayed(&self) -> &[Candidate] {
        &self.displayed
    }

    pub fn displayed_order(&self) -> &[CandidateId] {
        &self.displayed_order
    }

    pub fn latest_snapshot(&self) -> &[Candidate] {
        &self.latest
    }

    pub fn winner_id(&self) -> Option<CandidateId> {
        self.winner_id
    }

    pub fn candidate(&self, id: CandidateId) -> Option<&Candidate> {
        self.displayed
            .iter()
            .find(|c| c.id == id)
            .or_else(|| self.latest.iter().find(|c| c.id == id))
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn pending(&self) -> Option<PendingReorder> {
        self.pending
    }

    /// Whole seconds left on the grace period, rounded up.
    pub fn seconds_remaining(&self, now: Instant) -> Option<u64> {
        self.pending.map(|p| {
            let left = p.deadline.saturating_duration_since(now);
            let secs = left.as_secs();
            if left.subsec_nanos() > 0 {
                secs + 1
            } else {
                secs
            }
        })
    }

    pub fn reconcile(
        &mut self,
        candidates: Vec<Candidate>,
        winner_id: Option<CandidateId>,
        now: Instant,
    ) -> Reconciliation {
        let new_order = sort_candidates(&candidates, winner_id);
        let order_changed = order_diverges(&self.displayed_order, &new_order);
        let view = if self.displayed_order.is_empty() {
            arrange(&candidates, &new_order)
        } else {
            overlay(&self.displayed_order, &candidates, &new_order)
        };

        self.latest = candidates;
        self.winner_id = winner_id;
        self.displayed = view.clone();

        let mut superseded = false;
        let scheduled = if order_changed {
            self.displayed_order = view.iter().map(|c| c.id).collect();
            Some(self.restart_pending(now))
        } else {
            self.displayed_order = new_order;
            superseded = self.pending.take().is_some();
            None
        };

        Reconciliation {
            displayed: view,
            order_changed,
            scheduled,
            superseded,
        }
    }

    /// Applies a local vote ahead of server confirmation. Order is untouched.
    /// Returns the updated candidate, or `None` if the id is unknown.
    pub fn apply_optimistic_vote(
        &mut self,
        candidate_id: CandidateId,
        direction: VoteDirection,
    ) -> Option<Candidate> {
        let mut updated = None;
        for candidate in self
            .displayed
            .iter_mut()
            .chain(self.latest.iter_mut())
            .filter(|c| c.id == candidate_id)
        {
            candidate.apply_vote(direction);
            if updated.is_none() {
                updated = Some(candidate.clone());
            }
        }
        updated
    }

    /// Re-sorts the latest snapshot into the displayed order and clears any
    /// pending reorder.
    pub fn commit_pending_order(&mut self) -> Vec<CandidateId> {
        self.displayed_order = sort_candidates(&self.latest, self.winner_id);
        self.displayed = arrange(&self.latest, &self.displayed_order);
        self.pending = None;
        self.displayed_order.clone()
    }

    /// Commits only if `generation` is still the active schedule.
    pub fn commit_if_current(&mut self, generation: u64) -> Option<Vec<CandidateId>> {
        match self.pending {
            Some(p) if p.generation == generation => Some(self.commit_pending_order()),
            _ => None,
        }
    }

    /// Drops the pending reorder without applying it. The displayed order stays
    /// as it is until a later `reconcile` detects a change again.
    pub fn cancel_pending_reorder(&mut self) -> bool {
        self.pending.take().is_some()
    }

    fn restart_pending(&mut self, now: Instant) -> PendingReorder {
        self.next_generation += 1;
        let pending = PendingReorder {
            generation: self.next_generation,
            deadline: now + self.grace_period,
        };
        self.pending = Some(pending);
        pending
    }
}

fn arrange(candidates: &[Candidate], order: &[CandidateId]) -> Vec<Candidate> {
    let by_id: HashMap<CandidateId, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
    order
        .iter()
        .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
        .collect()
}

// Walks the current order with fresh data; ids that vanished are dropped and
// newcomers are appended in their sorted position order.
fn overlay(
    current: &[CandidateId],
    candidates: &[Candidate],
    new_order: &[CandidateId],
) -> Vec<Candidate> {
    let by_id: HashMap<CandidateId, &Candidate> = candidates.iter().map(|c| (c.id, c)).collect();
    let known: HashSet<CandidateId> = current.iter().copied().collect();
    current
        .iter()
        .chain(new_order.iter().filter(|id| !known.contains(id)))
        .filter_map(|id| by_id.get(id).map(|c| (*c).clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: CandidateId = 1;
    const B: CandidateId = 2;
    const C: CandidateId = 3;

    fn snapshot(votes: &[(CandidateId, u32)]) -> Vec<Candidate> {
        votes
            .iter()
            .map(|(id, v)| Candidate::new(*id, format!("film-{id}")).with_votes(*v, 0))
            .collect()
    }

    fn ids(view: &[Candidate]) -> Vec<CandidateId> {
        view.iter().map(|c| c.id).collect()
    }

    fn votes(view: &[Candidate]) -> Vec<u32> {
        view.iter().map(|c| c.vote_count).collect()
    }

    #[test]
    fn first_snapshot_is_committed_directly() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        let result = reconciler.reconcile(snapshot(&[(C, 0), (B, 1), (A, 2)]), None, now);
        assert!(!result.order_changed);
        assert_eq!(result.scheduled, None);
        assert_eq!(ids(&result.displayed), vec![A, B, C]);
        assert_eq!(reconciler.displayed_order(), &[A, B, C]);
    }

    #[test]
    fn tie_breaks_by_id_without_countdown() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 0)]), None, now);

        let result = reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 1)]), None, now);
        assert!(!result.order_changed);
        assert!(!reconciler.is_pending());
        assert_eq!(ids(&result.displayed), vec![A, B, C]);
        assert_eq!(votes(&result.displayed), vec![2, 1, 1]);
    }

    #[test]
    fn order_change_holds_old_positions_with_fresh_counts() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 1)]), None, now);

        let result = reconciler.reconcile(snapshot(&[(A, 2), (B, 3), (C, 1)]), None, now);
        assert!(result.order_changed);
        assert_eq!(ids(&result.displayed), vec![A, B, C]);
        assert_eq!(votes(&result.displayed), vec![2, 3, 1]);
        assert_eq!(reconciler.displayed_order(), &[A, B, C]);
        let pending = result.scheduled.unwrap();
        assert_eq!(pending.deadline, now + DEFAULT_GRACE_PERIOD);
        assert_eq!(reconciler.seconds_remaining(now), Some(5));

        assert_eq!(reconciler.commit_pending_order(), vec![B, A, C]);
        assert!(!reconciler.is_pending());
        assert_eq!(ids(reconciler.displayed()), vec![B, A, C]);
    }

    #[test]
    fn unchanged_snapshot_is_idempotent() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        let data = snapshot(&[(A, 4), (B, 2)]);
        reconciler.reconcile(data.clone(), None, now);
        let first = reconciler.reconcile(data.clone(), None, now);
        let second = reconciler.reconcile(data, None, now);
        assert!(!first.order_changed);
        assert!(!second.order_changed);
        assert_eq!(first.displayed, second.displayed);
    }

    #[test]
    fn restart_supersedes_previous_generation() {
        let mut reconciler = RankingReconciler::default();
        let t0 = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 0)]), None, t0);
        let first = reconciler
            .reconcile(snapshot(&[(A, 2), (B, 3), (C, 0)]), None, t0)
            .scheduled
            .unwrap();
        let t1 = t0 + Duration::from_secs(2);
        let second = reconciler
            .reconcile(snapshot(&[(A, 2), (B, 3), (C, 4)]), None, t1)
            .scheduled
            .unwrap();
        assert!(second.generation > first.generation);
        assert_eq!(second.deadline, t1 + DEFAULT_GRACE_PERIOD);

        assert_eq!(reconciler.commit_if_current(first.generation), None);
        assert!(reconciler.is_pending());
        assert_eq!(
            reconciler.commit_if_current(second.generation),
            Some(vec![C, B, A])
        );
        assert_eq!(reconciler.commit_if_current(second.generation), None);
    }

    #[test]
    fn commit_uses_latest_snapshot_not_the_scheduling_one() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1)]), None, now);
        reconciler.reconcile(snapshot(&[(A, 2), (B, 3)]), None, now);
        reconciler.reconcile(snapshot(&[(A, 2), (B, 6)]), None, now);
        assert!(reconciler.is_pending());
        assert_eq!(reconciler.commit_pending_order(), vec![B, A]);
        assert_eq!(votes(reconciler.displayed()), vec![6, 2]);
    }

    #[test]
    fn settling_back_drops_the_pending_reorder() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1)]), None, now);
        let pending = reconciler
            .reconcile(snapshot(&[(A, 2), (B, 3)]), None, now)
            .scheduled
            .unwrap();

        let result = reconciler.reconcile(snapshot(&[(A, 4), (B, 3)]), None, now);
        assert!(!result.order_changed);
        assert!(result.superseded);
        assert!(!reconciler.is_pending());
        assert_eq!(reconciler.seconds_remaining(now), None);
        assert_eq!(reconciler.commit_if_current(pending.generation), None);
        assert_eq!(reconciler.displayed_order(), &[A, B]);

        let again = reconciler.reconcile(snapshot(&[(A, 4), (B, 3)]), None, now);
        assert!(!again.superseded);
    }

    #[test]
    fn cancel_freezes_displayed_order() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 0)]), None, now);
        reconciler.reconcile(snapshot(&[(A, 2), (B, 3), (C, 0)]), None, now);
        let before = reconciler.displayed_order().to_vec();

        assert!(reconciler.cancel_pending_reorder());
        assert!(!reconciler.cancel_pending_reorder());
        assert_eq!(reconciler.displayed_order(), before.as_slice());
        assert_eq!(reconciler.seconds_remaining(now), None);

        let again = reconciler.reconcile(snapshot(&[(A, 2), (B, 3), (C, 0)]), None, now);
        assert!(again.order_changed);
        assert!(reconciler.is_pending());
    }

    #[test]
    fn winner_pin_triggers_reorder() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 3), (B, 2), (C, 1)]), None, now);
        let result = reconciler.reconcile(snapshot(&[(A, 3), (B, 2), (C, 1)]), Some(C), now);
        assert!(result.order_changed);
        assert_eq!(reconciler.commit_pending_order(), vec![C, A, B]);
    }

    #[test]
    fn optimistic_vote_updates_counts_in_place() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 0)]), None, now);

        let updated = reconciler.apply_optimistic_vote(C, VoteDirection::Up).unwrap();
        assert_eq!((updated.vote_count, updated.user_vote_count), (1, 1));
        assert!(updated.user_has_voted);
        for _ in 0..3 {
            reconciler.apply_optimistic_vote(C, VoteDirection::Up);
        }
        assert_eq!(reconciler.displayed_order(), &[A, B, C]);
        assert_eq!(ids(reconciler.displayed()), vec![A, B, C]);
        assert_eq!(reconciler.latest_snapshot()[2].vote_count, 4);

        reconciler.apply_optimistic_vote(B, VoteDirection::Down);
        let b = reconciler.apply_optimistic_vote(B, VoteDirection::Down).unwrap();
        assert_eq!((b.vote_count, b.user_vote_count), (0, 0));
        assert!(!b.user_has_voted);
        assert_eq!(reconciler.apply_optimistic_vote(99, VoteDirection::Up), None);
    }

    #[test]
    fn newcomers_are_appended_and_departures_dropped() {
        let mut reconciler = RankingReconciler::default();
        let now = Instant::now();
        reconciler.reconcile(snapshot(&[(A, 2), (B, 1)]), None, now);

        let result = reconciler.reconcile(snapshot(&[(A, 2), (B, 1), (C, 0)]), None, now);
        assert!(!result.order_changed);
        assert_eq!(ids(&result.displayed), vec![A, B, C]);

        let result = reconciler.reconcile(snapshot(&[(A, 2), (C, 0)]), None, now);
        assert!(result.order_changed);
        assert_eq!(ids(&result.displayed), vec![A, C]);
        assert_eq!(reconciler.displayed_order(), &[A, C]);
    }
}
