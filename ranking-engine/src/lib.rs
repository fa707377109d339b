// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Vote aggregation and stabilized ranking.
//!
//! The crate exposes:
//! - [`sort_candidates`]: the deterministic standings order.
//! - [`RankingReconciler`]: merges snapshots and optimistic edits, holding back reorders
//!   for a grace period.
//! - [`SessionRanking`]: one session's reconciler wired to a [`vote_ledger::VoteLedger`],
//!   with the grace-period timer and background mutations.
//! - [`MultiSessionRankingRegistry`]: independent sessions addressed by id.

pub mod error;
pub mod events;
pub mod reconciler;
pub mod registry;
pub mod session;
pub mod sort;

pub use error::{RankingError, Result};
pub use events::RankingEvent;
pub use reconciler::{PendingReorder, RankingReconciler, Reconciliation, DEFAULT_GRACE_PERIOD};
pub use registry::MultiSessionRankingRegistry;
pub use session::{Countdown, MutationOutcome, MutationTicket, SessionRanking};
pub use sort::{order_diverges, sort_candidates};
