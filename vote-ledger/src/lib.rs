// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Vote ledger contract consumed by the ranking engine.
//!
//! The crate exposes:
//! - [`VoteLedger`]: the authoritative store's operations (snapshot, cast, retract, decide).
//! - [`MemoryVoteLedger`]: an in-process implementation that enforces the per-user vote budget.
//! - [`LedgerError`]: quota, retraction, lifecycle and transport failures.

pub mod error;
pub mod memory;

pub use error::{LedgerError, Result};
pub use memory::{MemoryVoteLedger, SessionLifecycle};

use core_types::{CandidateId, SessionId, SessionSnapshot, UserId};

/// Operations the authoritative store offers. Mutations apply immediately; any
/// display smoothing happens on the consuming side.
#[async_trait::async_trait]
pub trait VoteLedger: Send + Sync {
    async fn snapshot(&self, session_id: SessionId, caller: UserId) -> Result<SessionSnapshot>;

    /// Adds one unit of the caller's budget to `candidate_id`. Also records the
    /// caller as attending the session.
    async fn cast_vote(
        &self,
        session_id: SessionId,
        candidate_id: CandidateId,
        caller: UserId,
    ) -> Result<()>;

    async fn retract_vote(
        &self,
        session_id: SessionId,
        candidate_id: CandidateId,
        caller: UserId,
    ) -> Result<()>;

    /// Pins (`Some`) or clears (`None`) the winner. Requires management rights.
    async fn decide_winner(
        &self,
        session_id: SessionId,
        candidate_id: Option<CandidateId>,
        caller: UserId,
    ) -> Result<()>;
}
