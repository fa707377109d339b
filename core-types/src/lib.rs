// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Shared identifiers, vote snapshots, configuration, and status handles for the
//! movie-night voting workspace.

pub mod config;
pub mod status;
pub mod types;

pub use config::AppConfig;
pub use types::{Candidate, CandidateId, SessionId, SessionSnapshot, UserId, VoteDirection};
