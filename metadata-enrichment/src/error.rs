// Copyright (c) James Kassemi, SC, US. All rights reserved.

use thiserror::Error;

/// Pass/fail signal from an external provider. Only `NotFound` is treated as
/// a successful answer; everything else trips the breaker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no match")]
    NotFound,
    #[error("request timed out")]
    Timeout,
    #[error("provider returned status {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unexpected response: {0}")]
    Malformed(String),
}

#[derive(Debug, Error)]
pub enum EnrichmentError {
    #[error("{service} is not configured")]
    NotConfigured { service: &'static str },
    #[error("{service} is cooling down after a failure; retry in {remaining_minutes} minute(s)")]
    CircuitOpen {
        service: String,
        remaining_minutes: i64,
    },
    #[error("{service} lookup failed: {source}")]
    Provider {
        service: &'static str,
        #[source]
        source: ProviderError,
    },
}

impl EnrichmentError {
    /// True when the UI should offer the retry affordance.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, EnrichmentError::CircuitOpen { .. })
    }
}

pub type Result<T> = std::result::Result<T, EnrichmentError>;
