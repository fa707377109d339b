// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use core_types::config::BreakerConfig;
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::CircuitError;

pub const DEFAULT_OPEN_DURATION: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_RECENT_FAILURE_WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerPolicy {
    pub open_duration: Duration,
    pub recent_failure_window: Duration,
}

impl Default for BreakerPolicy {
    fn default() -> Self {
        Self {
            open_duration: DEFAULT_OPEN_DURATION,
            recent_failure_window: DEFAULT_RECENT_FAILURE_WINDOW,
        }
    }
}

impl From<&BreakerConfig> for BreakerPolicy {
    fn from(config: &BreakerConfig) -> Self {
        Self {
            open_duration: config.open_duration(),
            recent_failure_window: config.recent_failure_window(),
        }
    }
}

#[derive(Debug, Clone, Default)]
struct BreakerState {
    last_failure_reason: Option<String>,
    last_failure_at: Option<DateTime<Utc>>,
    open_until: Option<DateTime<Utc>>,
}

/// Read-only view used for user-facing messaging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStatus {
    pub configured: bool,
    pub circuit_open: bool,
    pub remaining_minutes: Option<i64>,
    pub recently_failed: bool,
    pub last_error: Option<String>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerHealth {
    Unconfigured,
    Open { remaining_minutes: i64 },
    RecentlyFailed,
    Healthy,
}

impl BreakerStatus {
    fn unconfigured() -> Self {
        Self {
            configured: false,
            circuit_open: false,
            remaining_minutes: None,
            recently_failed: false,
            last_error: None,
            last_failure_at: None,
        }
    }

    pub fn health(&self) -> BreakerHealth {
        if !self.configured {
            BreakerHealth::Unconfigured
        } else if self.circuit_open {
            BreakerHealth::Open {
                remaining_minutes: self.remaining_minutes.unwrap_or(0),
            }
        } else if self.recently_failed {
            BreakerHealth::RecentlyFailed
        } else {
            BreakerHealth::Healthy
        }
    }
}

/// Two-state (closed/open) gate for one named external service.
///
/// There is no half-open probe state: once open, the breaker stays open until
/// its window lapses or an operator calls [`CircuitBreaker::reset`].
pub struct CircuitBreaker {
    name: String,
    policy: BreakerPolicy,
    state: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, policy: BreakerPolicy) -> Self {
        Self {
            name: name.into(),
            policy,
            state: Mutex::new(BreakerState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn policy(&self) -> BreakerPolicy {
        self.policy
    }

    pub fn is_open(&self) -> bool {
        self.is_open_at(Utc::now())
    }

    /// True while inside the open window. Clears an elapsed window as a side effect.
    pub fn is_open_at(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        match state.open_until {
            Some(until) if now < until => true,
            Some(_) => {
                state.open_until = None;
                info!("{} circuit closed after cool-down", self.name);
                false
            }
            None => false,
        }
    }

    pub fn record_failure(&self, reason: impl Into<String>) {
        self.record_failure_at(reason, Utc::now());
    }

    /// Opens the breaker for the full window starting at `now`, replacing any
    /// window already in effect.
    pub fn record_failure_at(&self, reason: impl Into<String>, now: DateTime<Utc>) {
        let reason = reason.into();
        let open_until = now + to_chrono(self.policy.open_duration);
        let mut state = self.state.lock();
        warn!(
            "{} circuit opened until {} after failure: {}",
            self.name,
            open_until.to_rfc3339(),
            reason
        );
        state.last_failure_reason = Some(reason);
        state.last_failure_at = Some(now);
        state.open_until = Some(open_until);
    }

    /// Forgets the last failure. An open window is left to run out on its own.
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.last_failure_reason = None;
        state.last_failure_at = None;
    }

    pub fn reset(&self) {
        *self.state.lock() = BreakerState::default();
        info!("{} circuit reset by operator", self.name);
    }

    pub fn status(&self, configured: bool) -> BreakerStatus {
        self.status_at(configured, Utc::now())
    }

    /// Pure read; does not close an elapsed window.
    pub fn status_at(&self, configured: bool, now: DateTime<Utc>) -> BreakerStatus {
        if !configured {
            return BreakerStatus::unconfigured();
        }
        let state = self.state.lock();
        let remaining = state
            .open_until
            .filter(|until| now < *until)
            .map(|until| until - now);
        let recently_failed = state
            .last_failure_at
            .map(|at| now - at < to_chrono(self.policy.recent_failure_window))
            .unwrap_or(false);
        BreakerStatus {
            configured: true,
            circuit_open: remaining.is_some(),
            remaining_minutes: remaining.map(|r| ceil_minutes(r.num_seconds())),
            recently_failed,
            last_error: state.last_failure_reason.clone(),
            last_failure_at: state.last_failure_at,
        }
    }

    /// Runs `op` unless the breaker is open, recording the outcome.
    pub async fn call<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        if self.is_open() {
            return Err(self.open_error());
        }
        match op().await {
            Ok(value) => {
                self.record_success();
                Ok(value)
            }
            Err(err) => {
                self.record_failure(err.to_string());
                Err(CircuitError::Inner(err))
            }
        }
    }

    /// The "retry" affordance: clears the breaker and makes exactly one attempt.
    pub async fn retry_after_reset<F, Fut, T, E>(&self, op: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        self.reset();
        self.call(op).await
    }

    fn open_error<E>(&self) -> CircuitError<E> {
        let status = self.status(true);
        CircuitError::Open {
            service: self.name.clone(),
            remaining_minutes: status.remaining_minutes.unwrap_or(0),
        }
    }
}

fn to_chrono(duration: Duration) -> chrono::Duration {
    chrono::Duration::from_std(duration).unwrap_or_else(|_| chrono::Duration::weeks(52))
}

fn ceil_minutes(seconds: i64) -> i64 {
    (seconds.max(0) + 59) / 60
}
