// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::breaker::{BreakerPolicy, BreakerStatus, CircuitBreaker};

/// One breaker per named external service, created on first use.
pub struct BreakerRegistry {
    policy: BreakerPolicy,
    breakers: RwLock<BTreeMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    pub fn new(policy: BreakerPolicy) -> Self {
        Self {
            policy,
            breakers: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn breaker(&self, service: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.read().get(service) {
            return Arc::clone(existing);
        }
        let mut breakers = self.breakers.write();
        Arc::clone(
            breakers
                .entry(service.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(service, self.policy))),
        )
    }

    /// Operator recovery for a single service. Returns false if it was never used.
    pub fn reset(&self, service: &str) -> bool {
        match self.breakers.read().get(service) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    pub fn statuses(&self) -> Vec<(String, BreakerStatus)> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.status(true)))
            .collect()
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new(BreakerPolicy::default())
    }
}
