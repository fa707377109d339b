// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use circuit_breaker::{BreakerRegistry, BreakerStatus, CircuitBreaker};
use core_types::config::EnrichmentConfig;
use core_types::status::ServiceStatusHandle;
use core_types::{Candidate, CandidateId};
use log::warn;

use crate::cache::BoundedCache;
use crate::error::Result;
use crate::guard::GuardedLookup;
use crate::provider::{MetadataProvider, Rating, RatingKey};

pub const METADATA_SEARCH: &str = "metadata_search";

/// Rating lookups for nominated titles. A failing provider only disables
/// enrichment; voting never depends on it.
pub struct EnrichmentClient<P> {
    provider: P,
    guard: GuardedLookup<RatingKey, Rating>,
}

impl<P: MetadataProvider> EnrichmentClient<P> {
    pub fn new(
        provider: P,
        configured: bool,
        breaker: Arc<CircuitBreaker>,
        cache: BoundedCache<RatingKey, Rating>,
    ) -> Self {
        Self {
            provider,
            guard: GuardedLookup::new(
                configured,
                breaker,
                cache,
                ServiceStatusHandle::new(METADATA_SEARCH),
            ),
        }
    }

    pub fn from_config(provider: P, config: &EnrichmentConfig, breakers: &BreakerRegistry) -> Self {
        Self::new(
            provider,
            config.metadata_search_enabled,
            breakers.breaker(METADATA_SEARCH),
            BoundedCache::new(config.cache_capacity),
        )
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn configured(&self) -> bool {
        self.guard.configured()
    }

    /// `Ok(None)` means the provider answered but has no match.
    pub async fn lookup(&self, key: &RatingKey) -> Result<Option<Rating>> {
        self.guard
            .fetch(key, || self.provider.lookup(key))
            .await
    }

    /// Looks up every candidate, skipping failures. Stops calling out once
    /// the breaker opens.
    pub async fn ratings_for(&self, candidates: &[Candidate]) -> Vec<(CandidateId, Rating)> {
        let mut found = Vec::new();
        if !self.configured() {
            return found;
        }
        for candidate in candidates {
            match self.lookup(&RatingKey::for_candidate(candidate)).await {
                Ok(Some(rating)) => found.push((candidate.id, rating)),
                Ok(None) => {}
                Err(err) if err.is_circuit_open() => break,
                Err(err) => warn!("rating for {:?} unavailable: {}", candidate.title, err),
            }
        }
        found
    }

    pub async fn retry(&self, key: &RatingKey) -> Result<Option<Rating>> {
        self.guard
            .retry(key, || self.provider.lookup(key))
            .await
    }

    pub fn status(&self) -> BreakerStatus {
        self.guard.breaker_status()
    }

    pub fn status_handle(&self) -> &ServiceStatusHandle {
        self.guard.status_handle()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        self.guard.breaker()
    }

    pub fn cached_len(&self) -> usize {
        self.guard.cached_len()
    }
}
