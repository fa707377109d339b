// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::sync::Arc;

use circuit_breaker::{BreakerRegistry, BreakerStatus, CircuitBreaker};
use core_types::config::EnrichmentConfig;
use core_types::status::ServiceStatusHandle;

use crate::cache::BoundedCache;
use crate::error::Result;
use crate::guard::GuardedLookup;
use crate::provider::{RatingKey, WatchHistoryProvider};

pub const WATCH_HISTORY: &str = "watch_history";

pub struct WatchHistoryClient<W> {
    provider: W,
    guard: GuardedLookup<(String, RatingKey), u32>,
}

impl<W: WatchHistoryProvider> WatchHistoryClient<W> {
    pub fn new(
        provider: W,
        configured: bool,
        breaker: Arc<CircuitBreaker>,
        cache: BoundedCache<(String, RatingKey), u32>,
    ) -> Self {
        Self {
            provider,
            guard: GuardedLookup::new(
                configured,
                breaker,
                cache,
                ServiceStatusHandle::new(WATCH_HISTORY),
            ),
        }
    }

    pub fn from_config(provider: W, config: &EnrichmentConfig, breakers: &BreakerRegistry) -> Self {
        Self::new(
            provider,
            config.watch_history_enabled,
            breakers.breaker(WATCH_HISTORY),
            BoundedCache::new(config.cache_capacity),
        )
    }

    pub fn configured(&self) -> bool {
        self.guard.configured()
    }

    /// Number of times `account` has watched `item`, if the provider knows.
    pub async fn play_count(&self, account: &str, item: &RatingKey) -> Result<Option<u32>> {
        let key = (account.to_string(), item.clone());
        self.guard
            .fetch(&key, || self.provider.play_count(account, item))
            .await
    }

    pub async fn has_watched(&self, account: &str, item: &RatingKey) -> Result<bool> {
        Ok(self.play_count(account, item).await?.unwrap_or(0) > 0)
    }

    pub async fn retry(&self, account: &str, item: &RatingKey) -> Result<Option<u32>> {
        let key = (account.to_string(), item.clone());
        self.guard
            .retry(&key, || self.provider.play_count(account, item))
            .await
    }

    pub fn status(&self) -> BreakerStatus {
        self.guard.breaker_status()
    }

    pub fn status_handle(&self) -> &ServiceStatusHandle {
        self.guard.status_handle()
    }
}
