// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::future::Future;
use std::sync::Arc;

use circuit_breaker::{BreakerHealth, BreakerStatus, CircuitBreaker, CircuitError};
use core_types::status::{OverallStatus, ServiceStatusHandle, StatusGauge};
use log::debug;
use parking_lot::Mutex;

use crate::cache::BoundedCache;
use crate::error::{EnrichmentError, ProviderError, Result};

/// Breaker, cache and status plumbing shared by every enrichment adapter.
pub(crate) struct GuardedLookup<K, V> {
    service: &'static str,
    configured: bool,
    breaker: Arc<CircuitBreaker>,
    cache: Mutex<BoundedCache<K, V>>,
    status: ServiceStatusHandle,
}

impl<K: Ord + Clone, V: Clone> GuardedLookup<K, V> {
    pub(crate) fn new(
        configured: bool,
        breaker: Arc<CircuitBreaker>,
        cache: BoundedCache<K, V>,
        status: ServiceStatusHandle,
    ) -> Self {
        let guard = Self {
            service: status.service_name(),
            configured,
            breaker,
            cache: Mutex::new(cache),
            status,
        };
        guard.publish();
        guard
    }

    pub(crate) fn configured(&self) -> bool {
        self.configured
    }

    pub(crate) fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub(crate) fn status_handle(&self) -> &ServiceStatusHandle {
        &self.status
    }

    pub(crate) fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status(self.configured)
    }

    pub(crate) fn cached_len(&self) -> usize {
        self.cache.lock().len()
    }

    pub(crate) async fn fetch<F, Fut>(&self, key: &K, op: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, ProviderError>>,
    {
        self.ensure_configured()?;
        if let Some(hit) = self.cache.lock().get(key) {
            return Ok(Some(hit));
        }
        let outcome = self.breaker.call(move || found_or_none(op)).await;
        self.finish(key, outcome)
    }

    /// Reset the breaker and make one attempt, bypassing the cache.
    pub(crate) async fn retry<F, Fut>(&self, key: &K, op: F) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<V, ProviderError>>,
    {
        self.ensure_configured()?;
        let outcome = self.breaker.retry_after_reset(move || found_or_none(op)).await;
        self.finish(key, outcome)
    }

    pub(crate) fn publish(&self) {
        let service = self.service;
        let status = self.breaker_status();
        self.status
            .clear_warnings_matching(|w| w.starts_with(service));
        self.status.clear_errors_matching(|e| e.starts_with(service));
        if status.recently_failed || status.circuit_open {
            if let Some(last_error) = &status.last_error {
                self.status.push_error(format!("{service}: {last_error}"));
            }
        }
        match status.health() {
            BreakerHealth::Unconfigured => {
                self.status.set_overall(OverallStatus::Ok);
            }
            BreakerHealth::Open { remaining_minutes } => {
                self.status.set_overall(OverallStatus::Warn);
                self.status.push_warning(format!(
                    "{service} unavailable, retrying in {remaining_minutes} minute(s)"
                ));
            }
            BreakerHealth::RecentlyFailed => {
                self.status.set_overall(OverallStatus::Warn);
                self.status.push_warning(format!(
                    "{service} recently failed: {}",
                    status.last_error.as_deref().unwrap_or("unknown error")
                ));
            }
            BreakerHealth::Healthy => {
                self.status.set_overall(OverallStatus::Ok);
            }
        }
        let cache = self.cache.lock();
        self.status.set_gauges(vec![StatusGauge::new(
            format!("{service}_cache_entries"),
            cache.len() as f64,
        )
        .with_max(cache.capacity() as f64)]);
    }

    fn ensure_configured(&self) -> Result<()> {
        if self.configured {
            Ok(())
        } else {
            Err(EnrichmentError::NotConfigured {
                service: self.service,
            })
        }
    }

    fn finish(
        &self,
        key: &K,
        outcome: std::result::Result<Option<V>, CircuitError<ProviderError>>,
    ) -> Result<Option<V>> {
        let result = match outcome {
            Ok(Some(value)) => {
                self.cache.lock().insert(key.clone(), value.clone());
                Ok(Some(value))
            }
            Ok(None) => {
                debug!("{} has no match", self.service);
                Ok(None)
            }
            Err(CircuitError::Open {
                service,
                remaining_minutes,
            }) => Err(EnrichmentError::CircuitOpen {
                service,
                remaining_minutes,
            }),
            Err(CircuitError::Inner(source)) => Err(EnrichmentError::Provider {
                service: self.service,
                source,
            }),
        };
        self.publish();
        result
    }
}

async fn found_or_none<F, Fut, V>(op: F) -> std::result::Result<Option<V>, ProviderError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<V, ProviderError>>,
{
    match op().await {
        Ok(value) => Ok(Some(value)),
        Err(ProviderError::NotFound) => Ok(None),
        Err(err) => Err(err),
    }
}
