// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use circuit_breaker::{BreakerHealth, BreakerPolicy, BreakerRegistry};
use core_types::config::EnrichmentConfig;
use core_types::status::OverallStatus;
use core_types::Candidate;
use metadata_enrichment::{
    EnrichmentClient, EnrichmentError, MetadataProvider, ProviderError, Rating, RatingKey,
    WatchHistoryClient, WatchHistoryProvider, METADATA_SEARCH,
};

#[derive(Default)]
struct FakeCatalog {
    ratings: HashMap<RatingKey, u8>,
    failing: AtomicBool,
    calls: AtomicUsize,
}

impl FakeCatalog {
    fn with(entries: &[(&str, Option<u16>, u8)]) -> Self {
        Self {
            ratings: entries
                .iter()
                .map(|(title, year, score)| (RatingKey::title_year(*title, *year), *score))
                .collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl MetadataProvider for FakeCatalog {
    async fn lookup(&self, key: &RatingKey) -> Result<Rating, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(ProviderError::Timeout);
        }
        self.ratings
            .get(key)
            .map(|score| Rating {
                source: "fake".to_string(),
                score: *score,
                external_id: None,
                poster_url: None,
            })
            .ok_or(ProviderError::NotFound)
    }
}

fn config(capacity: usize) -> EnrichmentConfig {
    EnrichmentConfig {
        cache_capacity: capacity,
        metadata_search_enabled: true,
        watch_history_enabled: true,
    }
}

fn client(catalog: FakeCatalog, capacity: usize) -> EnrichmentClient<FakeCatalog> {
    let breakers = BreakerRegistry::new(BreakerPolicy::default());
    EnrichmentClient::from_config(catalog, &config(capacity), &breakers)
}

fn calls(client: &EnrichmentClient<FakeCatalog>) -> usize {
    client.provider().calls.load(Ordering::SeqCst)
}

fn set_failing(client: &EnrichmentClient<FakeCatalog>, failing: bool) {
    client.provider().failing.store(failing, Ordering::SeqCst);
}

#[tokio::test]
async fn hits_are_cached_and_misses_are_not_failures() {
    let client = client(FakeCatalog::with(&[("Alien", Some(1979), 98)]), 8);

    let key = RatingKey::title_year("  alien ", Some(1979));
    assert_eq!(client.lookup(&key).await.unwrap().unwrap().score, 98);
    assert_eq!(client.lookup(&key).await.unwrap().unwrap().score, 98);
    assert_eq!(calls(&client), 1);
    assert_eq!(client.cached_len(), 1);

    let missing = RatingKey::ExternalId("tt0000000".to_string());
    assert_eq!(client.lookup(&missing).await.unwrap(), None);
    assert!(!client.breaker().is_open());
    assert_eq!(client.status().health(), BreakerHealth::Healthy);
}

#[tokio::test]
async fn failure_opens_breaker_and_short_circuits() {
    let client = client(FakeCatalog::with(&[("Brazil", Some(1985), 91)]), 8);
    let key = RatingKey::title_year("Brazil", Some(1985));

    set_failing(&client, true);
    let err = client.lookup(&key).await.unwrap_err();
    assert!(matches!(
        err,
        EnrichmentError::Provider {
            source: ProviderError::Timeout,
            ..
        }
    ));

    let err = client.lookup(&key).await.unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(calls(&client), 1);

    let status = client.status();
    assert!(status.circuit_open);
    assert_eq!(status.remaining_minutes, Some(5));
    assert_eq!(status.last_error.as_deref(), Some("request timed out"));

    let snapshot = client.status_handle().snapshot();
    assert_eq!(snapshot.overall, OverallStatus::Warn);
    assert!(snapshot
        .warnings
        .iter()
        .any(|w| w.starts_with(METADATA_SEARCH)));
    assert_eq!(snapshot.errors, vec!["metadata_search: request timed out".to_string()]);
}

#[tokio::test]
async fn retry_resets_and_attempts_once() {
    let client = client(FakeCatalog::with(&[("Chinatown", Some(1974), 99)]), 8);
    let key = RatingKey::title_year("Chinatown", Some(1974));

    set_failing(&client, true);
    client.lookup(&key).await.unwrap_err();
    assert!(client.lookup(&key).await.unwrap_err().is_circuit_open());

    set_failing(&client, false);
    assert_eq!(client.retry(&key).await.unwrap().unwrap().score, 99);
    assert_eq!(calls(&client), 2);
    assert_eq!(client.status().health(), BreakerHealth::Healthy);
    assert_eq!(client.status_handle().overall(), OverallStatus::Ok);
    let snapshot = client.status_handle().snapshot();
    assert!(snapshot.warnings.is_empty());
    assert!(snapshot.errors.is_empty());
}

#[tokio::test]
async fn lapsed_window_lets_calls_through() {
    let client = client(FakeCatalog::with(&[("Alien", Some(1979), 98)]), 8);
    client
        .breaker()
        .record_failure_at("timeout", Utc::now() - ChronoDuration::minutes(6));

    let key = RatingKey::title_year("Alien", Some(1979));
    assert!(client.lookup(&key).await.unwrap().is_some());
    assert_eq!(calls(&client), 1);
}

#[tokio::test]
async fn unconfigured_client_never_calls_out() {
    let breakers = BreakerRegistry::default();
    let disabled = EnrichmentConfig {
        metadata_search_enabled: false,
        ..config(8)
    };
    let client = EnrichmentClient::from_config(FakeCatalog::default(), &disabled, &breakers);

    let err = client.lookup(&RatingKey::title_year("Alien", None)).await.unwrap_err();
    assert!(matches!(err, EnrichmentError::NotConfigured { service: METADATA_SEARCH }));
    assert_eq!(client.status().health(), BreakerHealth::Unconfigured);
    assert!(client.ratings_for(&[Candidate::new(1, "Alien")]).await.is_empty());
    assert_eq!(calls(&client), 0);
}

#[tokio::test]
async fn ratings_for_stops_once_breaker_opens() {
    let client = client(FakeCatalog::with(&[("Alien", None, 98)]), 0);

    let films = [Candidate::new(1, "Alien"), Candidate::new(2, "Brazil")];
    let found = client.ratings_for(&films).await;
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].0, 1);
    assert_eq!(client.cached_len(), 0);

    set_failing(&client, true);
    let calls_before = calls(&client);
    let found = client.ratings_for(&films).await;
    assert!(found.is_empty());
    assert_eq!(calls(&client), calls_before + 1);
}

struct FakeHistory;

#[async_trait]
impl WatchHistoryProvider for FakeHistory {
    async fn play_count(&self, account: &str, item: &RatingKey) -> Result<u32, ProviderError> {
        match (account, item) {
            ("sam", RatingKey::ExternalId(id)) if id == "tt0078748" => Ok(3),
            ("sam", _) => Err(ProviderError::NotFound),
            _ => Err(ProviderError::Status { status: 503 }),
        }
    }
}

#[tokio::test]
async fn watch_history_shares_breaker_registry() {
    let breakers = BreakerRegistry::default();
    let client = WatchHistoryClient::from_config(FakeHistory, &config(8), &breakers);
    let alien = RatingKey::ExternalId("tt0078748".to_string());

    assert_eq!(client.play_count("sam", &alien).await.unwrap(), Some(3));
    assert!(client.has_watched("sam", &alien).await.unwrap());
    assert!(!client
        .has_watched("sam", &RatingKey::title_year("Brazil", None))
        .await
        .unwrap());

    assert!(client.play_count("robin", &alien).await.is_err());
    // Cached answers still come back while the breaker is open.
    assert_eq!(client.play_count("sam", &alien).await.unwrap(), Some(3));
    let brazil = RatingKey::title_year("Brazil", None);
    assert!(client.play_count("sam", &brazil).await.unwrap_err().is_circuit_open());
    let statuses = breakers.statuses();
    let (name, status) = &statuses[0];
    assert_eq!(name, "watch_history");
    assert!(status.circuit_open);
}
