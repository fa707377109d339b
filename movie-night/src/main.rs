// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::{env, path::PathBuf, process, sync::Arc, time::Duration};

use async_trait::async_trait;
use circuit_breaker::{BreakerHealth, BreakerPolicy, BreakerRegistry};
use config::ConfigError;
use core_types::status::{ServiceStatusHandle, ServiceStatusReporter};
use core_types::{AppConfig, Candidate, SessionId, UserId};
use log::{info, warn};
use metadata_enrichment::{
    EnrichmentClient, MetadataProvider, ProviderError, Rating, RatingKey,
};
use ranking_engine::{MultiSessionRankingRegistry, RankingError, RankingEvent};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use vote_ledger::{LedgerError, MemoryVoteLedger, VoteLedger};

const DEMO_SESSION: SessionId = 1;
const HOST: UserId = 1;
const GUESTS: [UserId; 3] = [2, 3, 4];
const VOTES_PER_MEMBER: u32 = 3;
const NOMINATIONS: [(u64, &str, u16); 4] = [
    (1, "Alien", 1979),
    (2, "Brazil", 1985),
    (3, "Chinatown", 1974),
    (4, "Heat", 1995),
];

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("movie-night failed: {err}");
        process::exit(1);
    }
}

fn run() -> Result<(), AppError> {
    let config = match env::args().nth(1) {
        Some(path) => AppConfig::load_from(&PathBuf::from(path))?,
        None => AppConfig::load()?,
    };
    info!(
        "grace period {:?}, refresh every {:?}, breaker window {:?}",
        config.ranking.grace_period(),
        config.ranking.refresh_interval(),
        config.breaker.open_duration()
    );
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(AppError::Runtime)?;
    runtime.block_on(demo(config))
}

async fn demo(config: AppConfig) -> Result<(), AppError> {
    let ledger = Arc::new(MemoryVoteLedger::new());
    ledger.open_session(DEMO_SESSION, VOTES_PER_MEMBER, [HOST])?;
    for (id, title, year) in NOMINATIONS {
        let mut candidate = Candidate::new(id, title);
        candidate.year = Some(year);
        ledger.nominate(DEMO_SESSION, &candidate)?;
    }
    ledger.cast_vote(DEMO_SESSION, 1, GUESTS[0]).await?;
    ledger.cast_vote(DEMO_SESSION, 1, GUESTS[1]).await?;
    ledger.cast_vote(DEMO_SESSION, 2, GUESTS[2]).await?;

    let dyn_ledger: Arc<dyn VoteLedger> = ledger.clone();
    let registry =
        MultiSessionRankingRegistry::new(HOST, dyn_ledger, config.ranking.grace_period());
    registry.initialize(ledger.snapshot(DEMO_SESSION, HOST).await?);
    let session = registry
        .session(DEMO_SESSION)
        .ok_or(RankingError::UnknownSession {
            session_id: DEMO_SESSION,
        })?;
    log_standings(&registry, "opening standings")?;

    let shutdown = CancellationToken::new();
    let refresher = session.spawn_refresh_loop(config.ranking.refresh_interval(), shutdown.clone());
    let mut events = session.subscribe();
    let event_logger = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            log_event(&event);
        }
    });

    for candidate_id in [3, 3, 4] {
        let ticket = registry.vote(DEMO_SESSION, candidate_id)?;
        let outcome = ticket.settled().await;
        info!("host vote on {candidate_id}: {outcome:?}");
    }
    if let Err(err) = registry.vote(DEMO_SESSION, 2) {
        info!("fourth vote refused locally: {err}");
    }

    for guest in GUESTS {
        ledger.cast_vote(DEMO_SESSION, 4, guest).await?;
    }
    let result = registry.refresh(DEMO_SESSION).await?;
    let countdown = session.countdown();
    info!(
        "refresh changed order: {}, countdown {:?}s",
        result.order_changed, countdown.seconds_remaining
    );
    log_standings(&registry, "held standings")?;

    tokio::time::sleep(config.ranking.grace_period() + Duration::from_millis(250)).await;
    log_standings(&registry, "settled standings")?;

    let ranking_status = ServiceStatusHandle::new("ranking");
    registry.publish_status(&ranking_status);
    let metadata_status = enrichment_demo(&config, &session.sorted_candidates()).await;
    log_service_status(&[&ranking_status, &metadata_status]);

    shutdown.cancel();
    if let Err(err) = refresher.await {
        warn!("refresh loop ended abnormally: {err}");
    }
    event_logger.abort();
    Ok(())
}

async fn enrichment_demo(config: &AppConfig, candidates: &[Candidate]) -> ServiceStatusHandle {
    let breakers = BreakerRegistry::new(BreakerPolicy::from(&config.breaker));
    let client = EnrichmentClient::from_config(OfflineCatalog, &config.enrichment, &breakers);
    let ratings = client.ratings_for(candidates).await;
    info!("{} rating(s) found", ratings.len());

    match client.status().health() {
        BreakerHealth::Open { remaining_minutes } => warn!(
            "metadata search disabled for {remaining_minutes} minute(s); voting unaffected"
        ),
        other => info!("metadata search health: {other:?}"),
    }
    if let Some(first) = candidates.first() {
        if let Err(err) = client.retry(&RatingKey::for_candidate(first)).await {
            info!("retry after reset also failed: {err}");
        }
    }
    client.status_handle().clone()
}

fn log_service_status(reporters: &[&dyn ServiceStatusReporter]) {
    for reporter in reporters {
        let status = reporter.status();
        info!("[{}] {:?}", reporter.service_name(), status.overall);
        for gauge in &status.gauges {
            info!("[{}]   {} = {}", reporter.service_name(), gauge.label, gauge.value);
        }
        for message in status.warnings.iter().chain(status.errors.iter()) {
            warn!("[{}]   {message}", reporter.service_name());
        }
    }
}

fn log_standings(registry: &MultiSessionRankingRegistry, label: &str) -> Result<(), AppError> {
    let standings = registry.sorted_candidates(DEMO_SESSION)?;
    let remaining = registry.user_remaining_votes(DEMO_SESSION)?;
    let max = registry.max_votes_per_user(DEMO_SESSION)?;
    info!("{label} (host has {remaining}/{max} votes left):");
    for (rank, candidate) in standings.iter().enumerate() {
        info!(
            "  {}. {} ({} votes{})",
            rank + 1,
            candidate.title,
            candidate.vote_count,
            if candidate.user_has_voted {
                format!(", {} mine", candidate.user_vote_count)
            } else {
                String::new()
            }
        );
    }
    Ok(())
}

fn log_event(event: &RankingEvent) {
    match event {
        RankingEvent::ReorderScheduled { grace_period, .. } => {
            info!("standings will reorder in {grace_period:?}")
        }
        RankingEvent::ReorderCommitted { order, .. } => info!("standings reordered: {order:?}"),
        RankingEvent::ReorderCancelled { .. } => info!("reorder cancelled"),
        RankingEvent::MutationFailed { reason, .. } => warn!("vote not saved: {reason}"),
        RankingEvent::RefreshFailed { reason, .. } => warn!("refresh failed: {reason}"),
    }
}

/// Stands in for a ratings service that cannot be reached.
struct OfflineCatalog;

#[async_trait]
impl MetadataProvider for OfflineCatalog {
    async fn lookup(&self, _key: &RatingKey) -> Result<Rating, ProviderError> {
        Err(ProviderError::Transport("catalog unreachable".to_string()))
    }
}

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Ranking(#[from] RankingError),
    #[error("failed to start runtime: {0}")]
    Runtime(std::io::Error),
}
