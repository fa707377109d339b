// Copyright (c) James Kassemi, SC, US. All rights reserved.

//! Breaker-guarded enrichment lookups (ratings, watch history) with a bounded
//! result cache owned by each adapter.

pub mod cache;
pub mod error;
mod guard;
pub mod metadata;
pub mod provider;
pub mod watch_history;

pub use cache::BoundedCache;
pub use error::{EnrichmentError, ProviderError, Result};
pub use metadata::{EnrichmentClient, METADATA_SEARCH};
pub use provider::{MetadataProvider, Rating, RatingKey, WatchHistoryProvider};
pub use watch_history::{WatchHistoryClient, WATCH_HISTORY};
