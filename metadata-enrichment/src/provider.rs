// Copyright (c) James Kassemi, SC, US. All rights reserved.

use async_trait::async_trait;
use core_types::Candidate;
use serde::{Deserialize, Serialize};

use crate::error::ProviderError;

/// How a title is looked up: by name and release year, or by a provider id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RatingKey {
    TitleYear { title: String, year: Option<u16> },
    ExternalId(String),
}

impl RatingKey {
    pub fn title_year(title: impl Into<String>, year: Option<u16>) -> Self {
        RatingKey::TitleYear {
            title: title.into().trim().to_lowercase(),
            year,
        }
    }

    pub fn for_candidate(candidate: &Candidate) -> Self {
        Self::title_year(&candidate.title, candidate.year)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub source: String,
    /// Normalized to 0..=100.
    pub score: u8,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub poster_url: Option<String>,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn lookup(&self, key: &RatingKey) -> Result<Rating, ProviderError>;
}

/// Per-member viewing history. `NotFound` means the provider has no record
/// for the account or title.
#[async_trait]
pub trait WatchHistoryProvider: Send + Sync {
    async fn play_count(&self, account: &str, item: &RatingKey) -> Result<u32, ProviderError>;
}
