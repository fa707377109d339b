// Copyright (c) James Kassemi, SC, US. All rights reserved.

use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_FILE: &str = "movie-night.toml";
pub const ENV_PREFIX: &str = "MOVIE_NIGHT";

/// Top-level knobs, layered from an optional TOML file and `MOVIE_NIGHT__*` env vars.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub ranking: RankingConfig,
    pub breaker: BreakerConfig,
    pub enrichment: EnrichmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    pub grace_period_ms: u64,
    pub refresh_interval_ms: u64,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            grace_period_ms: default_grace_period_ms(),
            refresh_interval_ms: default_refresh_interval_ms(),
        }
    }
}

impl RankingConfig {
    pub fn grace_period(&self) -> Duration {
        Duration::from_millis(self.grace_period_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

fn default_grace_period_ms() -> u64 {
    5_000
}

fn default_refresh_interval_ms() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    pub open_duration_secs: u64,
    pub recent_failure_secs: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            open_duration_secs: default_open_duration_secs(),
            recent_failure_secs: default_recent_failure_secs(),
        }
    }
}

impl BreakerConfig {
    pub fn open_duration(&self) -> Duration {
        Duration::from_secs(self.open_duration_secs)
    }

    pub fn recent_failure_window(&self) -> Duration {
        Duration::from_secs(self.recent_failure_secs)
    }
}

fn default_open_duration_secs() -> u64 {
    300
}

fn default_recent_failure_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    pub cache_capacity: usize,
    pub metadata_search_enabled: bool,
    pub watch_history_enabled: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            cache_capacity: default_cache_capacity(),
            metadata_search_enabled: true,
            watch_history_enabled: false,
        }
    }
}

fn default_cache_capacity() -> usize {
    512
}

impl AppConfig {
    /// Loads `movie-night.toml` from the working directory (if present) and env overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name(DEFAULT_CONFIG_FILE).required(false))
            .add_source(env_source())
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::from(path).required(true))
            .add_source(env_source())
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ranking.grace_period_ms == 0 {
            return Err(ConfigError::Message(
                "ranking.grace_period_ms must be positive".to_string(),
            ));
        }
        if self.ranking.refresh_interval_ms == 0 {
            return Err(ConfigError::Message(
                "ranking.refresh_interval_ms must be positive".to_string(),
            ));
        }
        if self.breaker.open_duration_secs == 0 {
            return Err(ConfigError::Message(
                "breaker.open_duration_secs must be positive".to_string(),
            ));
        }
        if self.enrichment.cache_capacity == 0 {
            return Err(ConfigError::Message(
                "enrichment.cache_capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_source() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_observed_timings() {
        let config = AppConfig::default();
        assert_eq!(config.ranking.grace_period(), Duration::from_secs(5));
        assert_eq!(config.breaker.open_duration(), Duration::from_secs(300));
        assert_eq!(config.breaker.recent_failure_window(), Duration::from_secs(60));
        assert_eq!(config.enrichment.cache_capacity, 512);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn load_from_file_overrides_sections() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(
            file,
            "[ranking]\ngrace_period_ms = 1500\n\n[enrichment]\ncache_capacity = 8"
        )
        .unwrap();
        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.ranking.grace_period_ms, 1500);
        assert_eq!(config.ranking.refresh_interval_ms, 10_000);
        assert_eq!(config.enrichment.cache_capacity, 8);
        assert_eq!(config.breaker.open_duration_secs, 300);
    }

    #[test]
    fn zero_grace_period_is_rejected() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        writeln!(file, "[ranking]\ngrace_period_ms = 0").unwrap();
        let err = AppConfig::load_from(file.path()).unwrap_err();
        assert!(err.to_string().contains("grace_period_ms"));
    }
}
