use std::str::FromStr;

use crate::error::{Result, WorkerError};

/// What the worker does on this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Build next-page section manifests from analytics + crawl.
    Sections,
    /// Republish per-domain page manifests from the rule table.
    Manifests,
    /// Sections first, then manifests, so fresh section manifests are
    /// picked up by `_nextPageTargeting` in the same run.
    All,
}

impl FromStr for RunMode {
    type Err = WorkerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sections" => Ok(RunMode::Sections),
            "manifests" => Ok(RunMode::Manifests),
            "all" => Ok(RunMode::All),
            other => Err(WorkerError::Config(format!(
                "WORKER_MODE must be sections, manifests or all, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub run: RunConfig,
    pub database: DatabaseConfig,
    pub analytics: AnalyticsConfig,
    pub store: StoreConfig,
    pub crawl: CrawlConfig,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Log intended writes without touching the store or the rule table.
    pub dry_run: bool,
    /// Restrict the run to these domains. Empty means every domain.
    pub domains: Vec<String>,
    pub run_once: bool,
    pub interval_secs: u64,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub migrate: bool,
}

#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub url: String,
    pub database: String,
    pub user: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub bucket: String,
}

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| WorkerError::Config("DATABASE_URL not set".to_string()))?;
        let bucket = std::env::var("MANIFEST_BUCKET")
            .map_err(|_| WorkerError::Config("MANIFEST_BUCKET not set".to_string()))?;

        Ok(Self {
            run: RunConfig {
                mode: std::env::var("WORKER_MODE")
                    .unwrap_or_else(|_| "all".to_string())
                    .parse()?,
                dry_run: std::env::var("DRY_RUN")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
                domains: std::env::var("WORKER_DOMAINS")
                    .map(|raw| {
                        raw.split(',')
                            .map(str::trim)
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
                run_once: std::env::var("RUN_ONCE")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
                interval_secs: std::env::var("RUN_INTERVAL_SECS")
                    .unwrap_or_else(|_| "3600".to_string())
                    .parse()
                    .unwrap_or(3600),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: std::env::var("DATABASE_MAX_CONNECTIONS")
                    .unwrap_or_else(|_| "5".to_string())
                    .parse()
                    .unwrap_or(5),
                migrate: std::env::var("DATABASE_MIGRATE")
                    .unwrap_or_else(|_| "false".to_string())
                    .parse()
                    .unwrap_or(false),
            },
            analytics: AnalyticsConfig {
                url: std::env::var("CLICKHOUSE_URL")
                    .unwrap_or_else(|_| "http://clickhouse:8123".to_string()),
                database: std::env::var("CLICKHOUSE_DATABASE")
                    .unwrap_or_else(|_| "analytics".to_string()),
                user: std::env::var("CLICKHOUSE_USER").unwrap_or_else(|_| "default".to_string()),
                password: std::env::var("CLICKHOUSE_PASSWORD").unwrap_or_default(),
            },
            store: StoreConfig { bucket },
            crawl: CrawlConfig {
                concurrency: std::env::var("CRAWL_CONCURRENCY")
                    .unwrap_or_else(|_| "3".to_string())
                    .parse()
                    .unwrap_or(3),
                timeout_secs: std::env::var("CRAWL_TIMEOUT_SECS")
                    .unwrap_or_else(|_| "10".to_string())
                    .parse()
                    .unwrap_or(10),
                user_agent: std::env::var("CRAWL_USER_AGENT")
                    .unwrap_or_else(|_| "curio-section-worker/1.0".to_string()),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_mode_parse() {
        assert_eq!("sections".parse::<RunMode>().unwrap(), RunMode::Sections);
        assert_eq!("manifests".parse::<RunMode>().unwrap(), RunMode::Manifests);
        assert_eq!("all".parse::<RunMode>().unwrap(), RunMode::All);
        assert!("section".parse::<RunMode>().is_err());
    }
}
