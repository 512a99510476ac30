use async_trait::async_trait;
use clickhouse::{Client, Row};
use serde::Deserialize;
use targeting_core::RuleKind;
use tracing::debug;

use crate::config::AnalyticsConfig;
use crate::error::{Result, WorkerError};

/// One pathname with its view count inside the lookback window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopularPath {
    pub pathname: String,
    pub view_count: u64,
}

/// Pathname popularity source consulted before a section build crawls
/// anything.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    /// Most-visited pathnames for the domain within the lookback window,
    /// narrowed by the targeting rule where the rule can be expressed as a
    /// pathname filter.
    async fn top_pathnames(
        &self,
        domain: &str,
        kind: RuleKind,
        value: &str,
        lookback_days: u32,
        limit: u32,
    ) -> Result<Vec<PopularPath>>;
}

/// ClickHouse-backed implementation over the `page_views` table.
pub struct ClickHouseAnalytics {
    client: Client,
}

#[derive(Debug, Row, Deserialize)]
struct PathRow {
    pathname: String,
    view_count: u64,
}

impl ClickHouseAnalytics {
    pub fn new(config: &AnalyticsConfig) -> Self {
        let client = Client::default()
            .with_url(&config.url)
            .with_database(&config.database)
            .with_user(&config.user)
            .with_password(&config.password);
        Self { client }
    }
}

#[async_trait]
impl AnalyticsStore for ClickHouseAnalytics {
    async fn top_pathnames(
        &self,
        domain: &str,
        kind: RuleKind,
        value: &str,
        lookback_days: u32,
        limit: u32,
    ) -> Result<Vec<PopularPath>> {
        // Only path_substring rules narrow the scan; the other rule kinds
        // depend on page content the analytics store does not carry.
        let rows: Vec<PathRow> = if kind == RuleKind::PathSubstring {
            self.client
                .query(
                    "SELECT pathname, count() AS view_count \
                     FROM page_views \
                     WHERE domain = ? \
                       AND event_date >= today() - ? \
                       AND position(pathname, ?) > 0 \
                     GROUP BY pathname \
                     ORDER BY view_count DESC \
                     LIMIT ?",
                )
                .bind(domain)
                .bind(lookback_days)
                .bind(value)
                .bind(limit)
                .fetch_all()
                .await
        } else {
            self.client
                .query(
                    "SELECT pathname, count() AS view_count \
                     FROM page_views \
                     WHERE domain = ? \
                       AND event_date >= today() - ? \
                     GROUP BY pathname \
                     ORDER BY view_count DESC \
                     LIMIT ?",
                )
                .bind(domain)
                .bind(lookback_days)
                .bind(limit)
                .fetch_all()
                .await
        }
        .map_err(|error| WorkerError::Analytics(error.to_string()))?;

        debug!(
            domain,
            kind = %kind,
            lookback_days,
            rows = rows.len(),
            "fetched popular pathnames"
        );

        Ok(rows
            .into_iter()
            .map(|row| PopularPath {
                pathname: row.pathname,
                view_count: row.view_count,
            })
            .collect())
    }
}
