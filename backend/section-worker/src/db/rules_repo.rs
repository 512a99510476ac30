use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use targeting_core::{specificity, RuleKind};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, WorkerError};

/// Feed targeting rule as stored in the rule table. Matching pages load the
/// search feed named by `search_id`.
#[derive(Debug, Clone)]
pub struct FeedTargetingRecord {
    pub id: Uuid,
    pub domain: String,
    pub kind: RuleKind,
    pub value: String,
    pub search_id: String,
    pub phrase: Option<String>,
    pub specificity: i32,
    pub created_at: DateTime<Utc>,
}

/// Next-page targeting rule as stored in the rule table. Owns the section
/// manifest at `{domain}/next-page/{section}/manifest.json`.
#[derive(Debug, Clone)]
pub struct NextPageTargetingRecord {
    pub id: Uuid,
    pub domain: String,
    pub kind: RuleKind,
    pub value: String,
    pub section: String,
    pub lookback_days: i32,
    pub item_limit: i32,
    pub specificity: i32,
    pub created_at: DateTime<Utc>,
}

/// Page known to the system, optionally mapped to a search feed.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PublishedPage {
    pub domain: String,
    pub pathname: String,
    pub search_id: Option<String>,
}

/// Rule-table access behind a seam so jobs can be tested without Postgres.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Create-or-update keyed by `(domain, kind, value, section)`. Re-running
    /// with the same key updates the window and limit and restores a
    /// soft-deleted rule.
    async fn upsert_next_page_rule(
        &self,
        domain: &str,
        kind: RuleKind,
        value: &str,
        section: &str,
        lookback_days: i32,
        item_limit: i32,
    ) -> Result<NextPageTargetingRecord>;

    /// Active next-page rules for a domain in creation order.
    async fn next_page_rules(&self, domain: &str) -> Result<Vec<NextPageTargetingRecord>>;

    /// Active feed rules for a domain in creation order.
    async fn feed_rules(&self, domain: &str) -> Result<Vec<FeedTargetingRecord>>;

    async fn pages(&self, domain: &str) -> Result<Vec<PublishedPage>>;

    /// Every domain with a rule or a published page.
    async fn domains(&self) -> Result<Vec<String>>;
}

pub struct TargetingRepo {
    pool: PgPool,
}

impl TargetingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct FeedRuleRow {
    id: Uuid,
    domain: String,
    kind: String,
    value: String,
    search_id: String,
    phrase: Option<String>,
    specificity: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<FeedRuleRow> for FeedTargetingRecord {
    type Error = WorkerError;

    fn try_from(row: FeedRuleRow) -> Result<Self> {
        let kind = row
            .kind
            .parse::<RuleKind>()
            .map_err(|error| WorkerError::Validation(error.to_string()))?;
        Ok(Self {
            id: row.id,
            domain: row.domain,
            kind,
            value: row.value,
            search_id: row.search_id,
            phrase: row.phrase,
            specificity: row.specificity,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NextPageRuleRow {
    id: Uuid,
    domain: String,
    kind: String,
    value: String,
    section: String,
    lookback_days: i32,
    item_limit: i32,
    specificity: i32,
    created_at: DateTime<Utc>,
}

impl TryFrom<NextPageRuleRow> for NextPageTargetingRecord {
    type Error = WorkerError;

    fn try_from(row: NextPageRuleRow) -> Result<Self> {
        let kind = row
            .kind
            .parse::<RuleKind>()
            .map_err(|error| WorkerError::Validation(error.to_string()))?;
        Ok(Self {
            id: row.id,
            domain: row.domain,
            kind,
            value: row.value,
            section: row.section,
            lookback_days: row.lookback_days,
            item_limit: row.item_limit,
            specificity: row.specificity,
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl RuleStore for TargetingRepo {
    async fn upsert_next_page_rule(
        &self,
        domain: &str,
        kind: RuleKind,
        value: &str,
        section: &str,
        lookback_days: i32,
        item_limit: i32,
    ) -> Result<NextPageTargetingRecord> {
        let row = sqlx::query_as::<_, NextPageRuleRow>(
            r#"
            INSERT INTO next_page_targeting
                (domain, kind, value, section, lookback_days, item_limit, specificity)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (domain, kind, value, section)
            DO UPDATE SET
                lookback_days = EXCLUDED.lookback_days,
                item_limit = EXCLUDED.item_limit,
                deleted_at = NULL
            RETURNING id, domain, kind, value, section, lookback_days,
                      item_limit, specificity, created_at
            "#,
        )
        .bind(domain.to_lowercase())
        .bind(kind.as_str())
        .bind(value)
        .bind(section.to_lowercase())
        .bind(lookback_days)
        .bind(item_limit)
        .bind(specificity(kind, value))
        .fetch_one(&self.pool)
        .await?;

        info!(
            rule_id = %row.id,
            domain,
            section,
            "next-page targeting rule upserted"
        );
        row.try_into()
    }

    async fn next_page_rules(&self, domain: &str) -> Result<Vec<NextPageTargetingRecord>> {
        let rows = sqlx::query_as::<_, NextPageRuleRow>(
            r#"
            SELECT id, domain, kind, value, section, lookback_days,
                   item_limit, specificity, created_at
            FROM next_page_targeting
            WHERE domain = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(domain.to_lowercase())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn feed_rules(&self, domain: &str) -> Result<Vec<FeedTargetingRecord>> {
        let rows = sqlx::query_as::<_, FeedRuleRow>(
            r#"
            SELECT id, domain, kind, value, search_id, phrase, specificity, created_at
            FROM feed_targeting
            WHERE domain = $1 AND deleted_at IS NULL
            ORDER BY created_at ASC
            "#,
        )
        .bind(domain.to_lowercase())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn pages(&self, domain: &str) -> Result<Vec<PublishedPage>> {
        let pages = sqlx::query_as::<_, PublishedPage>(
            r#"
            SELECT domain, pathname, search_id
            FROM published_pages
            WHERE domain = $1
            ORDER BY created_at ASC
            "#,
        )
        .bind(domain.to_lowercase())
        .fetch_all(&self.pool)
        .await?;
        Ok(pages)
    }

    async fn domains(&self) -> Result<Vec<String>> {
        let domains = sqlx::query_scalar::<_, String>(
            r#"
            SELECT domain FROM feed_targeting WHERE deleted_at IS NULL
            UNION
            SELECT domain FROM next_page_targeting WHERE deleted_at IS NULL
            UNION
            SELECT domain FROM published_pages
            ORDER BY 1
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(domains)
    }
}
