use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use manifest_schema::{section_manifest_key, SectionArticle, SectionManifest};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use targeting_core::RuleKind;
use tracing::{error, info, warn};

use super::BatchStats;
use crate::analytics::AnalyticsStore;
use crate::crawler::MetadataCrawler;
use crate::db::{NextPageTargetingRecord, RuleStore};
use crate::error::{Result, WorkerError};
use crate::store::ObjectStore;

pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
pub const DEFAULT_ITEM_LIMIT: u32 = 10;

/// One section build: which domain, which targeting rule scopes the
/// analytics query, and how much history to consider.
#[derive(Debug, Clone)]
pub struct SectionBuildJob {
    pub domain: String,
    pub kind: RuleKind,
    pub value: String,
    /// Section name; derived from the rule value when absent.
    pub section: Option<String>,
    pub lookback_days: u32,
    pub limit: u32,
}

impl SectionBuildJob {
    pub fn new(domain: &str, kind: RuleKind, value: &str) -> Self {
        Self {
            domain: domain.to_lowercase(),
            kind,
            value: value.to_string(),
            section: None,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            limit: DEFAULT_ITEM_LIMIT,
        }
    }

    pub fn from_record(record: &NextPageTargetingRecord) -> Self {
        Self {
            domain: record.domain.clone(),
            kind: record.kind,
            value: record.value.clone(),
            section: Some(record.section.clone()),
            lookback_days: record.lookback_days.max(0) as u32,
            limit: record.item_limit.max(0) as u32,
        }
    }

    /// Rejects out-of-range inputs before any network work happens.
    pub fn validate(&self) -> Result<()> {
        if !(1..=90).contains(&self.lookback_days) {
            return Err(WorkerError::Validation(format!(
                "lookback days must be between 1 and 90, got {}",
                self.lookback_days
            )));
        }
        if !(1..=50).contains(&self.limit) {
            return Err(WorkerError::Validation(format!(
                "item limit must be between 1 and 50, got {}",
                self.limit
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct SectionOutcome {
    pub section: String,
    pub articles: usize,
}

/// Builds "next recommended page" section manifests: analytics popularity
/// in, crawled metadata merged, published as a section manifest plus an
/// upserted targeting rule.
pub struct SectionBuilder {
    analytics: Arc<dyn AnalyticsStore>,
    crawler: Arc<dyn MetadataCrawler>,
    rules: Arc<dyn RuleStore>,
    store: Arc<dyn ObjectStore>,
    concurrency: usize,
    dry_run: bool,
}

impl SectionBuilder {
    pub fn new(
        analytics: Arc<dyn AnalyticsStore>,
        crawler: Arc<dyn MetadataCrawler>,
        rules: Arc<dyn RuleStore>,
        store: Arc<dyn ObjectStore>,
        concurrency: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            analytics,
            crawler,
            rules,
            store,
            concurrency: concurrency.max(1),
            dry_run,
        }
    }

    /// Runs every job, isolating failures: one bad section never stops the
    /// rest of the batch.
    pub async fn run_batch(&self, jobs: Vec<SectionBuildJob>) -> BatchStats {
        let started = Instant::now();
        let mut stats = BatchStats::begin();

        for job in jobs {
            stats.jobs_seen += 1;
            match self.build(&job).await {
                Ok(outcome) => {
                    stats.jobs_succeeded += 1;
                    stats.articles_crawled += outcome.articles as u32;
                    if !self.dry_run {
                        stats.manifests_written += 1;
                    }
                    info!(
                        domain = %job.domain,
                        section = %outcome.section,
                        articles = outcome.articles,
                        "section manifest built"
                    );
                }
                Err(err) => {
                    stats.jobs_failed += 1;
                    error!(
                        domain = %job.domain,
                        value = %job.value,
                        error = %err,
                        "section build failed"
                    );
                    stats.failures.push(format!("{}/{}: {err}", job.domain, job.value));
                }
            }
        }

        stats.finish(started);
        stats
    }

    pub async fn build(&self, job: &SectionBuildJob) -> Result<SectionOutcome> {
        job.validate()?;
        let section = match &job.section {
            Some(name) => generate_section_name(name)?,
            None => generate_section_name(&job.value)?,
        };

        let popular = self
            .analytics
            .top_pathnames(&job.domain, job.kind, &job.value, job.lookback_days, job.limit)
            .await?;
        if popular.is_empty() {
            return Err(WorkerError::Analytics(format!(
                "no popular pathnames for {} matching '{}'",
                job.domain, job.value
            )));
        }

        let mut articles = self.crawl_articles(&job.domain, popular).await;
        if articles.is_empty() {
            return Err(WorkerError::Crawl(format!(
                "no articles survived crawling for {}/{}",
                job.domain, section
            )));
        }
        sort_articles(&mut articles);

        let manifest = SectionManifest {
            section: section.clone(),
            articles,
            updated_at: Utc::now(),
            lookback_days: job.lookback_days,
            limit: job.limit,
        };
        let article_count = manifest.articles.len();
        let key = section_manifest_key(&job.domain, &section);

        if self.dry_run {
            info!(
                key,
                articles = article_count,
                "dry run: would write section manifest and upsert rule"
            );
        } else {
            self.store
                .put_json(&key, serde_json::to_string(&manifest)?)
                .await?;
            self.rules
                .upsert_next_page_rule(
                    &job.domain,
                    job.kind,
                    &job.value,
                    &section,
                    job.lookback_days as i32,
                    job.limit as i32,
                )
                .await?;
        }

        Ok(SectionOutcome {
            section,
            articles: article_count,
        })
    }

    /// Bounded crawl fan-out. A failed crawl drops the article, never the
    /// batch; order is restored by the sort afterwards.
    async fn crawl_articles(
        &self,
        domain: &str,
        popular: Vec<crate::analytics::PopularPath>,
    ) -> Vec<SectionArticle> {
        stream::iter(popular.into_iter().map(|path| {
            let crawler = Arc::clone(&self.crawler);
            let url = format!("https://{}{}", domain, path.pathname);
            async move {
                match crawler.page_metadata(&url).await {
                    Ok(meta) => Some(SectionArticle {
                        url,
                        title: meta.title,
                        image_url: meta.image_url,
                        published_time: meta.published_time,
                        view_count: path.view_count,
                    }),
                    Err(err) => {
                        warn!(%url, error = %err, "dropping article after failed crawl");
                        None
                    }
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .filter_map(|article| async move { article })
        .collect()
        .await
    }
}

/// Lowercase slug for a section: non-alphanumeric runs collapse to one
/// dash, leading and trailing dashes trimmed.
pub fn generate_section_name(value: &str) -> Result<String> {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for ch in value.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if slug.is_empty() {
        return Err(WorkerError::Validation(format!(
            "cannot derive a section name from '{value}'"
        )));
    }
    Ok(slug)
}

/// Calendar date of an article's published time, or `None` when absent or
/// unparseable.
fn published_date(article: &SectionArticle) -> Option<NaiveDate> {
    let raw = article.published_time.as_deref()?;
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc).date_naive());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Date groups most-recent-first, view count descending within a date,
/// undated articles last. The ordering is total over the sort key, so
/// sorting an already-sorted list is a no-op.
pub fn sort_articles(articles: &mut [SectionArticle]) {
    articles.sort_by(|a, b| {
        match (published_date(a), published_date(b)) {
            (Some(da), Some(db)) => db.cmp(&da),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
        .then_with(|| b.view_count.cmp(&a.view_count))
    });
}
