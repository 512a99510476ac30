use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use section_worker::analytics::{AnalyticsStore, ClickHouseAnalytics};
use section_worker::crawler::{HttpCrawler, MetadataCrawler};
use section_worker::db::{self, RuleStore, TargetingRepo};
use section_worker::jobs::{BatchStats, ManifestPublisher, SectionBuildJob, SectionBuilder};
use section_worker::store::{ObjectStore, S3ManifestStore};
use section_worker::{RunMode, WorkerConfig};

#[tokio::main]
async fn main() {
    // Structured logging with JSON format
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_line_number(true)
                .with_file(true)
                .with_target(true),
        )
        .init();

    let config = match WorkerConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("Configuration loading failed: {:#}", e);
            eprintln!("ERROR: Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    info!("Starting section-worker v{}", env!("CARGO_PKG_VERSION"));
    info!(
        mode = ?config.run.mode,
        dry_run = config.run.dry_run,
        run_once = config.run.run_once,
        "Run configuration loaded"
    );

    let pool = match db::connect(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Database connection failed: {:#}", e);
            eprintln!("ERROR: Failed to connect to the rule database: {}", e);
            std::process::exit(1);
        }
    };

    let crawler = match HttpCrawler::new(&config.crawl) {
        Ok(crawler) => crawler,
        Err(e) => {
            tracing::error!("Crawler initialization failed: {:#}", e);
            eprintln!("ERROR: Failed to build the HTTP crawler: {}", e);
            std::process::exit(1);
        }
    };

    let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let s3 = aws_sdk_s3::Client::new(&aws);

    let rules: Arc<dyn RuleStore> = Arc::new(TargetingRepo::new(pool));
    let store: Arc<dyn ObjectStore> =
        Arc::new(S3ManifestStore::new(s3, &config.store.bucket));
    let analytics: Arc<dyn AnalyticsStore> =
        Arc::new(ClickHouseAnalytics::new(&config.analytics));
    let crawler: Arc<dyn MetadataCrawler> = Arc::new(crawler);

    let builder = SectionBuilder::new(
        analytics,
        crawler,
        Arc::clone(&rules),
        Arc::clone(&store),
        config.crawl.concurrency,
        config.run.dry_run,
    );
    let publisher = ManifestPublisher::new(
        Arc::clone(&rules),
        Arc::clone(&store),
        config.run.dry_run,
    );

    loop {
        run_pass(&config, rules.as_ref(), &builder, &publisher).await;
        if config.run.run_once {
            break;
        }
        info!(
            interval_secs = config.run.interval_secs,
            "Pass complete, sleeping until the next one"
        );
        tokio::time::sleep(Duration::from_secs(config.run.interval_secs)).await;
    }
}

/// One full worker pass. Sections run before manifests so freshly built
/// section manifests are embedded into the same pass's domain manifests.
async fn run_pass(
    config: &WorkerConfig,
    rules: &dyn RuleStore,
    builder: &SectionBuilder,
    publisher: &ManifestPublisher,
) {
    let domains = if config.run.domains.is_empty() {
        match rules.domains().await {
            Ok(domains) => domains,
            Err(e) => {
                error!(error = %e, "Failed to list domains, skipping pass");
                return;
            }
        }
    } else {
        config.run.domains.clone()
    };
    if domains.is_empty() {
        warn!("No domains to process");
        return;
    }

    if matches!(config.run.mode, RunMode::Sections | RunMode::All) {
        let mut jobs = Vec::new();
        for domain in &domains {
            match rules.next_page_rules(domain).await {
                Ok(records) => {
                    jobs.extend(records.iter().map(SectionBuildJob::from_record));
                }
                Err(e) => {
                    error!(domain, error = %e, "Failed to load next-page rules");
                }
            }
        }
        let stats = builder.run_batch(jobs).await;
        log_stats("sections", &stats);
    }

    if matches!(config.run.mode, RunMode::Manifests | RunMode::All) {
        let stats = publisher.publish_all(&domains).await;
        log_stats("manifests", &stats);
    }
}

fn log_stats(phase: &str, stats: &BatchStats) {
    info!(
        phase,
        jobs_seen = stats.jobs_seen,
        jobs_succeeded = stats.jobs_succeeded,
        jobs_failed = stats.jobs_failed,
        articles_crawled = stats.articles_crawled,
        manifests_written = stats.manifests_written,
        duration_ms = stats.duration_ms,
        "Batch pass finished"
    );
    for failure in &stats.failures {
        warn!(phase, failure, "Job failed during pass");
    }
}
