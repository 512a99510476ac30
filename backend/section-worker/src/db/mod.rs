use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::DatabaseConfig;
use crate::error::Result;

pub mod rules_repo;

pub use rules_repo::{
    FeedTargetingRecord, NextPageTargetingRecord, PublishedPage, RuleStore, TargetingRepo,
};

#[cfg(test)]
pub use rules_repo::MockRuleStore;

/// Connects the rule-table pool and optionally applies migrations.
pub async fn connect(config: &DatabaseConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await?;
    if config.migrate {
        sqlx::migrate!("./migrations").run(&pool).await?;
    }
    Ok(pool)
}
