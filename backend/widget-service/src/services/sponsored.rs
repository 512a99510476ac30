use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::models::SponsoredItem;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SponsoredSource: Send + Sync {
    async fn sponsored_items(&self) -> Result<Vec<SponsoredItem>>;
}

/// Best-effort fetch under a fixed budget. Timeout or error yields an empty
/// list so the sponsored branch can never delay the primary render.
pub async fn fetch_with_budget(
    source: &dyn SponsoredSource,
    budget: Duration,
) -> Vec<SponsoredItem> {
    match timeout(budget, source.sponsored_items()).await {
        Ok(Ok(items)) => items,
        Ok(Err(error)) => {
            debug!(%error, "sponsored fetch failed");
            Vec::new()
        }
        Err(_) => {
            debug!(budget_ms = budget.as_millis() as u64, "sponsored fetch timed out");
            Vec::new()
        }
    }
}

/// HTTP sponsored-content provider.
pub struct HttpSponsoredSource {
    http: reqwest::Client,
    endpoint: String,
}

#[derive(Debug, Deserialize)]
struct SponsoredDocument {
    #[serde(default)]
    items: Vec<SponsoredWireItem>,
}

#[derive(Debug, Deserialize)]
struct SponsoredWireItem {
    headline: String,
    url: String,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    brand: Option<String>,
}

impl HttpSponsoredSource {
    pub fn new(endpoint: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint,
        }
    }
}

#[async_trait]
impl SponsoredSource for HttpSponsoredSource {
    async fn sponsored_items(&self) -> Result<Vec<SponsoredItem>> {
        let response = self.http.get(&self.endpoint).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "sponsored endpoint returned {}",
                response.status()
            )));
        }
        let document: SponsoredDocument = response.json().await?;
        Ok(document
            .items
            .into_iter()
            .map(|item| SponsoredItem {
                title: item.headline,
                url: item.url,
                image_url: item.image,
                brand: item.brand,
            })
            .collect())
    }
}
