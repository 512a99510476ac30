use async_trait::async_trait;
use manifest_schema::{FeedDocument, PageManifest, SectionManifest};
use serde::de::DeserializeOwned;
use std::time::Duration;

use crate::error::{AppError, Result};

/// Read side of the manifest pipeline.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn page_manifest(&self, domain: &str) -> Result<PageManifest>;
    /// `key` is the full object key a next-page rule carries.
    async fn section_manifest(&self, key: &str) -> Result<SectionManifest>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait FeedLoader: Send + Sync {
    async fn load_feed(&self, content_ref: &str) -> Result<FeedDocument>;
}

/// Ranked id list used as the exploit signal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TopItemsSource: Send + Sync {
    async fn top_items(&self, domain: &str) -> Result<Vec<String>>;
}

/// HTTP client for the CDN all per-domain artifacts are served from.
pub struct CdnClient {
    http: reqwest::Client,
    base_url: String,
}

impl CdnClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let url = self.object_url(key);
        let response = self.http.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::Upstream(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ManifestSource for CdnClient {
    async fn page_manifest(&self, domain: &str) -> Result<PageManifest> {
        self.get_json(&manifest_schema::manifest_key(domain)).await
    }

    async fn section_manifest(&self, key: &str) -> Result<SectionManifest> {
        self.get_json(key).await
    }
}

#[async_trait]
impl FeedLoader for CdnClient {
    async fn load_feed(&self, content_ref: &str) -> Result<FeedDocument> {
        self.get_json(content_ref).await
    }
}

#[async_trait]
impl TopItemsSource for CdnClient {
    async fn top_items(&self, domain: &str) -> Result<Vec<String>> {
        self.get_json(&manifest_schema::top_items_key(domain)).await
    }
}
