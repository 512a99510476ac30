use manifest_schema::SectionArticle;
use serde::{Deserialize, Serialize};

/// One page-view resolution request from the embed script.
///
/// Session state (impression counter, visited-path hashes, forced variant)
/// lives in the visitor's cookies; the embed script forwards the current
/// values here because the cookie store is not this service's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveRequest {
    pub url: String,
    pub session_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Rolling impression count for this visitor (7-day horizon).
    #[serde(default)]
    pub impressions: u32,
    /// Compact hashes of pathnames the visitor already viewed.
    #[serde(default)]
    pub visited: Vec<String>,
    /// Section field from the page's ld+json structured data, if any.
    #[serde(default)]
    pub structured_data_section: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Explicit search override from the page's query string.
    #[serde(default)]
    pub override_search_id: Option<String>,
    #[serde(default)]
    pub force_fallback: bool,
    /// Operator-forced experiment variant from the page's query string.
    #[serde(default)]
    pub force_variant: Option<String>,
    #[serde(default = "default_true")]
    pub next_page: bool,
    #[serde(default = "default_true")]
    pub sponsored: bool,
}

fn default_true() -> bool {
    true
}

/// A feed item ready for the rendering layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntry {
    pub id: String,
    pub rating: Option<f64>,
    pub review_count: Option<i64>,
    pub thumbnail: String,
    pub immersive_url: String,
    pub data_source: Option<String>,
}

/// Which cascade step produced the resolved feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedSource {
    Manifest,
    ManifestLegacy,
    LegacyIndex,
    Targeting,
    Override,
    Fallback,
}

/// Internal result of the resolution steps, before the feed is loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedFeed {
    pub content_ref: String,
    pub search_id: Option<String>,
    pub source: ResolvedSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SponsoredItem {
    pub title: String,
    pub url: String,
    pub image_url: Option<String>,
    pub brand: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentAssignment {
    pub experiment: String,
    pub variant: String,
    pub forced: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub feed: Vec<FeedEntry>,
    pub source: Option<ResolvedSource>,
    pub search_id: Option<String>,
    pub next_page: Vec<SectionArticle>,
    pub sponsored: Vec<SponsoredItem>,
    pub experiments: Vec<ExperimentAssignment>,
}

impl ResolveResponse {
    /// The "widget does not render" outcome: nothing resolved, nothing loads.
    pub fn empty() -> Self {
        Self {
            feed: Vec::new(),
            source: None,
            search_id: None,
            next_page: Vec::new(),
            sponsored: Vec::new(),
            experiments: Vec::new(),
        }
    }
}
