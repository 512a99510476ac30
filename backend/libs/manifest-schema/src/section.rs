use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Per-topic "next recommended page" manifest, built offline and read by the
/// widget when a next-page rule matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionManifest {
    pub section: String,
    pub articles: Vec<SectionArticle>,
    pub updated_at: DateTime<Utc>,
    pub lookback_days: u32,
    pub limit: u32,
}

/// One candidate article. `published_time` is the raw value extracted from
/// the page's `article:published_time` meta tag and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionArticle {
    pub url: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_time: Option<String>,
    pub view_count: u64,
}
