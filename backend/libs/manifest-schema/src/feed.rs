use serde::{Deserialize, Serialize};

/// Feed document as published to the CDN. Field names are part of the
/// external feed format and stay snake_case.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeedDocument {
    #[serde(default)]
    pub shopping_results: Vec<FeedItem>,
}

/// One raw feed item. Only the fields the resolution pipeline reads are
/// declared; renderers receive the pipeline's own entry type instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub product_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbnails: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<String>,
}
