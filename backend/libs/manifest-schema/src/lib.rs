//! Wire formats shared by the writer (section-worker) and reader
//! (widget-service) sides of the manifest pipeline.
//!
//! Keeping these in one crate prevents the two halves drifting apart as the
//! documents evolve.

pub mod feed;
pub mod manifest;
pub mod section;

pub use feed::{FeedDocument, FeedItem};
pub use manifest::{FeedRule, IndexedManifest, NextPageRule, PageManifest};
pub use section::{SectionArticle, SectionManifest};

/// Cache policy applied to every manifest object written to the store:
/// edge-cacheable for five minutes, never cached by the browser.
pub const MANIFEST_CACHE_CONTROL: &str =
    "public, s-maxage=300, no-cache, must-revalidate, max-age=0";

/// Conventional object keys for per-domain artifacts.
pub fn manifest_key(domain: &str) -> String {
    format!("{domain}/manifest.json")
}

pub fn section_manifest_key(domain: &str, section: &str) -> String {
    format!("{domain}/next-page/{section}/manifest.json")
}

pub fn legacy_page_ref(domain: &str, path_hash: &str) -> String {
    format!("{domain}/pages/{path_hash}/index.json")
}

pub fn search_results_ref(search_id: &str) -> String {
    format!("searches/{search_id}/results.json")
}

pub fn fallback_feed_ref(apex_host: &str) -> String {
    format!("pubs/{apex_host}/fallback.json")
}

pub fn top_items_key(domain: &str) -> String {
    format!("{domain}/top-products.json")
}

pub fn immersive_ref(product_id: &str) -> String {
    format!("products/{product_id}/immersive.json")
}
