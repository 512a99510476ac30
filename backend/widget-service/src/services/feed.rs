use manifest_schema::{immersive_ref, FeedDocument};
use std::collections::HashMap;

use super::cdn::FeedLoader;
use crate::error::Result;
use crate::models::FeedEntry;

/// Feed cache scoped to exactly one page view.
///
/// Created when a view starts resolving and dropped when the response goes
/// out, so there is no cross-request state. Get-or-load checks before
/// fetching, which keeps a repeated content ref from loading twice within
/// the view.
#[derive(Debug, Default)]
pub struct FeedCache {
    entries: HashMap<String, Vec<FeedEntry>>,
}

impl FeedCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get_or_load(
        &mut self,
        loader: &dyn FeedLoader,
        content_ref: &str,
    ) -> Result<&[FeedEntry]> {
        if !self.entries.contains_key(content_ref) {
            let document = loader.load_feed(content_ref).await?;
            self.entries
                .insert(content_ref.to_string(), prepare_entries(document));
        }
        Ok(self
            .entries
            .get(content_ref)
            .map(Vec::as_slice)
            .unwrap_or(&[]))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Load pipeline for a raw feed document: entries without a thumbnail are
/// dropped, survivors get their immersive detail reference, and the result
/// is quality sorted.
pub fn prepare_entries(document: FeedDocument) -> Vec<FeedEntry> {
    let mut entries: Vec<FeedEntry> = document
        .shopping_results
        .into_iter()
        .filter_map(|item| {
            let thumbnail = item.thumbnails.into_iter().next()?;
            Some(FeedEntry {
                immersive_url: immersive_ref(&item.product_id),
                id: item.product_id,
                rating: item.rating,
                review_count: item.reviews,
                thumbnail,
                data_source: item.data_source,
            })
        })
        .collect();
    quality_sort(&mut entries);
    entries
}

/// Static quality order, used as the base ordering before any popularity
/// signal applies: review-count tier first, rating as the tie-break.
/// A missing rating sorts below a zero rating.
pub fn quality_sort(entries: &mut [FeedEntry]) {
    entries.sort_by(|a, b| {
        let tier_a = review_tier(a.review_count.unwrap_or(0));
        let tier_b = review_tier(b.review_count.unwrap_or(0));
        tier_b.cmp(&tier_a).then_with(|| {
            let rating_a = a.rating.unwrap_or(-1.0);
            let rating_b = b.rating.unwrap_or(-1.0);
            rating_b.total_cmp(&rating_a)
        })
    });
}

fn review_tier(reviews: i64) -> u8 {
    if reviews >= 100 {
        3
    } else if reviews >= 10 {
        2
    } else {
        1
    }
}
