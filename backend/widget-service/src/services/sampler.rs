use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use tracing::debug;

use super::cdn::TopItemsSource;
use crate::models::FeedEntry;

/// Which ordering the sampler applied to a page view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleStrategy {
    /// Entries ordered by the external top-items signal.
    Exploit,
    /// Entries fully shuffled to gather fresh signal.
    Explore,
}

/// Explore/exploit reordering of a loaded feed.
///
/// Returning visitors (impression counter at least 1) always get a fresh
/// shuffle. First-impression visitors exploit the top-items order with the
/// configured probability and explore otherwise. Losing the exploit signal
/// degrades to a shuffle and never blocks rendering.
pub struct PopularitySampler {
    exploit_probability: f64,
}

impl PopularitySampler {
    pub fn new(exploit_probability: f64) -> Self {
        Self {
            exploit_probability,
        }
    }

    pub async fn order<R: Rng>(
        &self,
        domain: &str,
        entries: &mut [FeedEntry],
        impressions: u32,
        top_items: &dyn TopItemsSource,
        rng: &mut R,
    ) -> SampleStrategy {
        if impressions >= 1 {
            entries.shuffle(rng);
            return SampleStrategy::Explore;
        }

        if rng.gen::<f64>() < self.exploit_probability {
            match top_items.top_items(domain).await {
                Ok(top_ids) => {
                    exploit_order(entries, &top_ids);
                    return SampleStrategy::Exploit;
                }
                Err(error) => {
                    debug!(%error, %domain, "top items unavailable, exploring instead");
                }
            }
        }

        entries.shuffle(rng);
        SampleStrategy::Explore
    }
}

/// Stable sort by position in the top list. Ids absent from the list sort
/// after every present id and keep their existing relative order.
pub fn exploit_order(entries: &mut [FeedEntry], top_ids: &[String]) {
    let positions: HashMap<&str, usize> = top_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (id.as_str(), index))
        .collect();
    entries.sort_by_key(|entry| {
        positions
            .get(entry.id.as_str())
            .copied()
            .unwrap_or(usize::MAX)
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::cdn::MockTopItemsSource;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn entries(ids: &[&str]) -> Vec<FeedEntry> {
        ids.iter()
            .map(|id| FeedEntry {
                id: id.to_string(),
                rating: None,
                review_count: None,
                thumbnail: "t.jpg".to_string(),
                immersive_url: format!("products/{id}/immersive.json"),
                data_source: None,
            })
            .collect()
    }

    fn ids(entries: &[FeedEntry]) -> Vec<String> {
        entries.iter().map(|e| e.id.clone()).collect()
    }

    #[test]
    fn test_exploit_order_places_present_ids_first_in_list_order() {
        let mut feed = entries(&["d", "b", "a", "c"]);
        let top: Vec<String> = vec!["a".to_string(), "b".to_string()];
        exploit_order(&mut feed, &top);
        assert_eq!(ids(&feed), vec!["a", "b", "d", "c"]);
    }

    #[test]
    fn test_exploit_order_keeps_absent_ids_stable() {
        let mut feed = entries(&["x", "y", "z"]);
        exploit_order(&mut feed, &[]);
        assert_eq!(ids(&feed), vec!["x", "y", "z"]);
    }

    #[tokio::test]
    async fn test_returning_visitor_output_is_a_permutation() {
        let sampler = PopularitySampler::new(0.8);
        let top = MockTopItemsSource::new();
        let original = entries(&["a", "b", "c", "d", "e"]);

        let mut feed = original.clone();
        let mut rng = StdRng::seed_from_u64(7);
        let strategy = sampler.order("example.com", &mut feed, 3, &top, &mut rng).await;

        assert_eq!(strategy, SampleStrategy::Explore);
        let before: HashSet<String> = ids(&original).into_iter().collect();
        let after: HashSet<String> = ids(&feed).into_iter().collect();
        assert_eq!(before, after);
        assert_eq!(feed.len(), original.len());
    }

    #[tokio::test]
    async fn test_returning_visitor_order_actually_varies() {
        let sampler = PopularitySampler::new(0.8);
        let top = MockTopItemsSource::new();

        let mut leading = HashSet::new();
        for seed in 0..50u64 {
            let mut feed = entries(&["a", "b", "c", "d", "e", "f"]);
            let mut rng = StdRng::seed_from_u64(seed);
            sampler.order("example.com", &mut feed, 1, &top, &mut rng).await;
            leading.insert(feed[0].id.clone());
        }
        assert!(leading.len() > 1, "shuffle never changed the leading element");
    }

    #[tokio::test]
    async fn test_first_impression_exploits_about_eighty_percent() {
        let sampler = PopularitySampler::new(0.8);
        let mut top = MockTopItemsSource::new();
        top.expect_top_items()
            .returning(|_| Ok(vec!["a".to_string(), "b".to_string()]));

        let mut rng = StdRng::seed_from_u64(42);
        let runs = 1000;
        let mut exploits = 0;
        for _ in 0..runs {
            let mut feed = entries(&["a", "b", "c"]);
            let strategy = sampler.order("example.com", &mut feed, 0, &top, &mut rng).await;
            if strategy == SampleStrategy::Exploit {
                exploits += 1;
            }
        }

        let ratio = exploits as f64 / runs as f64;
        assert!(
            (0.75..=0.85).contains(&ratio),
            "exploit ratio {ratio} outside tolerance"
        );
    }

    #[tokio::test]
    async fn test_signal_failure_degrades_to_shuffle() {
        let sampler = PopularitySampler::new(1.0);
        let mut top = MockTopItemsSource::new();
        top.expect_top_items()
            .returning(|_| Err(AppError::Upstream("cdn down".to_string())));

        let mut rng = StdRng::seed_from_u64(11);
        let mut feed = entries(&["a", "b", "c", "d"]);
        let strategy = sampler.order("example.com", &mut feed, 0, &top, &mut rng).await;
        assert_eq!(strategy, SampleStrategy::Explore);
        assert_eq!(feed.len(), 4);
    }

    #[tokio::test]
    async fn test_exploit_path_orders_by_top_list() {
        let sampler = PopularitySampler::new(1.0);
        let mut top = MockTopItemsSource::new();
        top.expect_top_items()
            .returning(|_| Ok(vec!["c".to_string(), "a".to_string()]));

        let mut rng = StdRng::seed_from_u64(5);
        let mut feed = entries(&["a", "b", "c"]);
        let strategy = sampler.order("example.com", &mut feed, 0, &top, &mut rng).await;
        assert_eq!(strategy, SampleStrategy::Exploit);
        assert_eq!(ids(&feed), vec!["c", "a", "b"]);
    }
}
