use manifest_schema::{IndexedManifest, SectionArticle};
use std::collections::HashSet;
use targeting_core::{compact_hash, first_match, PageContext};
use tracing::debug;
use url::Url;

use super::cdn::ManifestSource;

/// Next-page augmentation for one page view.
///
/// Evaluates the manifest's next-page rule table (separate from feed
/// targeting), fetches the section manifest the first matching rule names,
/// and drops anything the visitor is on or has already seen. Every failure
/// path returns an empty list.
pub async fn next_page_items(
    manifests: &dyn ManifestSource,
    manifest: &IndexedManifest,
    ctx: &PageContext,
    visited: &[String],
) -> Vec<SectionArticle> {
    let rule = match first_match(&manifest.next_page_targeting, ctx) {
        Some(rule) => rule,
        None => return Vec::new(),
    };

    let section = match manifests.section_manifest(&rule.manifest).await {
        Ok(section) => section,
        Err(error) => {
            debug!(%error, section = %rule.section, "section manifest unavailable");
            return Vec::new();
        }
    };

    filter_seen(section.articles, ctx.pathname(), visited)
}

/// Removes the current page and any article whose pathname hash appears in
/// the visitor's visited set.
pub fn filter_seen(
    articles: Vec<SectionArticle>,
    current_path: &str,
    visited: &[String],
) -> Vec<SectionArticle> {
    let visited: HashSet<&str> = visited.iter().map(String::as_str).collect();
    articles
        .into_iter()
        .filter(|article| match Url::parse(&article.url) {
            Ok(parsed) => {
                let path = parsed.path();
                path != current_path && !visited.contains(compact_hash(path).as_str())
            }
            Err(_) => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::services::cdn::MockManifestSource;
    use chrono::Utc;
    use manifest_schema::{NextPageRule, SectionManifest};
    use targeting_core::RuleKind;

    fn article(url: &str) -> SectionArticle {
        SectionArticle {
            url: url.to_string(),
            title: "t".to_string(),
            image_url: None,
            published_time: None,
            view_count: 1,
        }
    }

    fn ctx(url: &str) -> PageContext {
        PageContext::new(Url::parse(url).unwrap(), None, Vec::new())
    }

    fn manifest_with_rule() -> IndexedManifest {
        IndexedManifest {
            next_page_targeting: vec![NextPageRule {
                kind: RuleKind::PathSubstring,
                value: "/nba/".to_string(),
                section: "nba".to_string(),
                manifest: "example.com/next-page/nba/manifest.json".to_string(),
                priority: 2,
            }],
            ..IndexedManifest::default()
        }
    }

    #[test]
    fn test_filter_removes_current_page() {
        let articles = vec![
            article("https://example.com/nba/game-7"),
            article("https://example.com/nba/draft"),
        ];
        let kept = filter_seen(articles, "/nba/game-7", &[]);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://example.com/nba/draft");
    }

    #[test]
    fn test_filter_removes_visited_hashes() {
        let articles = vec![
            article("https://example.com/nba/game-7"),
            article("https://example.com/nba/draft"),
        ];
        let visited = vec![compact_hash("/nba/draft")];
        let kept = filter_seen(articles, "/other", &visited);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].url, "https://example.com/nba/game-7");
    }

    #[test]
    fn test_filter_keeps_unparseable_urls() {
        let articles = vec![article("not a url")];
        assert_eq!(filter_seen(articles, "/x", &[]).len(), 1);
    }

    #[tokio::test]
    async fn test_no_matching_rule_returns_empty() {
        let manifests = MockManifestSource::new();
        let items = next_page_items(
            &manifests,
            &manifest_with_rule(),
            &ctx("https://example.com/cooking/pasta"),
            &[],
        )
        .await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_match_fetches_section_and_filters() {
        let mut manifests = MockManifestSource::new();
        manifests
            .expect_section_manifest()
            .withf(|key| key == "example.com/next-page/nba/manifest.json")
            .returning(|_| {
                Ok(SectionManifest {
                    section: "nba".to_string(),
                    articles: vec![
                        SectionArticle {
                            url: "https://example.com/nba/game-7".to_string(),
                            title: "Game 7".to_string(),
                            image_url: None,
                            published_time: None,
                            view_count: 10,
                        },
                        SectionArticle {
                            url: "https://example.com/nba/draft".to_string(),
                            title: "Draft".to_string(),
                            image_url: None,
                            published_time: None,
                            view_count: 5,
                        },
                    ],
                    updated_at: Utc::now(),
                    lookback_days: 30,
                    limit: 10,
                })
            });

        let items = next_page_items(
            &manifests,
            &manifest_with_rule(),
            &ctx("https://example.com/nba/game-7"),
            &[],
        )
        .await;
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Draft");
    }

    #[tokio::test]
    async fn test_section_fetch_failure_returns_empty() {
        let mut manifests = MockManifestSource::new();
        manifests
            .expect_section_manifest()
            .returning(|_| Err(AppError::NotFound("no manifest".to_string())));

        let items = next_page_items(
            &manifests,
            &manifest_with_rule(),
            &ctx("https://example.com/nba/game-7"),
            &[],
        )
        .await;
        assert!(items.is_empty());
    }
}
