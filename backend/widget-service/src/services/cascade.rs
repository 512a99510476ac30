use manifest_schema::{
    fallback_feed_ref, legacy_page_ref, search_results_ref, IndexedManifest, PageManifest,
    SectionArticle,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use targeting_core::{first_match, path_hash, PageContext};
use tracing::{debug, info, warn};

use super::cdn::{FeedLoader, ManifestSource, TopItemsSource};
use super::experiments::{exposure_payload, ExperimentBucketer, ExperimentDefinition};
use super::feed::FeedCache;
use super::next_page;
use super::sampler::PopularitySampler;
use super::sponsored::{self, SponsoredSource};
use crate::config::Config;
use crate::models::{
    ExperimentAssignment, FeedEntry, ResolveRequest, ResolveResponse, ResolvedFeed,
    ResolvedSource, SponsoredItem,
};

/// The per-page-view decision pipeline.
///
/// One call per page view: resolves which feed to show, loads and orders it,
/// evaluates next-page augmentation and the time-boxed sponsored branch, and
/// buckets the session into every running experiment. Failures at any point
/// degrade toward an empty response; resolution never errors out to the
/// embed script.
pub struct ResolutionService {
    manifests: Arc<dyn ManifestSource>,
    feeds: Arc<dyn FeedLoader>,
    top_items: Arc<dyn TopItemsSource>,
    sponsored: Option<Arc<dyn SponsoredSource>>,
    sampler: PopularitySampler,
    bucketer: ExperimentBucketer,
    experiments: Vec<ExperimentDefinition>,
    sponsored_budget: Duration,
    fallback_enabled: bool,
}

impl ResolutionService {
    pub fn new(
        config: &Config,
        manifests: Arc<dyn ManifestSource>,
        feeds: Arc<dyn FeedLoader>,
        top_items: Arc<dyn TopItemsSource>,
        sponsored: Option<Arc<dyn SponsoredSource>>,
    ) -> Self {
        Self {
            manifests,
            feeds,
            top_items,
            sponsored,
            sampler: PopularitySampler::new(config.sampler.exploit_probability),
            bucketer: ExperimentBucketer::new(),
            experiments: config.experiments.definitions.clone(),
            sponsored_budget: Duration::from_millis(config.sponsored.timeout_ms),
            fallback_enabled: config.cdn.fallback_enabled,
        }
    }

    pub async fn resolve(&self, request: &ResolveRequest, ctx: &PageContext) -> ResolveResponse {
        let experiments = self.assign_experiments(request);

        let domain = match ctx.apex_host() {
            Some(domain) => domain.to_string(),
            None => {
                warn!(url = ctx.full_url(), "page url has no host, nothing to resolve");
                return ResolveResponse {
                    experiments,
                    ..ResolveResponse::empty()
                };
            }
        };

        let manifest = match self.manifests.page_manifest(&domain).await {
            Ok(manifest) => Some(manifest),
            Err(error) => {
                debug!(%error, %domain, "manifest fetch failed, continuing unresolved");
                None
            }
        };

        let resolved = resolve_content(
            &domain,
            ctx,
            manifest.as_ref(),
            request,
            self.fallback_enabled,
        );

        let indexed = match &manifest {
            Some(PageManifest::Indexed(indexed)) => Some(indexed),
            _ => None,
        };

        let mut feed_cache = FeedCache::new();
        let (feed, next_page, sponsored) = tokio::join!(
            self.load_feed(&domain, resolved.as_ref(), request, &mut feed_cache),
            self.load_next_page(indexed, ctx, request),
            self.load_sponsored(request),
        );

        info!(
            %domain,
            path = ctx.pathname(),
            source = ?resolved.as_ref().map(|r| r.source),
            feed_len = feed.len(),
            next_page_len = next_page.len(),
            "page view resolved"
        );

        ResolveResponse {
            feed,
            source: resolved.as_ref().map(|r| r.source),
            search_id: resolved.and_then(|r| r.search_id),
            next_page,
            sponsored,
            experiments,
        }
    }

    async fn load_feed(
        &self,
        domain: &str,
        resolved: Option<&ResolvedFeed>,
        request: &ResolveRequest,
        cache: &mut FeedCache,
    ) -> Vec<FeedEntry> {
        let resolved = match resolved {
            Some(resolved) => resolved,
            None => return Vec::new(),
        };

        let mut entries = match cache.get_or_load(self.feeds.as_ref(), &resolved.content_ref).await
        {
            Ok(entries) => entries.to_vec(),
            Err(error) => {
                warn!(%error, content_ref = %resolved.content_ref, "feed load failed, widget will not render");
                return Vec::new();
            }
        };

        let mut rng = StdRng::from_entropy();
        let strategy = self
            .sampler
            .order(
                domain,
                &mut entries,
                request.impressions,
                self.top_items.as_ref(),
                &mut rng,
            )
            .await;
        debug!(?strategy, entries = entries.len(), "feed ordered");
        entries
    }

    async fn load_next_page(
        &self,
        indexed: Option<&IndexedManifest>,
        ctx: &PageContext,
        request: &ResolveRequest,
    ) -> Vec<SectionArticle> {
        if !request.next_page {
            return Vec::new();
        }
        let indexed = match indexed {
            Some(indexed) => indexed,
            None => return Vec::new(),
        };
        next_page::next_page_items(self.manifests.as_ref(), indexed, ctx, &request.visited).await
    }

    async fn load_sponsored(&self, request: &ResolveRequest) -> Vec<SponsoredItem> {
        if !request.sponsored {
            return Vec::new();
        }
        let source = match &self.sponsored {
            Some(source) => source,
            None => return Vec::new(),
        };
        sponsored::fetch_with_budget(source.as_ref(), self.sponsored_budget).await
    }

    fn assign_experiments(&self, request: &ResolveRequest) -> Vec<ExperimentAssignment> {
        let assignments = self.bucketer.assign_all(
            &request.session_id,
            &self.experiments,
            request.force_variant.as_deref(),
        );
        for assignment in &assignments {
            info!(
                target: "experiment_exposure",
                experiment = %assignment.experiment,
                variant = %assignment.variant,
                payload = %exposure_payload(&request.session_id, assignment),
                "experiment assigned"
            );
        }
        assignments
    }
}

/// The short-circuiting resolution steps, in order: exact manifest hit,
/// manifest legacy list, flat legacy index, embedded feed targeting, caller
/// override, per-domain fallback. Returns `None` when nothing applies, in
/// which case the widget does not render.
pub fn resolve_content(
    domain: &str,
    ctx: &PageContext,
    manifest: Option<&PageManifest>,
    request: &ResolveRequest,
    fallback_enabled: bool,
) -> Option<ResolvedFeed> {
    let hash = path_hash(ctx.pathname());

    match manifest {
        Some(PageManifest::Indexed(indexed)) => {
            if let Some(content_ref) = indexed.content_ref(&hash) {
                return Some(ResolvedFeed {
                    content_ref: content_ref.to_string(),
                    search_id: search_id_from_ref(content_ref),
                    source: ResolvedSource::Manifest,
                });
            }

            if indexed.legacy_contains(&hash) {
                if let Some(stand_in) = indexed.first_search_ref() {
                    return Some(ResolvedFeed {
                        content_ref: stand_in.to_string(),
                        search_id: search_id_from_ref(stand_in),
                        source: ResolvedSource::ManifestLegacy,
                    });
                }
            }

            if let Some(rule) = first_match(&indexed.targeting, ctx) {
                return Some(ResolvedFeed {
                    content_ref: search_results_ref(&rule.search_id),
                    search_id: Some(rule.search_id.clone()),
                    source: ResolvedSource::Targeting,
                });
            }
        }
        Some(PageManifest::LegacyList(hashes)) => {
            if hashes.iter().any(|h| h == &hash) {
                return Some(ResolvedFeed {
                    content_ref: legacy_page_ref(domain, &hash),
                    search_id: None,
                    source: ResolvedSource::LegacyIndex,
                });
            }
        }
        None => {}
    }

    if let Some(search_id) = &request.override_search_id {
        return Some(ResolvedFeed {
            content_ref: search_results_ref(search_id),
            search_id: Some(search_id.clone()),
            source: ResolvedSource::Override,
        });
    }

    if request.force_fallback || fallback_enabled {
        return Some(ResolvedFeed {
            content_ref: fallback_feed_ref(domain),
            search_id: None,
            source: ResolvedSource::Fallback,
        });
    }

    None
}

fn search_id_from_ref(content_ref: &str) -> Option<String> {
    let rest = content_ref.strip_prefix("searches/")?;
    let (id, _) = rest.split_once('/')?;
    if id.is_empty() {
        None
    } else {
        Some(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest_schema::FeedRule;
    use targeting_core::RuleKind;
    use url::Url;

    fn ctx(url: &str) -> PageContext {
        PageContext::new(Url::parse(url).unwrap(), None, Vec::new())
    }

    fn request() -> ResolveRequest {
        ResolveRequest {
            url: "https://example.com/article-1".to_string(),
            session_id: "s-1".to_string(),
            user_id: None,
            impressions: 0,
            visited: Vec::new(),
            structured_data_section: None,
            keywords: Vec::new(),
            override_search_id: None,
            force_fallback: false,
            force_variant: None,
            next_page: true,
            sponsored: true,
        }
    }

    fn indexed_for(path: &str, content_ref: &str) -> IndexedManifest {
        let mut indexed = IndexedManifest::default();
        indexed
            .entries
            .insert(path_hash(path), content_ref.to_string());
        indexed
    }

    fn sports_rule(search_id: &str) -> FeedRule {
        FeedRule {
            kind: RuleKind::PathSubstring,
            value: "/sports/".to_string(),
            search_id: search_id.to_string(),
            phrase: None,
        }
    }

    #[test]
    fn test_exact_manifest_hit_wins_without_targeting() {
        let mut indexed = indexed_for("/article-1", "searches/99/results.json");
        // A rule that would also match must not fire on an exact hit.
        indexed.targeting.push(FeedRule {
            kind: RuleKind::PathSubstring,
            value: "/article-".to_string(),
            search_id: "S1".to_string(),
            phrase: None,
        });
        let manifest = PageManifest::Indexed(indexed);

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/article-1"),
            Some(&manifest),
            &request(),
            true,
        )
        .unwrap();

        assert_eq!(resolved.content_ref, "searches/99/results.json");
        assert_eq!(resolved.search_id.as_deref(), Some("99"));
        assert_eq!(resolved.source, ResolvedSource::Manifest);
    }

    #[test]
    fn test_legacy_list_hit_substitutes_first_search_ref() {
        let mut indexed = indexed_for("/other", "searches/12/results.json");
        indexed.legacy.push(path_hash("/article-1"));
        let manifest = PageManifest::Indexed(indexed);

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/article-1"),
            Some(&manifest),
            &request(),
            true,
        )
        .unwrap();

        assert_eq!(resolved.content_ref, "searches/12/results.json");
        assert_eq!(resolved.source, ResolvedSource::ManifestLegacy);
    }

    #[test]
    fn test_flat_array_manifest_builds_legacy_page_ref() {
        let hash = path_hash("/article-1");
        let manifest = PageManifest::LegacyList(vec![hash.clone()]);

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/article-1"),
            Some(&manifest),
            &request(),
            true,
        )
        .unwrap();

        assert_eq!(
            resolved.content_ref,
            format!("example.com/pages/{hash}/index.json")
        );
        assert_eq!(resolved.search_id, None);
        assert_eq!(resolved.source, ResolvedSource::LegacyIndex);
    }

    #[test]
    fn test_targeting_rule_resolves_on_manifest_miss() {
        let mut indexed = IndexedManifest::default();
        indexed.targeting.push(sports_rule("S1"));
        let manifest = PageManifest::Indexed(indexed);

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/sports/basketball"),
            Some(&manifest),
            &request(),
            true,
        )
        .unwrap();

        assert_eq!(resolved.content_ref, "searches/S1/results.json");
        assert_eq!(resolved.search_id.as_deref(), Some("S1"));
        assert_eq!(resolved.source, ResolvedSource::Targeting);
    }

    #[test]
    fn test_override_applies_only_when_unresolved() {
        let mut req = request();
        req.override_search_id = Some("77".to_string());

        // Unresolved page: override wins over fallback.
        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/finance"),
            Some(&PageManifest::Indexed(IndexedManifest::default())),
            &req,
            true,
        )
        .unwrap();
        assert_eq!(resolved.source, ResolvedSource::Override);
        assert_eq!(resolved.content_ref, "searches/77/results.json");

        // Manifest hit: override does not replace it.
        let manifest =
            PageManifest::Indexed(indexed_for("/article-1", "searches/99/results.json"));
        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/article-1"),
            Some(&manifest),
            &req,
            true,
        )
        .unwrap();
        assert_eq!(resolved.source, ResolvedSource::Manifest);
    }

    #[test]
    fn test_fallback_when_enabled_and_unresolved() {
        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/finance"),
            None,
            &request(),
            true,
        )
        .unwrap();
        assert_eq!(resolved.content_ref, "pubs/example.com/fallback.json");
        assert_eq!(resolved.source, ResolvedSource::Fallback);
    }

    #[test]
    fn test_force_fallback_overrides_disabled_fallback() {
        let mut req = request();
        req.force_fallback = true;

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/finance"),
            None,
            &req,
            false,
        )
        .unwrap();
        assert_eq!(resolved.source, ResolvedSource::Fallback);
    }

    #[test]
    fn test_nothing_resolves_without_fallback() {
        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/finance"),
            None,
            &request(),
            false,
        );
        assert!(resolved.is_none());
    }

    #[test]
    fn test_manifest_fetch_failure_still_reaches_override() {
        let mut req = request();
        req.override_search_id = Some("5".to_string());

        let resolved = resolve_content(
            "example.com",
            &ctx("https://example.com/a"),
            None,
            &req,
            false,
        )
        .unwrap();
        assert_eq!(resolved.source, ResolvedSource::Override);
    }

    #[test]
    fn test_search_id_extraction() {
        assert_eq!(
            search_id_from_ref("searches/99/results.json").as_deref(),
            Some("99")
        );
        assert_eq!(search_id_from_ref("pubs/example.com/fallback.json"), None);
        assert_eq!(search_id_from_ref("searches//results.json"), None);
    }
}
