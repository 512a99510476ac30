use manifest_schema::{
    manifest_key, search_results_ref, section_manifest_key, FeedRule, IndexedManifest,
    NextPageRule,
};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;
use targeting_core::path_hash;
use tracing::{debug, error, info};

use super::BatchStats;
use crate::db::RuleStore;
use crate::error::Result;
use crate::store::ObjectStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Written {
        entries: usize,
        legacy: usize,
        targeting: usize,
        next_page: usize,
    },
    /// Nothing to publish for the domain.
    Skipped,
}

/// Rebuilds per-domain page manifests from the rule table and the
/// published-pages index. The rule table is the source of truth; the
/// manifest is a derived artifact and safe to regenerate at any time.
pub struct ManifestPublisher {
    rules: Arc<dyn RuleStore>,
    store: Arc<dyn ObjectStore>,
    dry_run: bool,
}

impl ManifestPublisher {
    pub fn new(rules: Arc<dyn RuleStore>, store: Arc<dyn ObjectStore>, dry_run: bool) -> Self {
        Self {
            rules,
            store,
            dry_run,
        }
    }

    /// Publishes every domain, isolating failures per domain.
    pub async fn publish_all(&self, domains: &[String]) -> BatchStats {
        let started = Instant::now();
        let mut stats = BatchStats::begin();

        for domain in domains {
            stats.jobs_seen += 1;
            match self.publish_domain(domain).await {
                Ok(PublishOutcome::Written {
                    entries,
                    legacy,
                    targeting,
                    next_page,
                }) => {
                    stats.jobs_succeeded += 1;
                    if !self.dry_run {
                        stats.manifests_written += 1;
                    }
                    info!(
                        domain, entries, legacy, targeting, next_page,
                        "domain manifest published"
                    );
                }
                Ok(PublishOutcome::Skipped) => {
                    stats.jobs_succeeded += 1;
                    debug!(domain, "no manifest data, skipped");
                }
                Err(err) => {
                    stats.jobs_failed += 1;
                    error!(domain, error = %err, "manifest publish failed");
                    stats.failures.push(format!("{domain}: {err}"));
                }
            }
        }

        stats.finish(started);
        stats
    }

    pub async fn publish_domain(&self, domain: &str) -> Result<PublishOutcome> {
        let domain = domain.to_lowercase();
        let mut manifest = IndexedManifest::default();
        let mut processed = HashSet::new();

        // Pages with a live search feed become exact hash entries; the rest
        // fall into the legacy list.
        for page in self.rules.pages(&domain).await? {
            let hash = path_hash(&page.pathname);
            processed.insert(hash.clone());
            match &page.search_id {
                Some(search_id) => {
                    let content_ref = search_results_ref(search_id);
                    if self.store.exists(&content_ref).await? {
                        manifest.entries.insert(hash, content_ref);
                    } else {
                        debug!(
                            %domain,
                            pathname = %page.pathname,
                            "search results missing, page kept as legacy"
                        );
                        manifest.legacy.push(hash);
                    }
                }
                None => manifest.legacy.push(hash),
            }
        }

        // Per-page feeds published before the indexed format, discovered in
        // the object store rather than the database.
        for hash in self.store.list_page_hashes(&domain).await? {
            if !processed.contains(&hash) && !manifest.legacy.contains(&hash) {
                manifest.legacy.push(hash);
            }
        }

        for rule in self.rules.feed_rules(&domain).await? {
            manifest.targeting.push(FeedRule {
                kind: rule.kind,
                value: rule.value,
                search_id: rule.search_id,
                phrase: rule.phrase,
            });
        }

        // Next-page rules only ship when their section manifest actually
        // exists, so the widget never fans out to a missing artifact.
        for rule in self.rules.next_page_rules(&domain).await? {
            let key = section_manifest_key(&domain, &rule.section);
            if self.store.exists(&key).await? {
                manifest.next_page_targeting.push(NextPageRule {
                    kind: rule.kind,
                    value: rule.value,
                    section: rule.section,
                    manifest: key,
                    priority: rule.specificity,
                });
            } else {
                debug!(
                    %domain,
                    section = %rule.section,
                    "section manifest missing, rule not embedded"
                );
            }
        }

        let outcome = PublishOutcome::Written {
            entries: manifest.entries.len(),
            legacy: manifest.legacy.len(),
            targeting: manifest.targeting.len(),
            next_page: manifest.next_page_targeting.len(),
        };
        if outcome
            == (PublishOutcome::Written {
                entries: 0,
                legacy: 0,
                targeting: 0,
                next_page: 0,
            })
        {
            return Ok(PublishOutcome::Skipped);
        }

        let key = manifest_key(&domain);
        if self.dry_run {
            info!(key, "dry run: would write domain manifest");
        } else {
            self.store
                .put_json(&key, serde_json::to_string(&manifest)?)
                .await?;
        }
        Ok(outcome)
    }
}
