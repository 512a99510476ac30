use chrono::{DateTime, Utc};

pub mod manifest_publish;
pub mod section_build;

pub use manifest_publish::ManifestPublisher;
pub use section_build::{SectionBuildJob, SectionBuilder};

/// Counters for one batch pass, logged when the pass completes. Failures are
/// collected here instead of aborting the pass.
#[derive(Debug, Clone, Default)]
pub struct BatchStats {
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub jobs_seen: u32,
    pub jobs_succeeded: u32,
    pub jobs_failed: u32,
    pub articles_crawled: u32,
    pub manifests_written: u32,
    pub failures: Vec<String>,
    pub duration_ms: u64,
}

impl BatchStats {
    pub fn begin() -> Self {
        Self {
            started_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    pub fn finish(&mut self, started: std::time::Instant) {
        self.completed_at = Some(Utc::now());
        self.duration_ms = started.elapsed().as_millis() as u64;
    }
}
