use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use targeting_core::compact_hash_value;

use crate::models::ExperimentAssignment;

/// Hash seam for bucketing, so the function can be swapped without touching
/// call sites.
pub trait BucketHasher: Send + Sync {
    fn bucket_value(&self, key: &str) -> u64;
}

/// Default hasher: the compact 32-bit string hash shared with visited-path
/// marking.
#[derive(Debug, Default)]
pub struct CompactHasher;

impl BucketHasher for CompactHasher {
    fn bucket_value(&self, key: &str) -> u64 {
        compact_hash_value(key) as u64
    }
}

/// One running experiment and its ordered variant list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentDefinition {
    pub name: String,
    pub variants: Vec<String>,
}

/// Deterministic session-to-variant assignment.
///
/// The variant is a pure function of session id and experiment name, so the
/// same visitor sees the same arm on every page view without any stored
/// state.
pub struct ExperimentBucketer {
    hasher: Box<dyn BucketHasher>,
}

impl Default for ExperimentBucketer {
    fn default() -> Self {
        Self::new()
    }
}

impl ExperimentBucketer {
    pub fn new() -> Self {
        Self::with_hasher(Box::new(CompactHasher))
    }

    pub fn with_hasher(hasher: Box<dyn BucketHasher>) -> Self {
        Self { hasher }
    }

    /// Assigns a variant for one experiment. A `forced` value that names one
    /// of the experiment's variants bypasses the hash and marks the
    /// assignment as forced.
    pub fn assign(
        &self,
        session_id: &str,
        experiment: &ExperimentDefinition,
        forced: Option<&str>,
    ) -> Option<ExperimentAssignment> {
        if experiment.variants.is_empty() {
            return None;
        }

        if let Some(forced_variant) = forced {
            if experiment.variants.iter().any(|v| v == forced_variant) {
                return Some(ExperimentAssignment {
                    experiment: experiment.name.clone(),
                    variant: forced_variant.to_string(),
                    forced: true,
                });
            }
        }

        let key = format!("{}{}", session_id, experiment.name);
        let index =
            (self.hasher.bucket_value(&key) % experiment.variants.len() as u64) as usize;
        Some(ExperimentAssignment {
            experiment: experiment.name.clone(),
            variant: experiment.variants[index].clone(),
            forced: false,
        })
    }

    pub fn assign_all(
        &self,
        session_id: &str,
        experiments: &[ExperimentDefinition],
        forced: Option<&str>,
    ) -> Vec<ExperimentAssignment> {
        experiments
            .iter()
            .filter_map(|experiment| self.assign(session_id, experiment, forced))
            .collect()
    }
}

/// Exposure payload sent to analytics. Forced assignments report an empty
/// payload so operator previews never pollute experiment results.
pub fn exposure_payload(session_id: &str, assignment: &ExperimentAssignment) -> Value {
    if assignment.forced {
        json!({})
    } else {
        json!({
            "sessionId": session_id,
            "assignmentId": format!("{}-{}", assignment.experiment, assignment.variant),
        })
    }
}
