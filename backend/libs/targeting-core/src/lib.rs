//! Targeting rule model and first-match evaluation.
//!
//! One engine services every rule table in the system (feed targeting and
//! next-page targeting) so the predicate definitions live in exactly one
//! place. Also home to the two page-identity hashes: the SHA-256 path hash
//! used as the manifest key and the compact hash used for visited-path
//! marking and experiment bucketing.

pub mod context;
pub mod engine;
pub mod hash;
pub mod rule;

pub use context::PageContext;
pub use engine::{evaluate, first_match, Rule};
pub use hash::{compact_hash, compact_hash_value, path_hash};
pub use rule::{specificity, RuleKind, UnknownRuleKind};
