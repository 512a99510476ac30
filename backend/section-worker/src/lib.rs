//! Offline half of the widget pipeline.
//!
//! Builds the per-topic "next recommended page" section manifests from
//! analytics popularity plus a metadata crawl, and republishes each domain's
//! page manifest from the rule table. Runs as a batch process; one failed
//! domain or section never aborts the rest of a pass.

pub mod analytics;
pub mod config;
pub mod crawler;
pub mod db;
pub mod error;
pub mod jobs;
pub mod store;

pub use config::{RunMode, WorkerConfig};
pub use error::{Result, WorkerError};
