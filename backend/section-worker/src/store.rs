use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use manifest_schema::MANIFEST_CACHE_CONTROL;
use tracing::debug;

use crate::error::{Result, WorkerError};

/// Object store the manifest artifacts are published to.
///
/// Reads are idempotent; writes are keyed by the artifact's natural key and
/// safe to re-run.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Writes a JSON document with the short-lived manifest cache policy.
    async fn put_json(&self, key: &str, body: String) -> Result<()>;
    async fn exists(&self, key: &str) -> Result<bool>;
    /// Path hashes of previously published per-page feeds, recovered from
    /// the `{domain}/pages/` prefix.
    async fn list_page_hashes(&self, domain: &str) -> Result<Vec<String>>;
}

pub struct S3ManifestStore {
    client: Client,
    bucket: String,
}

impl S3ManifestStore {
    pub fn new(client: Client, bucket: &str) -> Self {
        Self {
            client,
            bucket: bucket.to_string(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3ManifestStore {
    async fn put_json(&self, key: &str, body: String) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type("application/json")
            .cache_control(MANIFEST_CACHE_CONTROL)
            .body(ByteStream::from(body.into_bytes()))
            .send()
            .await
            .map_err(|error| WorkerError::Store(format!("put {key}: {error}")))?;
        debug!(key, "object written");
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(error) => {
                let service = error.into_service_error();
                if service.is_not_found() {
                    Ok(false)
                } else {
                    Err(WorkerError::Store(format!("head {key}: {service}")))
                }
            }
        }
    }

    async fn list_page_hashes(&self, domain: &str) -> Result<Vec<String>> {
        let prefix = format!("{domain}/pages/");
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .into_paginator()
            .send();

        let mut hashes = Vec::new();
        while let Some(page) = pages.next().await {
            let page =
                page.map_err(|error| WorkerError::Store(format!("list {prefix}: {error}")))?;
            for object in page.contents() {
                if let Some(hash) = object.key().and_then(page_hash_from_key) {
                    if !hashes.contains(&hash) {
                        hashes.push(hash);
                    }
                }
            }
        }
        Ok(hashes)
    }
}

/// `example.com/pages/<hash>/index.json` → `<hash>`.
fn page_hash_from_key(key: &str) -> Option<String> {
    let dir = key.strip_suffix("/index.json")?;
    let (_, hash) = dir.rsplit_once('/')?;
    if hash.is_empty() {
        None
    } else {
        Some(hash.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_hash_extraction() {
        assert_eq!(
            page_hash_from_key("example.com/pages/abc123/index.json").as_deref(),
            Some("abc123")
        );
        assert_eq!(page_hash_from_key("example.com/pages/abc123/data.json"), None);
        assert_eq!(page_hash_from_key("example.com/pages//index.json"), None);
        assert_eq!(page_hash_from_key("manifest.json"), None);
    }
}
