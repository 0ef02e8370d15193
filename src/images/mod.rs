//! Item photo lookup.
//!
//! Photos live under `{namespace}/product_id/{code}/` in object storage; the
//! first listed object is the display image.

use crate::domain::ItemCode;
use crate::error::Result;
use crate::observability;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, warn};

pub mod local_fs;
pub mod s3;

pub use local_fs::LocalImageResolver;
pub use s3::{S3ImageResolver, S3Settings};

pub const DEFAULT_NAMESPACE: &str = "engineer-inventory";

#[async_trait]
pub trait ImageResolver: Send + Sync {
    /// Public URL of the first image stored for `code`, if any
    async fn image_url(&self, code: ItemCode) -> Result<Option<String>>;
}

/// Resolver for deployments without a photo bucket
pub struct NoImages;

#[async_trait]
impl ImageResolver for NoImages {
    async fn image_url(&self, _code: ItemCode) -> Result<Option<String>> {
        Ok(None)
    }
}

/// Object key prefix holding the photos of `code`
pub fn object_prefix(namespace: &str, code: ItemCode) -> String {
    let namespace = namespace.trim_matches('/');
    if namespace.is_empty() {
        format!("product_id/{code}/")
    } else {
        format!("{namespace}/product_id/{code}/")
    }
}

/// Resolve one image per code with at most `concurrency` lookups in flight.
///
/// The output is index-aligned with `codes`. Failed or timed out lookups
/// yield `None`.
pub async fn resolve_all(
    resolver: Arc<dyn ImageResolver>,
    codes: &[ItemCode],
    concurrency: usize,
    timeout: Duration,
) -> Vec<Option<String>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut lookups = JoinSet::new();

    for (idx, code) in codes.iter().copied().enumerate() {
        let resolver = resolver.clone();
        let semaphore = semaphore.clone();
        lookups.spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let url = match tokio::time::timeout(timeout, resolver.image_url(code)).await {
                Ok(Ok(url)) => {
                    observability::image_lookup(if url.is_some() { "found" } else { "missing" });
                    url
                }
                Ok(Err(e)) => {
                    warn!("Image lookup for item {} failed: {}", code, e);
                    observability::image_lookup("error");
                    None
                }
                Err(_) => {
                    warn!("Image lookup for item {} timed out", code);
                    observability::image_lookup("timeout");
                    None
                }
            };
            (idx, url)
        });
    }

    let mut urls = vec![None; codes.len()];
    while let Some(joined) = lookups.join_next().await {
        match joined {
            Ok((idx, url)) => urls[idx] = url,
            Err(e) => warn!("Image lookup task failed: {}", e),
        }
    }
    debug!(
        "Resolved {} of {} item images",
        urls.iter().filter(|u| u.is_some()).count(),
        codes.len()
    );
    urls
}
