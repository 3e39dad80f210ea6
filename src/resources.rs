//! Resource readiness: bounded waiting for the external assets a snapshot
//! references.
//!
//! Waiting is best-effort by contract: an individual asset that fails or
//! never arrives is treated as absent for painting purposes, and the whole
//! wait never blocks past the configured timeout. Nothing in this module
//! can fail a capture.

use std::collections::HashMap;
use std::time::Duration;

use base64::Engine as Base64Engine;
use futures::future::BoxFuture;

use crate::options::ResolvedOptions;
use crate::snapshot::{ResourceRef, Snapshot};

/// Bytes resolved for a snapshot's resources, keyed by resolved URL.
/// Absent entries paint as absent.
#[derive(Debug, Default)]
pub struct AssetCache {
    entries: HashMap<String, Vec<u8>>,
}

impl AssetCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: Vec<u8>) {
        self.entries.insert(url.into(), bytes);
    }

    pub fn get(&self, url: &str) -> Option<&[u8]> {
        self.entries.get(url).map(|bytes| bytes.as_slice())
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fetches one asset; `None` means "treat as absent".
///
/// Implementations must not panic and must not surface errors: a failed
/// fetch is simply an absent asset.
pub trait ResourceWaiter: Send + Sync {
    fn fetch<'a>(&'a self, resource: &'a ResourceRef) -> BoxFuture<'a, Option<Vec<u8>>>;
}

/// Resolve the snapshot's assets into `cache`, bounded by the configured
/// timeout.
///
/// Cross-origin assets are skipped unless `allow_cross_origin_assets` is
/// set. Returns whether everything attempted resolved in time; a `false`
/// only means some assets will paint as absent.
pub async fn await_ready(
    waiter: &dyn ResourceWaiter,
    snapshot: &Snapshot,
    cache: &mut AssetCache,
    options: &ResolvedOptions,
) -> bool {
    let (wanted, skipped): (Vec<&ResourceRef>, Vec<&ResourceRef>) = snapshot
        .resources()
        .iter()
        .partition(|r| options.allow_cross_origin_assets || !r.cross_origin);

    for resource in &skipped {
        log::debug!("skipping cross-origin asset {}", resource.url);
    }
    if wanted.is_empty() {
        return true;
    }

    let fetches = futures::future::join_all(wanted.iter().map(|r| waiter.fetch(r)));
    match tokio::time::timeout(Duration::from_millis(options.timeout_ms), fetches).await {
        Ok(fetched) => {
            let mut all_resolved = true;
            for (resource, bytes) in wanted.iter().zip(fetched) {
                match bytes {
                    Some(bytes) => cache.insert(resource.url.clone(), bytes),
                    None => {
                        log::debug!("asset {} did not resolve; treating as absent", resource.url);
                        all_resolved = false;
                    }
                }
            }
            all_resolved
        }
        Err(_) => {
            log::warn!(
                "resource wait exceeded {}ms; unresolved assets treated as absent",
                options.timeout_ms
            );
            false
        }
    }
}

/// Decode an inline `data:` URL payload; `None` for anything malformed
#[cfg_attr(not(any(test, feature = "http")), allow(dead_code))]
fn decode_data_url(url: &str) -> Option<Vec<u8>> {
    let rest = url.strip_prefix("data:")?;
    let (meta, payload) = rest.split_once(',')?;
    if meta.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD.decode(payload).ok()
    } else {
        Some(payload.as_bytes().to_vec())
    }
}

/// A waiter that resolves nothing; every asset paints as absent.
/// The default when the `http` feature is disabled.
#[derive(Debug, Default)]
pub struct NoopWaiter;

impl ResourceWaiter for NoopWaiter {
    fn fetch<'a>(&'a self, _resource: &'a ResourceRef) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async { None })
    }
}

/// HTTP-backed waiter: GETs each asset, decodes `data:` URLs inline
#[cfg(feature = "http")]
pub struct HttpWaiter {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpWaiter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

#[cfg(feature = "http")]
impl Default for HttpWaiter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "http")]
impl ResourceWaiter for HttpWaiter {
    fn fetch<'a>(&'a self, resource: &'a ResourceRef) -> BoxFuture<'a, Option<Vec<u8>>> {
        Box::pin(async move {
            if resource.url.starts_with("data:") {
                return decode_data_url(&resource.url);
            }
            let response = self.client.get(&resource.url).send().await.ok()?;
            if !response.status().is_success() {
                log::debug!("asset {} returned {}", resource.url, response.status());
                return None;
            }
            response.bytes().await.ok().map(|bytes| bytes.to_vec())
        })
    }
}

/// The default waiter for a capturer
#[cfg(feature = "http")]
pub fn default_waiter() -> Box<dyn ResourceWaiter> {
    Box::new(HttpWaiter::new())
}

#[cfg(not(feature = "http"))]
pub fn default_waiter() -> Box<dyn ResourceWaiter> {
    Box::new(NoopWaiter)
}
