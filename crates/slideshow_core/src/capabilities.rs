//! crates/slideshow_core/src/capabilities.rs
//!
//! Fetches the NAS capability descriptor once and memoizes it for the lifetime
//! of the cache instance.

use crate::domain::{ApiCapability, ApiRequest, CapabilityDescriptor};
use crate::error::{SlideshowError, SlideshowResult};
use crate::nas::NasClient;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInfoEntry {
    max_version: i64,
    #[serde(default)]
    min_version: i64,
    #[serde(default)]
    path: String,
}

/// Process-scoped memo of the capability descriptor.
///
/// Created explicitly and injected; a fresh instance starts empty. A failed
/// fetch leaves the cache empty so the next call retries.
pub struct CapabilityCache {
    nas: NasClient,
    descriptor: OnceCell<Arc<CapabilityDescriptor>>,
}

impl CapabilityCache {
    pub fn new(nas: NasClient) -> Self {
        Self {
            nas,
            descriptor: OnceCell::new(),
        }
    }

    /// Returns the cached descriptor, fetching it on first use.
    pub async fn get(&self, cancel: &CancellationToken) -> SlideshowResult<Arc<CapabilityDescriptor>> {
        self.descriptor
            .get_or_try_init(|| self.fetch(cancel))
            .await
            .cloned()
    }

    async fn fetch(&self, cancel: &CancellationToken) -> SlideshowResult<Arc<CapabilityDescriptor>> {
        let request = ApiRequest {
            api: "SYNO.API.Info".to_string(),
            path: "query.cgi".to_string(),
            version: 1,
            method: "query".to_string(),
            params: vec![("query".to_string(), "all".to_string())],
        };

        let envelope = self
            .nas
            .call::<HashMap<String, ApiInfoEntry>>(&request, cancel)
            .await?;

        let code = envelope.error_code();
        let Some(entries) = envelope.data.filter(|_| envelope.success) else {
            warn!(code, "NAS capability query was rejected");
            return Err(SlideshowError::Transport(format!(
                "capability query failed with code {}",
                code
            )));
        };

        let apis = entries
            .into_iter()
            .map(|(name, entry)| {
                (
                    name,
                    ApiCapability {
                        max_version: entry.max_version,
                        min_version: entry.min_version,
                        path: entry.path,
                    },
                )
            })
            .collect::<HashMap<_, _>>();

        info!("Fetched NAS capabilities for {} APIs", apis.len());
        Ok(Arc::new(CapabilityDescriptor { apis }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ApiOperation;
    use crate::test_support::FakeNas;

    #[tokio::test]
    async fn test_second_call_uses_cache() {
        let fake = FakeNas::new();
        let cache = CapabilityCache::new(fake.client());
        let token = CancellationToken::new();

        let first = cache.get(&token).await.unwrap();
        let second = cache.get(&token).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(fake.calls("query"), 1);
        assert_eq!(first.max_version(ApiOperation::SearchStart), 2);
        assert_eq!(first.path(ApiOperation::Login), "entry.cgi");
    }

    #[tokio::test]
    async fn test_failed_fetch_does_not_poison_cache() {
        let fake = FakeNas::new();
        fake.state().fail_info = true;
        let cache = CapabilityCache::new(fake.client());
        let token = CancellationToken::new();

        assert!(cache.get(&token).await.is_err());

        fake.state().fail_info = false;
        let descriptor = cache.get(&token).await.unwrap();

        assert_eq!(descriptor.max_version(ApiOperation::Download), 2);
        assert_eq!(fake.calls("query"), 2);
    }
}
