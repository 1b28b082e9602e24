//! crates/slideshow_core/src/geo.rs
//!
//! Resolves coordinates to place names through a `PlaceLookup`, fronted by a
//! two-tier cache (in-process map, optional shared store).

use crate::ports::{PlaceLookup, SharedCache};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Expiration applied to both cache tiers.
pub const GEO_CACHE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Stable cache key for a coordinate pair.
pub fn cache_key(latitude: f64, longitude: f64) -> String {
    format!("{:.6},{:.6}", latitude, longitude)
}

struct LocalEntry {
    place: String,
    expires_at: Instant,
}

/// Advisory cache: every failure or expiry reads as a miss.
pub struct GeoCache {
    local: RwLock<HashMap<String, LocalEntry>>,
    shared: Option<Arc<dyn SharedCache>>,
    ttl: Duration,
}

impl GeoCache {
    pub fn new(shared: Option<Arc<dyn SharedCache>>, ttl: Duration) -> Self {
        Self {
            local: RwLock::new(HashMap::new()),
            shared,
            ttl,
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        {
            let local = self.local.read().await;
            if let Some(entry) = local.get(key) {
                if entry.expires_at > Instant::now() {
                    return Some(entry.place.clone());
                }
            }
        }

        let shared = self.shared.as_ref()?;
        match shared.get(key).await {
            Ok(Some(place)) => {
                self.put_local(key, &place).await;
                Some(place)
            }
            Ok(None) => None,
            Err(e) => {
                warn!(key, "Shared geo cache read failed: {}", e);
                None
            }
        }
    }

    pub async fn put(&self, key: &str, place: &str) {
        self.put_local(key, place).await;
        if let Some(shared) = &self.shared {
            if let Err(e) = shared.set(key, place, self.ttl).await {
                warn!(key, "Shared geo cache write failed: {}", e);
            }
        }
    }

    async fn put_local(&self, key: &str, place: &str) {
        let mut local = self.local.write().await;
        local.retain(|_, entry| entry.expires_at > Instant::now());
        local.insert(
            key.to_string(),
            LocalEntry {
                place: place.to_string(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

pub struct GeoResolver {
    lookup: Arc<dyn PlaceLookup>,
    cache: GeoCache,
}

impl GeoResolver {
    pub fn new(lookup: Arc<dyn PlaceLookup>, cache: GeoCache) -> Self {
        Self { lookup, cache }
    }

    /// Returns a place name for the coordinates, or an empty string when unknown.
    pub async fn resolve(&self, latitude: f64, longitude: f64, cancel: &CancellationToken) -> String {
        let key = cache_key(latitude, longitude);
        debug!(key = %key, "Checking cache for location");
        if let Some(place) = self.cache.get(&key).await {
            return place;
        }

        info!(key = %key, "Cache miss, fetching location from source");
        let lookup = tokio::select! {
            biased;
            _ = cancel.cancelled() => return String::new(),
            result = self.lookup.lookup(latitude, longitude) => result,
        };

        match lookup {
            Ok(place) if !place.is_empty() => {
                self.cache.put(&key, &place).await;
                place
            }
            Ok(_) => String::new(),
            Err(e) => {
                warn!(key = %key, "Failed to resolve location: {}", e);
                String::new()
            }
        }
    }
}
