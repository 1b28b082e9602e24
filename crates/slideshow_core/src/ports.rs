//! crates/slideshow_core/src/ports.rs
//!
//! Defines the service contracts (traits) the pipeline depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of the concrete HTTP client, URL format, geocoder and cache store.

use crate::domain::ApiRequest;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g. network, JSON).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// A body streamed from the NAS.
pub type ByteStream = Pin<Box<dyn Stream<Item = PortResult<Bytes>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Turns a typed request into a fully formed URL. Must be free of side effects.
pub trait RequestUrlBuilder: Send + Sync {
    fn build_url(&self, request: &ApiRequest) -> String;
}

#[async_trait]
pub trait NasTransport: Send + Sync {
    /// Performs a GET and returns the decoded JSON body.
    async fn get_json(&self, url: &str) -> PortResult<serde_json::Value>;

    /// Performs a GET and returns the raw body as a stream of chunks.
    async fn get_stream(&self, url: &str) -> PortResult<ByteStream>;
}

#[async_trait]
pub trait PlaceLookup: Send + Sync {
    /// Resolves coordinates to a human readable place; an empty string means "unknown".
    async fn lookup(&self, latitude: f64, longitude: f64) -> PortResult<String>;
}

/// The shared (distributed) tier of the geo cache.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> PortResult<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> PortResult<()>;
}
