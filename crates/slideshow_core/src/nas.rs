//! crates/slideshow_core/src/nas.rs
//!
//! A thin client over the `NasTransport` and `RequestUrlBuilder` ports that
//! decodes the NAS response envelope and races every call against cancellation.

use crate::domain::ApiRequest;
use crate::error::{SlideshowError, SlideshowResult};
use crate::ports::{ByteStream, NasTransport, RequestUrlBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Upper bound for cleanup calls that ignore the caller's cancellation.
pub const CLEANUP_TIMEOUT: Duration = Duration::from_secs(30);

/// The `{ success, data, error }` wrapper every NAS response uses.
#[derive(Debug, Deserialize)]
pub struct ApiEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
}

#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    pub code: i64,
}

impl<T> ApiEnvelope<T> {
    /// The remote error code, or `0` when none was reported.
    pub fn error_code(&self) -> i64 {
        self.error.as_ref().map(|e| e.code).unwrap_or(0)
    }
}

/// Races `fut` against `cancel`; cancellation wins ties.
pub async fn cancellable<F, T>(cancel: &CancellationToken, fut: F) -> SlideshowResult<T>
where
    F: Future<Output = SlideshowResult<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SlideshowError::Cancelled),
        result = fut => result,
    }
}

#[derive(Clone)]
pub struct NasClient {
    transport: Arc<dyn NasTransport>,
    urls: Arc<dyn RequestUrlBuilder>,
}

impl NasClient {
    pub fn new(transport: Arc<dyn NasTransport>, urls: Arc<dyn RequestUrlBuilder>) -> Self {
        Self { transport, urls }
    }

    /// Sends `request` and decodes the envelope.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> SlideshowResult<ApiEnvelope<T>> {
        let url = self.urls.build_url(request);
        debug!(api = %request.api, method = %request.method, version = request.version, "Calling NAS");
        let body = cancellable(cancel, async { Ok(self.transport.get_json(&url).await?) }).await?;
        Ok(serde_json::from_value(body)?)
    }

    /// Sends `request` under its own deadline, independent of any caller cancellation.
    pub async fn call_detached<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> SlideshowResult<ApiEnvelope<T>> {
        let detached = CancellationToken::new();
        match tokio::time::timeout(CLEANUP_TIMEOUT, self.call(request, &detached)).await {
            Ok(result) => result,
            Err(_) => Err(SlideshowError::Transport(format!(
                "{} {} did not complete within {:?}",
                request.api, request.method, CLEANUP_TIMEOUT
            ))),
        }
    }

    /// Opens a raw body stream for `request`.
    pub async fn stream(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> SlideshowResult<ByteStream> {
        let url = self.urls.build_url(request);
        debug!(api = %request.api, method = %request.method, "Opening NAS stream");
        cancellable(cancel, async { Ok(self.transport.get_stream(&url).await?) }).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_tolerates_missing_fields() {
        let envelope: ApiEnvelope<serde_json::Value> =
            serde_json::from_value(serde_json::json!({ "error": { "code": 119 } })).unwrap();

        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert_eq!(envelope.error_code(), 119);
    }

    #[tokio::test]
    async fn test_cancellable_prefers_cancellation() {
        let token = CancellationToken::new();
        token.cancel();

        let result = cancellable(&token, async { Ok::<_, SlideshowError>(1) }).await;
        assert!(matches!(result, Err(SlideshowError::Cancelled)));
    }
}
