//! crates/slideshow_core/src/auth.rs
//!
//! Logs in to the NAS and guarantees the matching logout.

use crate::capabilities::CapabilityCache;
use crate::domain::{ApiOperation, ApiRequest, Credentials, Session};
use crate::error::{SlideshowError, SlideshowResult};
use crate::nas::NasClient;
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const SESSION_NAME: &str = "FileStation";

#[derive(Deserialize)]
struct LoginData {
    #[serde(default)]
    sid: String,
    #[serde(default)]
    synotoken: String,
}

pub struct SessionAuthenticator {
    nas: NasClient,
    capabilities: Arc<CapabilityCache>,
    credentials: Credentials,
}

impl SessionAuthenticator {
    pub fn new(nas: NasClient, capabilities: Arc<CapabilityCache>, credentials: Credentials) -> Self {
        Self {
            nas,
            capabilities,
            credentials,
        }
    }

    /// Logs in and returns a new session.
    ///
    /// A response without a session token is an `AuthenticationFailed` error.
    pub async fn acquire(&self, cancel: &CancellationToken) -> SlideshowResult<Session> {
        let descriptor = self.capabilities.get(cancel).await?;
        let version = descriptor.max_version(ApiOperation::Login);
        if version <= 0 {
            return Err(SlideshowError::InvalidApiVersion {
                api: ApiOperation::Login.api_name().to_string(),
                version,
            });
        }

        let request = ApiRequest::for_operation(ApiOperation::Login, &descriptor, version)
            .param("account", self.credentials.account.clone())
            .param("passwd", self.credentials.password.clone())
            .param("session", SESSION_NAME)
            .param("format", "sid")
            .param("enable_syno_token", "yes");

        debug!(account = %self.credentials.account, "Authenticating with NAS");
        let envelope = self.nas.call::<LoginData>(&request, cancel).await?;
        let code = envelope.error_code();

        match envelope.data {
            Some(data) if envelope.success && !data.synotoken.trim().is_empty() => Ok(Session {
                sid: data.sid,
                syno_token: data.synotoken,
            }),
            _ => {
                error!(code, "Failed to login to NAS");
                Err(SlideshowError::AuthenticationFailed(format!(
                    "no session token returned (code {})",
                    code
                )))
            }
        }
    }

    /// Logs the session out. Never fails; problems are logged.
    ///
    /// Runs independently of any caller cancellation so it completes on every exit path.
    pub async fn release(&self, session: Session) {
        let detached = CancellationToken::new();
        let descriptor = match self.capabilities.get(&detached).await {
            Ok(descriptor) => descriptor,
            Err(e) => {
                warn!("Failed to logout from NAS: {}", e);
                return;
            }
        };

        let request = ApiRequest::for_operation(
            ApiOperation::Logout,
            &descriptor,
            descriptor.max_version(ApiOperation::Logout),
        )
        .param("session", SESSION_NAME)
        .param("_sid", session.sid);

        debug!("Logging out from NAS");
        match self.nas.call_detached::<serde_json::Value>(&request).await {
            Ok(envelope) if envelope.success => {}
            Ok(envelope) => warn!(code = envelope.error_code(), "NAS rejected logout"),
            Err(e) => warn!("Failed to logout from NAS: {}", e),
        }
    }

    /// Runs `work` inside a session that is released exactly once afterwards,
    /// whether `work` succeeds, fails or observes cancellation.
    pub async fn with_session<T, F, Fut>(&self, cancel: &CancellationToken, work: F) -> SlideshowResult<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = SlideshowResult<T>>,
    {
        let session = self.acquire(cancel).await?;
        let result = work(session.clone()).await;
        self.release(session).await;
        result
    }
}
