//! services/api/src/adapters/synology.rs
//!
//! This module contains the HTTP adapters for the Synology Web API.
//! It implements the `NasTransport` and `RequestUrlBuilder` ports from the core crate.

use async_trait::async_trait;
use futures::StreamExt;
use slideshow_core::domain::ApiRequest;
use slideshow_core::ports::{ByteStream, NasTransport, PortError, PortResult, RequestUrlBuilder};
use tracing::debug;
use url::Url;

//=========================================================================================
// URL Builder
//=========================================================================================

/// Renders requests as `{base}/webapi/{path}?api=..&version=..&method=..&...`.
#[derive(Clone, Debug)]
pub struct SynologyUrlBuilder {
    webapi: Url,
}

impl SynologyUrlBuilder {
    pub fn new(base: &Url) -> Result<Self, url::ParseError> {
        let mut root = base.clone();
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        Ok(Self {
            webapi: root.join("webapi/")?,
        })
    }
}

impl RequestUrlBuilder for SynologyUrlBuilder {
    fn build_url(&self, request: &ApiRequest) -> String {
        let mut url = self
            .webapi
            .join(request.path.trim_start_matches('/'))
            .unwrap_or_else(|_| self.webapi.clone());

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("api", &request.api)
                .append_pair("version", &request.version.to_string())
                .append_pair("method", &request.method);
            for (key, value) in &request.params {
                query.append_pair(key, value);
            }
        }
        url.into()
    }
}

//=========================================================================================
// Transport
//=========================================================================================

fn transport_error(err: reqwest::Error) -> PortError {
    if err.status().is_some_and(|s| s == reqwest::StatusCode::UNAUTHORIZED) {
        return PortError::Unauthorized;
    }
    PortError::Transport(err.to_string())
}

/// A `NasTransport` backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestNasTransport {
    http: reqwest::Client,
}

impl ReqwestNasTransport {
    /// Creates a transport. Home NAS units commonly serve self-signed certificates,
    /// which `accept_invalid_certs` allows.
    pub fn new(accept_invalid_certs: bool) -> PortResult<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| PortError::Unexpected(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http })
    }

    async fn send(&self, url: &str) -> PortResult<reqwest::Response> {
        debug!(url = %redact(url), "Calling NAS");
        self.http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport_error)
    }
}

#[async_trait]
impl NasTransport for ReqwestNasTransport {
    async fn get_json(&self, url: &str) -> PortResult<serde_json::Value> {
        self.send(url)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PortError::Transport(format!("Invalid JSON from NAS: {}", e)))
    }

    async fn get_stream(&self, url: &str) -> PortResult<ByteStream> {
        let response = self.send(url).await?;
        let stream = response.bytes_stream().map(|chunk| chunk.map_err(transport_error));
        Ok(Box::pin(stream))
    }
}

/// Strips credential-bearing query values before a URL reaches the logs.
fn redact(url: &str) -> String {
    let Ok(mut parsed) = Url::parse(url) else {
        return String::from("<invalid url>");
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(k, v)| {
            let value = match k.as_ref() {
                "passwd" | "_sid" | "SynoToken" => "***".to_string(),
                _ => v.into_owned(),
            };
            (k.into_owned(), value)
        })
        .collect();
    parsed.query_pairs_mut().clear().extend_pairs(pairs);
    parsed.into()
}
