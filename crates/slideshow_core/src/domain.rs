//! crates/slideshow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the slideshow pipeline.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

//=========================================================================================
// Session
//=========================================================================================

/// An authenticated NAS session.
///
/// `sid` identifies the session for logout; `syno_token` is attached to every
/// protected request. Never persisted.
#[derive(Clone)]
pub struct Session {
    pub sid: String,
    pub syno_token: String,
}

// Keep tokens out of logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("sid", &"<redacted>")
            .field("syno_token", &"<redacted>")
            .finish()
    }
}

/// Account used to log in to the NAS.
#[derive(Clone)]
pub struct Credentials {
    pub account: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("account", &self.account)
            .field("password", &"<redacted>")
            .finish()
    }
}

//=========================================================================================
// Capability Descriptor
//=========================================================================================

/// The logical remote operations the pipeline performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    Login,
    Logout,
    SearchStart,
    SearchList,
    SearchClean,
    Download,
}

impl ApiOperation {
    /// The remote API namespace that serves this operation.
    pub fn api_name(self) -> &'static str {
        match self {
            ApiOperation::Login | ApiOperation::Logout => "SYNO.API.Auth",
            ApiOperation::SearchStart | ApiOperation::SearchList | ApiOperation::SearchClean => {
                "SYNO.FileStation.Search"
            }
            ApiOperation::Download => "SYNO.FileStation.Download",
        }
    }

    /// The remote method name for this operation.
    pub fn method(self) -> &'static str {
        match self {
            ApiOperation::Login => "login",
            ApiOperation::Logout => "logout",
            ApiOperation::SearchStart => "start",
            ApiOperation::SearchList => "list",
            ApiOperation::SearchClean => "clean",
            ApiOperation::Download => "download",
        }
    }
}

/// Advertised support for one remote API namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCapability {
    pub max_version: i64,
    pub min_version: i64,
    pub path: String,
}

/// The remote API's advertised capabilities, keyed by API namespace.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CapabilityDescriptor {
    pub apis: HashMap<String, ApiCapability>,
}

impl CapabilityDescriptor {
    /// Maximum protocol version for an operation; `0` when not advertised.
    pub fn max_version(&self, operation: ApiOperation) -> i64 {
        self.apis
            .get(operation.api_name())
            .map(|api| api.max_version)
            .unwrap_or(0)
    }

    /// CGI path serving an operation, defaulting to `entry.cgi`.
    pub fn path(&self, operation: ApiOperation) -> &str {
        self.apis
            .get(operation.api_name())
            .map(|api| api.path.as_str())
            .unwrap_or("entry.cgi")
    }
}

//=========================================================================================
// Remote Requests
//=========================================================================================

/// A typed request handed to the URL builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub api: String,
    pub path: String,
    pub version: i64,
    pub method: String,
    pub params: Vec<(String, String)>,
}

impl ApiRequest {
    /// Creates a request for `operation` using the descriptor's path and the given version.
    pub fn for_operation(
        operation: ApiOperation,
        descriptor: &CapabilityDescriptor,
        version: i64,
    ) -> Self {
        Self {
            api: operation.api_name().to_string(),
            path: descriptor.path(operation).to_string(),
            version,
            method: operation.method().to_string(),
            params: Vec::new(),
        }
    }

    /// Appends a query parameter.
    pub fn param(mut self, key: &str, value: impl Into<String>) -> Self {
        self.params.push((key.to_string(), value.into()));
        self
    }

    /// Attaches the session's identifiers.
    pub fn with_session(self, session: &Session) -> Self {
        self.param("_sid", session.sid.clone())
            .param("SynoToken", session.syno_token.clone())
    }
}

//=========================================================================================
// Search
//=========================================================================================

/// A server-side search task that must be cleaned up before it is discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchJob {
    pub task_id: String,
    pub version: i64,
}

/// A remote file produced by a search listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateItem {
    pub path: String,
    pub kind: String,
}

//=========================================================================================
// Slides
//=========================================================================================

/// When a photo was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureTime {
    /// The photo carried a UTC offset.
    Zoned(DateTime<FixedOffset>),
    /// Offset unknown; wall-clock time where the photo was taken.
    Local(NaiveDateTime),
}

impl fmt::Display for CaptureTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureTime::Zoned(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S%:z")),
            CaptureTime::Local(dt) => write!(f, "{}", dt.format("%Y-%m-%dT%H:%M:%S")),
        }
    }
}

/// Display metadata for one photo on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct SlideRecord {
    /// Forward-slash path relative to the download root.
    pub relative_url: String,
    pub taken_at: Option<CaptureTime>,
    /// Empty when the photo has no usable GPS data.
    pub map_link: String,
    /// Empty when geolocation is disabled or unavailable.
    pub place: String,
}

/// Result of deleting slides by identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeleteOutcome {
    pub deleted: Vec<String>,
    pub not_found: Vec<String>,
}

//=========================================================================================
// Options
//=========================================================================================

/// Fixed polling behaviour of a search job.
#[derive(Debug, Clone, Copy)]
pub struct SearchTuning {
    pub poll_interval: Duration,
    pub max_poll_retries: u32,
}

impl Default for SearchTuning {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(3),
            max_poll_retries: 10,
        }
    }
}

/// Read-only inputs of the pipeline.
#[derive(Debug, Clone)]
pub struct SlideshowOptions {
    pub search_folders: Vec<String>,
    pub sample_count: usize,
    pub search_timeout: Duration,
    pub download_root: PathBuf,
    pub archive_file_name: String,
    pub geolocation_enabled: bool,
    pub convert_after_unpack: bool,
    pub search_tuning: SearchTuning,
}

impl SlideshowOptions {
    /// Full path of the pending archive.
    pub fn archive_path(&self) -> PathBuf {
        self.download_root.join(&self.archive_file_name)
    }
}
