//! crates/slideshow_core/src/test_support.rs
//!
//! In-memory stand-ins for the NAS ports, shared by the unit tests.

use crate::domain::{ApiRequest, SearchTuning, SlideshowOptions};
use crate::nas::NasClient;
use crate::ports::{ByteStream, NasTransport, PortError, PortResult, RequestUrlBuilder};
use async_trait::async_trait;
use bytes::Bytes;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Renders requests as `api=..&version=..&method=..&k=v` without any encoding.
pub struct PlainUrlBuilder;

impl RequestUrlBuilder for PlainUrlBuilder {
    fn build_url(&self, request: &ApiRequest) -> String {
        let mut url = format!(
            "api={}&version={}&method={}",
            request.api, request.version, request.method
        );
        for (key, value) in &request.params {
            url.push_str(&format!("&{}={}", key, value));
        }
        url
    }
}

fn parse_query(url: &str) -> HashMap<String, String> {
    url.split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub struct FakeState {
    pub fail_info: bool,
    pub fail_logout: bool,
    pub search_max_version: i64,
    pub syno_token: String,
    pub task_id: Option<String>,
    /// Number of "not finished" answers before the job reports finished; `None` never finishes.
    pub unfinished_polls: Option<usize>,
    /// Reported total; `None` omits the field.
    pub total: Option<usize>,
    pub files: Vec<String>,
    pub download_body: Vec<u8>,
    /// Cancels the token once the listing call count reaches the given number.
    pub cancel_on_list: Option<(usize, CancellationToken)>,
    pub calls: HashMap<String, usize>,
    pub urls: Vec<String>,
}

#[derive(Clone)]
pub struct FakeNas {
    state: Arc<Mutex<FakeState>>,
}

impl FakeNas {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(FakeState {
                fail_info: false,
                fail_logout: false,
                search_max_version: 2,
                syno_token: "token-abc".to_string(),
                task_id: Some("task-1".to_string()),
                unfinished_polls: Some(0),
                total: Some(0),
                files: Vec::new(),
                download_body: Vec::new(),
                cancel_on_list: None,
                calls: HashMap::new(),
                urls: Vec::new(),
            })),
        }
    }

    /// Serves `files` as the search result, reporting their count as the total.
    pub fn with_files(self, files: &[&str]) -> Self {
        {
            let mut state = self.state();
            state.files = files.iter().map(|f| f.to_string()).collect();
            state.total = Some(files.len());
        }
        self
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Number of calls made for a method name (`query`, `login`, `list`, `clean`, ...).
    pub fn calls(&self, method: &str) -> usize {
        self.state().calls.get(method).copied().unwrap_or(0)
    }

    pub fn urls_for(&self, method: &str) -> Vec<String> {
        let needle = format!("method={}", method);
        self.state()
            .urls
            .iter()
            .filter(|u| u.contains(&needle))
            .cloned()
            .collect()
    }

    pub fn client(&self) -> NasClient {
        NasClient::new(Arc::new(self.clone()), Arc::new(PlainUrlBuilder))
    }

    fn record(&self, url: &str) -> (String, HashMap<String, String>, usize) {
        let params = parse_query(url);
        let method = params.get("method").cloned().unwrap_or_default();
        let mut state = self.state();
        state.urls.push(url.to_string());
        let count = state.calls.entry(method.clone()).or_insert(0);
        *count += 1;
        let count = *count;
        (method, params, count)
    }
}

#[async_trait]
impl NasTransport for FakeNas {
    async fn get_json(&self, url: &str) -> PortResult<Value> {
        let (method, params, count) = self.record(url);
        let state = self.state();

        match method.as_str() {
            "query" if state.fail_info => Err(PortError::Transport("connection refused".into())),
            "query" => Ok(json!({
                "success": true,
                "data": {
                    "SYNO.API.Auth": { "maxVersion": 7, "minVersion": 1, "path": "entry.cgi" },
                    "SYNO.FileStation.Search": {
                        "maxVersion": state.search_max_version, "minVersion": 1, "path": "entry.cgi"
                    },
                    "SYNO.FileStation.Download": { "maxVersion": 2, "minVersion": 1, "path": "entry.cgi" }
                }
            })),
            "login" => Ok(json!({
                "success": true,
                "data": { "sid": "sid-123", "synotoken": state.syno_token }
            })),
            "logout" if state.fail_logout => Err(PortError::Transport("logout refused".into())),
            "logout" | "clean" => Ok(json!({ "success": true })),
            "start" => Ok(match &state.task_id {
                Some(id) => json!({ "success": true, "data": { "taskid": id } }),
                None => json!({ "success": true, "data": {} }),
            }),
            "list" => {
                if let Some((at, token)) = &state.cancel_on_list {
                    if count >= *at {
                        token.cancel();
                    }
                }
                let finished = matches!(state.unfinished_polls, Some(n) if count > n);
                let offset: usize = params
                    .get("offset")
                    .and_then(|o| o.parse().ok())
                    .unwrap_or(0);
                let files: Vec<Value> = state
                    .files
                    .get(offset)
                    .map(|p| vec![json!({ "path": p, "name": p, "isdir": false })])
                    .unwrap_or_default();
                let mut data = json!({ "finished": finished, "offset": offset, "files": files });
                if let Some(total) = state.total {
                    data["total"] = json!(total);
                }
                Ok(json!({ "success": true, "data": data }))
            }
            other => Err(PortError::Unexpected(format!("unexpected method {}", other))),
        }
    }

    async fn get_stream(&self, url: &str) -> PortResult<ByteStream> {
        self.record(url);
        let body = self.state().download_body.clone();
        let middle = body.len() / 2;
        let chunks = vec![
            Ok(Bytes::copy_from_slice(&body[..middle])),
            Ok(Bytes::copy_from_slice(&body[middle..])),
        ];
        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Options pointing at `root` with millisecond polling.
pub fn test_options(root: &Path) -> SlideshowOptions {
    SlideshowOptions {
        search_folders: vec!["/photo".to_string()],
        sample_count: 3,
        search_timeout: Duration::from_secs(30),
        download_root: root.to_path_buf(),
        archive_file_name: "photos.zip".to_string(),
        geolocation_enabled: false,
        convert_after_unpack: false,
        search_tuning: SearchTuning {
            poll_interval: Duration::from_millis(1),
            max_poll_retries: 10,
        },
    }
}

/// Builds an in-memory zip archive.
pub fn zip_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);
    for (name, content) in entries {
        writer.start_file(*name, options).unwrap();
        writer.write_all(content).unwrap();
    }
    writer.finish().unwrap().into_inner()
}
