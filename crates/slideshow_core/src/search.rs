//! crates/slideshow_core/src/search.rs
//!
//! Drives a remote search job: start it, poll it until it finishes, draw a random
//! sample of eligible files from its results and always clean it up afterwards.

use crate::capabilities::CapabilityCache;
use crate::domain::{
    ApiOperation, ApiRequest, CandidateItem, CapabilityDescriptor, SearchJob, SearchTuning,
    Session,
};
use crate::error::{SlideshowError, SlideshowResult};
use crate::nas::{cancellable, NasClient};
use rand::Rng;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Video formats that never count towards the sample.
pub const EXCLUDED_EXTENSIONS: [&str; 5] = [".mp4", ".mov", ".avi", ".mkv", ".wmv"];

const SINGLE_ITEM_LIMIT: &str = "1";

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct SearchStartData {
    taskid: Option<String>,
}

#[derive(Deserialize, Default)]
struct SearchListData {
    finished: Option<bool>,
    total: Option<i64>,
    #[serde(default)]
    files: Vec<RemoteFile>,
}

#[derive(Deserialize)]
struct RemoteFile {
    #[serde(default)]
    path: String,
}

/// Whether `path` ends in one of the excluded (video) extensions, ignoring case.
pub fn is_excluded(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

impl CandidateItem {
    fn from_path(path: String) -> Self {
        let kind = path
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .unwrap_or_default();
        Self { path, kind }
    }
}

//=========================================================================================
// The Orchestrator
//=========================================================================================

pub struct SearchOrchestrator {
    nas: NasClient,
    capabilities: Arc<CapabilityCache>,
    folders: Vec<String>,
    sample_count: usize,
    timeout: Duration,
    tuning: SearchTuning,
}

impl SearchOrchestrator {
    pub fn new(
        nas: NasClient,
        capabilities: Arc<CapabilityCache>,
        folders: Vec<String>,
        sample_count: usize,
        timeout: Duration,
        tuning: SearchTuning,
    ) -> Self {
        Self {
            nas,
            capabilities,
            folders,
            sample_count,
            timeout,
            tuning,
        }
    }

    /// Runs one search and returns a random sample of eligible files.
    ///
    /// The search is bounded by both `cancel` and the configured timeout. Any job
    /// that was started is cleaned up before this returns, whatever the outcome.
    pub async fn find_photos(
        &self,
        session: &Session,
        cancel: &CancellationToken,
    ) -> SlideshowResult<Vec<CandidateItem>> {
        let mut started: Option<(SearchJob, Arc<CapabilityDescriptor>)> = None;

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.run(session, &mut started, cancel),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("Search did not complete within {:?}", self.timeout);
                Err(SlideshowError::SearchTimedOut(format!(
                    "search exceeded {:?}",
                    self.timeout
                )))
            }
        };

        if let Some((job, descriptor)) = started {
            self.clean(session, &descriptor, &job).await;
        }

        outcome
    }

    async fn run(
        &self,
        session: &Session,
        started: &mut Option<(SearchJob, Arc<CapabilityDescriptor>)>,
        cancel: &CancellationToken,
    ) -> SlideshowResult<Vec<CandidateItem>> {
        let descriptor = self.capabilities.get(cancel).await?;
        let version = descriptor.max_version(ApiOperation::SearchStart);
        if version <= 0 {
            warn!(version, "NAS reported no usable search API version");
            return Err(SlideshowError::InvalidApiVersion {
                api: ApiOperation::SearchStart.api_name().to_string(),
                version,
            });
        }

        let job = self.start(session, &descriptor, version, cancel).await?;
        info!(task_id = %job.task_id, "Search job started");
        let (job, descriptor) = &*started.insert((job, descriptor));

        let total = self.wait_for_total(session, descriptor, job, cancel).await?;
        self.sample(session, descriptor, job, total, cancel).await
    }

    async fn start(
        &self,
        session: &Session,
        descriptor: &CapabilityDescriptor,
        version: i64,
        cancel: &CancellationToken,
    ) -> SlideshowResult<SearchJob> {
        let request = ApiRequest::for_operation(ApiOperation::SearchStart, descriptor, version)
            .param("folder_path", serde_json::to_string(&self.folders)?)
            .param("recursive", "true")
            .param("filetype", "file")
            .with_session(session);

        let envelope = self.nas.call::<SearchStartData>(&request, cancel).await?;
        let code = envelope.error_code();

        match envelope.data.and_then(|d| d.taskid).filter(|id| !id.is_empty()) {
            Some(task_id) => Ok(SearchJob { task_id, version }),
            None => {
                warn!(code, "Failed to initiate search operation");
                Err(SlideshowError::FailedToInitiateSearch)
            }
        }
    }

    /// Polls the job until it reports finished and returns its match count.
    async fn wait_for_total(
        &self,
        session: &Session,
        descriptor: &CapabilityDescriptor,
        job: &SearchJob,
        cancel: &CancellationToken,
    ) -> SlideshowResult<usize> {
        let request = self.list_request(session, descriptor, job, 0);
        let mut listing = self.list(&request, cancel).await?;
        let mut retries = 0;

        while listing.finished == Some(false) {
            if retries >= self.tuning.max_poll_retries {
                warn!(task_id = %job.task_id, retries, "Search operation timed out");
                return Err(SlideshowError::SearchTimedOut(format!(
                    "search not finished after {} polling attempts",
                    retries
                )));
            }
            retries += 1;
            debug!(task_id = %job.task_id, attempt = retries, "Search not finished, polling again");

            cancellable(cancel, async {
                tokio::time::sleep(self.tuning.poll_interval).await;
                Ok(())
            })
            .await?;
            listing = self.list(&request, cancel).await?;
        }

        match listing.total {
            Some(total) => Ok(usize::try_from(total).unwrap_or(0)),
            None => {
                warn!(task_id = %job.task_id, "Search finished without a total, assuming zero");
                Ok(0)
            }
        }
    }

    /// Draws single items at random offsets until enough eligible ones are collected.
    async fn sample(
        &self,
        session: &Session,
        descriptor: &CapabilityDescriptor,
        job: &SearchJob,
        total: usize,
        cancel: &CancellationToken,
    ) -> SlideshowResult<Vec<CandidateItem>> {
        if total == 0 {
            warn!(task_id = %job.task_id, "No photos were found in the search results");
            return Ok(Vec::new());
        }

        let mut items = Vec::with_capacity(self.sample_count);
        while items.len() < self.sample_count {
            let offset = rand::thread_rng().gen_range(0..total);
            let request = self.list_request(session, descriptor, job, offset);
            let listing = self.list(&request, cancel).await?;

            let Some(file) = listing.files.into_iter().next().filter(|f| !f.path.is_empty()) else {
                warn!(offset, "Search listing returned no file");
                continue;
            };
            if is_excluded(&file.path) {
                debug!(path = %file.path, "Skipping video file");
                continue;
            }
            items.push(CandidateItem::from_path(file.path));
        }

        info!(task_id = %job.task_id, "Sampled {} of {} search results", items.len(), total);
        Ok(items)
    }

    fn list_request(
        &self,
        session: &Session,
        descriptor: &CapabilityDescriptor,
        job: &SearchJob,
        offset: usize,
    ) -> ApiRequest {
        ApiRequest::for_operation(ApiOperation::SearchList, descriptor, job.version)
            .param("taskid", job.task_id.clone())
            .param("offset", offset.to_string())
            .param("limit", SINGLE_ITEM_LIMIT)
            .with_session(session)
    }

    async fn list(
        &self,
        request: &ApiRequest,
        cancel: &CancellationToken,
    ) -> SlideshowResult<SearchListData> {
        let envelope = self.nas.call::<SearchListData>(request, cancel).await?;
        if !envelope.success {
            return Err(SlideshowError::Transport(format!(
                "search listing failed with code {}",
                envelope.error_code()
            )));
        }
        Ok(envelope.data.unwrap_or_default())
    }

    /// Releases the server-side job. Failures are only logged.
    async fn clean(&self, session: &Session, descriptor: &CapabilityDescriptor, job: &SearchJob) {
        let request = ApiRequest::for_operation(ApiOperation::SearchClean, descriptor, job.version)
            .param("taskid", job.task_id.clone())
            .with_session(session);

        match self.nas.call_detached::<serde_json::Value>(&request).await {
            Ok(envelope) if envelope.success => {
                debug!(task_id = %job.task_id, "Cleaned up search task");
            }
            Ok(envelope) => {
                warn!(task_id = %job.task_id, code = envelope.error_code(), "NAS rejected search cleanup");
            }
            Err(e) => {
                warn!(task_id = %job.task_id, "Failed to clean up search task: {}", e);
            }
        }
    }
}
