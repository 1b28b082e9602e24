//! crates/slideshow_core/src/download.rs
//!
//! Requests a packaged transfer of the sampled items and writes it to disk.

use crate::capabilities::CapabilityCache;
use crate::domain::{ApiOperation, ApiRequest, CandidateItem, Session};
use crate::error::{SlideshowError, SlideshowResult};
use crate::nas::{cancellable, NasClient};
use crate::unpack;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct Downloader {
    nas: NasClient,
    capabilities: Arc<CapabilityCache>,
    archive_file_name: String,
}

impl Downloader {
    pub fn new(nas: NasClient, capabilities: Arc<CapabilityCache>, archive_file_name: String) -> Self {
        Self {
            nas,
            capabilities,
            archive_file_name,
        }
    }

    /// Clears `target_dir`, then downloads `items` into it and returns the written file.
    ///
    /// Several items arrive as one archive named after the configured archive file;
    /// a single item arrives as the raw file and keeps its own name.
    pub async fn download(
        &self,
        session: &Session,
        items: &[CandidateItem],
        target_dir: &Path,
        cancel: &CancellationToken,
    ) -> SlideshowResult<PathBuf> {
        unpack::clean_directory(target_dir, cancel).await?;
        tokio::fs::create_dir_all(target_dir).await?;

        let descriptor = self.capabilities.get(cancel).await?;
        let version = descriptor.max_version(ApiOperation::Download);
        if version <= 0 {
            return Err(SlideshowError::InvalidApiVersion {
                api: ApiOperation::Download.api_name().to_string(),
                version,
            });
        }

        let paths: Vec<&str> = items.iter().map(|i| i.path.as_str()).collect();
        let request = ApiRequest::for_operation(ApiOperation::Download, &descriptor, version)
            .param("mode", "download")
            .param("path", serde_json::to_string(&paths)?)
            .with_session(session);

        let destination = target_dir.join(self.file_name_for(items));
        let mut body = self.nas.stream(&request, cancel).await?;
        let mut file = tokio::fs::File::create(&destination).await?;
        let mut written = 0usize;

        while let Some(chunk) = cancellable(cancel, async { Ok(body.next().await) }).await? {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len();
        }
        file.flush().await?;

        info!(
            items = items.len(),
            bytes = written,
            file = %destination.display(),
            "Downloaded photos"
        );
        Ok(destination)
    }

    fn file_name_for(&self, items: &[CandidateItem]) -> String {
        match items {
            [single] => {
                let name = single.path.rsplit('/').next().unwrap_or_default();
                if name.is_empty() {
                    self.archive_file_name.clone()
                } else {
                    debug!(name, "Single item download, keeping its own name");
                    name.to_string()
                }
            }
            _ => self.archive_file_name.clone(),
        }
    }
}
