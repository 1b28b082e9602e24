//! crates/slideshow_core/src/pipeline.rs
//!
//! Wires the components into the refresh flow: login, search, download,
//! unpack, optional convert, logout, then list the resulting slides.

use crate::auth::SessionAuthenticator;
use crate::capabilities::CapabilityCache;
use crate::catalog::MediaCatalog;
use crate::domain::{Credentials, SlideRecord, SlideshowOptions};
use crate::download::Downloader;
use crate::error::SlideshowResult;
use crate::geo::GeoResolver;
use crate::nas::NasClient;
use crate::search::SearchOrchestrator;
use crate::unpack;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct SlideshowPipeline {
    auth: SessionAuthenticator,
    search: SearchOrchestrator,
    downloader: Downloader,
    catalog: MediaCatalog,
    options: SlideshowOptions,
}

impl SlideshowPipeline {
    /// `geo` is ignored unless geolocation is enabled in `options`.
    pub fn new(
        nas: NasClient,
        credentials: Credentials,
        options: SlideshowOptions,
        geo: Option<Arc<GeoResolver>>,
    ) -> Self {
        let capabilities = Arc::new(CapabilityCache::new(nas.clone()));
        let geo = geo.filter(|_| options.geolocation_enabled);

        Self {
            auth: SessionAuthenticator::new(nas.clone(), capabilities.clone(), credentials),
            search: SearchOrchestrator::new(
                nas.clone(),
                capabilities.clone(),
                options.search_folders.clone(),
                options.sample_count,
                options.search_timeout,
                options.search_tuning,
            ),
            downloader: Downloader::new(nas, capabilities, options.archive_file_name.clone()),
            catalog: MediaCatalog::new(options.download_root.clone(), geo),
            options,
        }
    }

    pub fn catalog(&self) -> &MediaCatalog {
        &self.catalog
    }

    /// Replaces the local photo set with a fresh random sample and lists it.
    ///
    /// The NAS session is released before the slides are read back. An empty
    /// sample leaves the current photos in place.
    pub async fn refresh(&self, cancel: &CancellationToken) -> SlideshowResult<Vec<SlideRecord>> {
        let root = &self.options.download_root;
        let archive = self.options.archive_path();

        self.auth
            .with_session(cancel, |session| async move {
                let items = self.search.find_photos(&session, cancel).await?;
                if items.is_empty() {
                    info!("Search found no photos, keeping the current slides");
                    return Ok(());
                }

                self.downloader.download(&session, &items, root, cancel).await?;
                unpack::unpack(&archive, root, cancel).await?;

                if self.options.convert_after_unpack {
                    self.catalog.convert_and_compress(cancel).await?;
                }
                Ok(())
            })
            .await?;

        self.catalog.list_slides(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlideshowError;
    use crate::test_support::{test_options, zip_bytes, FakeNas};
    use std::fs;

    fn credentials() -> Credentials {
        Credentials {
            account: "slideshow".into(),
            password: "hunter2".into(),
        }
    }

    fn pipeline(fake: &FakeNas, root: &std::path::Path) -> SlideshowPipeline {
        SlideshowPipeline::new(fake.client(), credentials(), test_options(root), None)
    }

    #[tokio::test]
    async fn test_refresh_runs_the_full_flow() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.jpg"), b"stale").unwrap();
        let fake = FakeNas::new().with_files(&["/photo/2020/a.jpg", "/photo/2021/b.jpg"]);
        fake.state().download_body = zip_bytes(&[
            ("2020/a.jpg", b"not really a jpeg"),
            ("2021/b.jpg", b"not really a jpeg"),
            ("2021/.DS_Store", b"junk"),
        ]);

        let slides = pipeline(&fake, dir.path())
            .refresh(&CancellationToken::new())
            .await
            .unwrap();

        let urls: Vec<&str> = slides.iter().map(|s| s.relative_url.as_str()).collect();
        assert_eq!(urls, vec!["a.jpg", "b.jpg"]);
        assert!(slides.iter().all(|s| s.taken_at.is_none() && s.place.is_empty()));
        assert!(!dir.path().join("old.jpg").exists());
        assert!(!dir.path().join("photos.zip").exists());
        assert_eq!(fake.calls("query"), 1);
        assert_eq!(fake.calls("login"), 1);
        assert_eq!(fake.calls("clean"), 1);
        assert_eq!(fake.calls("download"), 1);
        assert_eq!(fake.calls("logout"), 1);
    }

    #[tokio::test]
    async fn test_empty_sample_keeps_existing_slides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("old.jpg"), b"stale").unwrap();
        let fake = FakeNas::new();

        let slides = pipeline(&fake, dir.path())
            .refresh(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].relative_url, "old.jpg");
        assert_eq!(fake.calls("download"), 0);
        assert_eq!(fake.calls("logout"), 1);
    }

    #[tokio::test]
    async fn test_search_timeout_still_logs_out() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeNas::new().with_files(&["/photo/a.jpg"]);
        fake.state().unfinished_polls = None;

        let result = pipeline(&fake, dir.path())
            .refresh(&CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SlideshowError::SearchTimedOut(_))));
        assert_eq!(fake.calls("download"), 0);
        assert_eq!(fake.calls("clean"), 1);
        assert_eq!(fake.calls("logout"), 1);
    }

    #[tokio::test]
    async fn test_failed_login_skips_search() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeNas::new();
        fake.state().syno_token = String::new();

        let result = pipeline(&fake, dir.path())
            .refresh(&CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SlideshowError::AuthenticationFailed(_))));
        assert_eq!(fake.calls("start"), 0);
        assert_eq!(fake.calls("logout"), 0);
    }

    #[tokio::test]
    async fn test_single_photo_is_written_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let fake = FakeNas::new().with_files(&["/photo/only.png"]);
        fake.state().download_body = b"raw png bytes".to_vec();
        let mut options = test_options(dir.path());
        options.sample_count = 1;

        let slides = SlideshowPipeline::new(fake.client(), credentials(), options, None)
            .refresh(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(slides.len(), 1);
        assert_eq!(slides[0].relative_url, "only.png");
    }
}
