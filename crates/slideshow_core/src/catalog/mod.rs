//! crates/slideshow_core/src/catalog/mod.rs
//!
//! Enumerates the photos in the download root and turns each one into a
//! `SlideRecord`. Also hosts the optional convert pass and slide deletion.

pub mod convert;
pub mod metadata;

use crate::domain::{DeleteOutcome, SlideRecord};
use crate::error::SlideshowResult;
use crate::geo::GeoResolver;
use crate::unpack::{ensure_active, run_blocking};
use metadata::PhotoMetadata;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Directory the NAS fills with index thumbnails.
pub const THUMBNAIL_DIR: &str = "@eaDir";

pub const IMAGE_EXTENSIONS: [&str; 8] = ["jpg", "jpeg", "png", "gif", "bmp", "webp", "tif", "tiff"];

struct Photo {
    relative_url: String,
    path: PathBuf,
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|i| i.eq_ignore_ascii_case(e)))
}

fn relative_url(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}

fn is_thumbnail_path(entry: &walkdir::DirEntry) -> bool {
    entry.file_name().to_string_lossy().contains(THUMBNAIL_DIR)
}

/// Every image under `root`, skipping any path through a thumbnail directory,
/// sorted by URL ignoring case.
fn collect_photos(root: &Path) -> Vec<Photo> {
    let mut photos: Vec<Photo> = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_thumbnail_path(e))
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable catalog entry: {}", e);
                None
            }
        })
        .filter(|e| e.file_type().is_file() && has_image_extension(e.path()))
        .filter_map(|e| {
            let path = e.into_path();
            relative_url(root, &path).map(|relative_url| Photo { relative_url, path })
        })
        .collect();

    photos.sort_by_key(|p| p.relative_url.to_lowercase());
    photos
}

pub struct MediaCatalog {
    root: PathBuf,
    geo: Option<Arc<GeoResolver>>,
}

impl MediaCatalog {
    /// `geo` is only consulted when present; pass `None` to disable place names.
    pub fn new(root: PathBuf, geo: Option<Arc<GeoResolver>>) -> Self {
        Self { root, geo }
    }

    /// Lists every photo with its display metadata.
    ///
    /// A photo without readable EXIF still produces a record, with empty metadata.
    pub async fn list_slides(&self, cancel: &CancellationToken) -> SlideshowResult<Vec<SlideRecord>> {
        if !self.root.exists() {
            warn!(root = %self.root.display(), "Photo directory does not exist");
            return Ok(Vec::new());
        }

        let root = self.root.clone();
        let blocking_cancel = cancel.clone();
        let photos = run_blocking(move || {
            let mut read = Vec::new();
            for photo in collect_photos(&root) {
                ensure_active(&blocking_cancel)?;
                let metadata = metadata::read_photo_metadata(&photo.path).unwrap_or_default();
                read.push((photo.relative_url, metadata));
            }
            Ok(read)
        })
        .await?;

        let mut slides = Vec::with_capacity(photos.len());
        for (relative_url, metadata) in photos {
            ensure_active(cancel)?;
            slides.push(self.to_slide(relative_url, metadata, cancel).await);
        }

        info!("Listed {} slides", slides.len());
        Ok(slides)
    }

    async fn to_slide(
        &self,
        relative_url: String,
        metadata: PhotoMetadata,
        cancel: &CancellationToken,
    ) -> SlideRecord {
        let (map_link, place) = match metadata.coordinates {
            Some((lat, lon)) => {
                let place = match &self.geo {
                    Some(geo) => geo.resolve(lat, lon, cancel).await,
                    None => String::new(),
                };
                (metadata::map_link(lat, lon), place)
            }
            None => (String::new(), String::new()),
        };

        SlideRecord {
            relative_url,
            taken_at: metadata.taken_at,
            map_link,
            place,
        }
    }

    /// Converts every convertible photo to a scaled-down JPEG and removes the original.
    ///
    /// Irreversible; only runs when explicitly invoked. Returns the number converted.
    pub async fn convert_and_compress(&self, cancel: &CancellationToken) -> SlideshowResult<usize> {
        if !self.root.exists() {
            warn!(root = %self.root.display(), "Photo directory does not exist");
            return Ok(0);
        }

        let root = self.root.clone();
        let cancel = cancel.clone();
        run_blocking(move || {
            let mut converted = 0;
            for photo in collect_photos(&root) {
                ensure_active(&cancel)?;
                if !convert::is_convertible(&photo.path) {
                    continue;
                }
                match convert::convert_file(&photo.path) {
                    Ok(_) => converted += 1,
                    Err(e) => warn!(path = %photo.path.display(), "Failed to convert photo: {}", e),
                }
            }
            info!(converted, "Finished converting photos");
            Ok(converted)
        })
        .await
    }

    /// Deletes the slides whose relative URL is listed in `ids`.
    ///
    /// Ids that do not match a current slide are reported back untouched. Repeated
    /// ids are handled once.
    pub async fn delete_slides(
        &self,
        ids: Vec<String>,
        cancel: &CancellationToken,
    ) -> SlideshowResult<DeleteOutcome> {
        let root = self.root.clone();
        let cancel = cancel.clone();
        run_blocking(move || {
            let photos = if root.exists() {
                collect_photos(&root)
            } else {
                Vec::new()
            };
            let mut outcome = DeleteOutcome::default();
            let mut handled = HashSet::new();

            for id in ids {
                ensure_active(&cancel)?;
                if !handled.insert(id.clone()) {
                    continue;
                }
                match photos.iter().find(|p| p.relative_url == id) {
                    Some(photo) => {
                        info!(photo = %id, "Deleting photo");
                        match fs::remove_file(&photo.path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                                warn!(photo = %id, "Photo was already gone");
                            }
                            Err(e) => return Err(e.into()),
                        }
                        outcome.deleted.push(id);
                    }
                    None => outcome.not_found.push(id),
                }
            }
            Ok(outcome)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SlideshowError;
    use crate::geo::{GeoCache, GEO_CACHE_TTL};
    use crate::ports::{PlaceLookup, PortResult};
    use async_trait::async_trait;
    use image::{ImageBuffer, Rgb};

    struct FixedLookup;

    #[async_trait]
    impl PlaceLookup for FixedLookup {
        async fn lookup(&self, _latitude: f64, _longitude: f64) -> PortResult<String> {
            Ok("Nowhere, NW".to_string())
        }
    }

    fn seed(root: &Path) {
        fs::create_dir_all(root.join("@eaDir/B.jpg")).unwrap();
        fs::write(root.join("@eaDir/B.jpg/SYNOPHOTO_THUMB_M.jpg"), b"thumb").unwrap();
        fs::create_dir_all(root.join("Trips/@eaDir_old")).unwrap();
        fs::write(root.join("Trips/@eaDir_old/stale.jpg"), b"thumb").unwrap();
        fs::write(root.join("Trips/scan.TIF"), b"no exif here").unwrap();
        fs::write(root.join("Trips/c.JPEG"), b"no exif here").unwrap();
        fs::write(root.join("b.jpg"), b"no exif here").unwrap();
        fs::write(root.join("A.png"), b"no exif here").unwrap();
        fs::write(root.join("notes.txt"), b"ignored").unwrap();
        fs::write(root.join("clip.mp4"), b"ignored").unwrap();
    }

    #[tokio::test]
    async fn test_listing_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let catalog = MediaCatalog::new(dir.path().to_path_buf(), None);

        let slides = catalog.list_slides(&CancellationToken::new()).await.unwrap();

        let urls: Vec<&str> = slides.iter().map(|s| s.relative_url.as_str()).collect();
        assert_eq!(urls, vec!["A.png", "b.jpg", "Trips/c.JPEG", "Trips/scan.TIF"]);
        assert!(slides
            .iter()
            .all(|s| s.taken_at.is_none() && s.map_link.is_empty() && s.place.is_empty()));
    }

    #[tokio::test]
    async fn test_missing_root_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = MediaCatalog::new(dir.path().join("absent"), None);

        assert!(catalog
            .list_slides(&CancellationToken::new())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_to_slide_resolves_place_when_enabled() {
        let geo = Arc::new(GeoResolver::new(
            Arc::new(FixedLookup),
            GeoCache::new(None, GEO_CACHE_TTL),
        ));
        let catalog = MediaCatalog::new(PathBuf::from("."), Some(geo));
        let metadata = PhotoMetadata {
            taken_at: None,
            coordinates: Some((37.78333333333333, -122.41666666666667)),
        };

        let slide = catalog
            .to_slide("x.jpg".into(), metadata, &CancellationToken::new())
            .await;

        assert_eq!(slide.place, "Nowhere, NW");
        assert!(slide.map_link.ends_with("37.78333333333333,-122.41666666666667"));
    }

    #[tokio::test]
    async fn test_to_slide_without_geo_has_link_but_no_place() {
        let catalog = MediaCatalog::new(PathBuf::from("."), None);
        let metadata = PhotoMetadata {
            taken_at: None,
            coordinates: Some((1.5, 2.5)),
        };

        let slide = catalog
            .to_slide("x.jpg".into(), metadata, &CancellationToken::new())
            .await;

        assert_eq!(slide.map_link, "https://www.google.com/maps?q=1.5,2.5");
        assert!(slide.place.is_empty());
    }

    #[tokio::test]
    async fn test_listing_respects_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let catalog = MediaCatalog::new(dir.path().to_path_buf(), None);
        let token = CancellationToken::new();
        token.cancel();

        let result = catalog.list_slides(&token).await;

        assert!(matches!(result, Err(SlideshowError::Cancelled)));
    }

    #[tokio::test]
    async fn test_delete_reports_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let catalog = MediaCatalog::new(dir.path().to_path_buf(), None);

        let outcome = catalog
            .delete_slides(
                vec!["b.jpg".into(), "missing.jpg".into(), "notes.txt".into()],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.deleted, vec!["b.jpg"]);
        assert_eq!(outcome.not_found, vec!["missing.jpg", "notes.txt"]);
        assert!(!dir.path().join("b.jpg").exists());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn test_delete_handles_repeated_ids_once() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());
        let catalog = MediaCatalog::new(dir.path().to_path_buf(), None);

        let outcome = catalog
            .delete_slides(
                vec![
                    "b.jpg".into(),
                    "b.jpg".into(),
                    "Trips/c.JPEG".into(),
                    "ghost.jpg".into(),
                    "ghost.jpg".into(),
                ],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(outcome.deleted, vec!["b.jpg", "Trips/c.JPEG"]);
        assert_eq!(outcome.not_found, vec!["ghost.jpg"]);
        assert!(!dir.path().join("b.jpg").exists());
        assert!(!dir.path().join("Trips/c.JPEG").exists());
    }

    #[tokio::test]
    async fn test_convert_replaces_lossless_formats_only() {
        let dir = tempfile::tempdir().unwrap();
        ImageBuffer::from_pixel(20, 10, Rgb([10u8, 20, 30]))
            .save(dir.path().join("wide.png"))
            .unwrap();
        ImageBuffer::from_pixel(10, 10, Rgb([10u8, 20, 30]))
            .save(dir.path().join("scan.tif"))
            .unwrap();
        fs::write(dir.path().join("kept.jpg"), b"jpeg").unwrap();
        let catalog = MediaCatalog::new(dir.path().to_path_buf(), None);

        let converted = catalog
            .convert_and_compress(&CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(converted, 2);
        assert!(!dir.path().join("wide.png").exists());
        assert!(!dir.path().join("scan.tif").exists());
        assert!(dir.path().join("scan.jpg").exists());
        assert!(dir.path().join("wide.jpg").exists());
        assert_eq!(fs::read(dir.path().join("kept.jpg")).unwrap(), b"jpeg");
    }
}
