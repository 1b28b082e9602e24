//! crates/slideshow_core/src/catalog/convert.rs
//!
//! Re-encodes large lossless photos as smaller JPEGs. Destructive: the source
//! file is removed once the JPEG has been written.

use crate::error::{SlideshowError, SlideshowResult};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader};
use std::fs::{self, File};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONVERTIBLE_EXTENSIONS: [&str; 5] = ["png", "bmp", "tif", "tiff", "webp"];
pub const SCALE_FACTOR: f32 = 0.8;
pub const JPEG_QUALITY: u8 = 75;

fn image_error(err: image::ImageError) -> SlideshowError {
    SlideshowError::Io(io::Error::new(io::ErrorKind::InvalidData, err))
}

pub fn is_convertible(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| CONVERTIBLE_EXTENSIONS.iter().any(|c| c.eq_ignore_ascii_case(e)))
}

fn scaled(dimension: u32) -> u32 {
    ((dimension as f32) * SCALE_FACTOR).round().max(1.0) as u32
}

/// `<stem>.jpg` next to `source`, numbered if that name is taken.
fn jpeg_destination(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let dir = source.parent().unwrap_or_else(|| Path::new("."));
    let first = dir.join(format!("{}.jpg", stem));
    if !first.exists() {
        return first;
    }
    (1..)
        .map(|n| dir.join(format!("{}_{}.jpg", stem, n)))
        .find(|p| !p.exists())
        .unwrap_or(first)
}

/// Auto-orients, scales and re-encodes `source`, then deletes it. Returns the new file.
pub fn convert_file(source: &Path) -> SlideshowResult<PathBuf> {
    let mut decoder = ImageReader::open(source)?
        .with_guessed_format()?
        .into_decoder()
        .map_err(image_error)?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);
    let mut image = DynamicImage::from_decoder(decoder).map_err(image_error)?;
    image.apply_orientation(orientation);

    let resized = image.resize_exact(
        scaled(image.width()),
        scaled(image.height()),
        FilterType::Lanczos3,
    );

    let destination = jpeg_destination(source);
    let writer = BufWriter::new(File::create(&destination)?);
    let encoder = JpegEncoder::new_with_quality(writer, JPEG_QUALITY);
    if let Err(e) = resized.to_rgb8().write_with_encoder(encoder) {
        let _ = fs::remove_file(&destination);
        return Err(image_error(e));
    }

    fs::remove_file(source)?;
    debug!(from = %source.display(), to = %destination.display(), "Converted photo");
    Ok(destination)
}
