//! crates/slideshow_core/src/catalog/metadata.rs
//!
//! Reads capture time and GPS position from a photo's EXIF block.

use crate::domain::CaptureTime;
use chrono::{DateTime, NaiveDateTime};
use exif::{Exif, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// What the catalog needs from one photo's EXIF data.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PhotoMetadata {
    pub taken_at: Option<CaptureTime>,
    /// Signed decimal degrees `(latitude, longitude)`.
    pub coordinates: Option<(f64, f64)>,
}

/// Reads EXIF from `path`; `None` when the file has no readable EXIF block.
pub fn read_photo_metadata(path: &Path) -> Option<PhotoMetadata> {
    let file = File::open(path).ok()?;
    let exif = Reader::new()
        .read_from_container(&mut BufReader::new(file))
        .ok()?;
    Some(metadata_from_exif(&exif))
}

fn metadata_from_exif(exif: &Exif) -> PhotoMetadata {
    let date = ascii_field(exif, Tag::DateTimeOriginal).or_else(|| ascii_field(exif, Tag::DateTime));
    let offset =
        ascii_field(exif, Tag::OffsetTimeOriginal).or_else(|| ascii_field(exif, Tag::OffsetTime));

    let taken_at = date.and_then(|d| parse_capture_time(&d, offset.as_deref()));

    let coordinates = match (
        rational_field(exif, Tag::GPSLatitude),
        ascii_field(exif, Tag::GPSLatitudeRef),
        rational_field(exif, Tag::GPSLongitude),
        ascii_field(exif, Tag::GPSLongitudeRef),
    ) {
        (Some(lat), Some(lat_ref), Some(lon), Some(lon_ref)) => {
            coordinates_from_dms(&lat, &lat_ref, &lon, &lon_ref)
        }
        _ => None,
    };

    PhotoMetadata {
        taken_at,
        coordinates,
    }
}

fn ascii_field(exif: &Exif, tag: Tag) -> Option<String> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Ascii(values) => values
            .first()
            .map(|v| String::from_utf8_lossy(v).trim_matches(|c| c == '\0' || c == ' ').to_string())
            .filter(|s| !s.is_empty()),
        _ => None,
    }
}

fn rational_field(exif: &Exif, tag: Tag) -> Option<Vec<f64>> {
    match &exif.get_field(tag, In::PRIMARY)?.value {
        Value::Rational(values) => Some(values.iter().map(|r| r.to_f64()).collect()),
        _ => None,
    }
}

/// Parses an EXIF date, attaching `offset` (e.g. `+02:00`) when it parses.
pub fn parse_capture_time(date: &str, offset: Option<&str>) -> Option<CaptureTime> {
    let date = date.trim();
    if let Some(offset) = offset.map(str::trim).filter(|o| !o.is_empty()) {
        let zoned = format!("{} {}", date, offset);
        if let Ok(dt) = DateTime::parse_from_str(&zoned, &format!("{} %:z", EXIF_DATE_FORMAT)) {
            return Some(CaptureTime::Zoned(dt));
        }
    }
    NaiveDateTime::parse_from_str(date, EXIF_DATE_FORMAT)
        .ok()
        .map(CaptureTime::Local)
}

/// Converts a (degrees, minutes, seconds) triple to signed decimal degrees.
///
/// South and west references are negative. Anything but exactly three parts, or
/// an unknown reference, yields `None`.
pub fn dms_to_decimal(dms: &[f64], reference: &str) -> Option<f64> {
    let [degrees, minutes, seconds] = dms else {
        return None;
    };
    let magnitude = degrees + minutes / 60.0 + seconds / 3600.0;
    match reference.trim().to_ascii_uppercase().as_str() {
        "N" | "E" => Some(magnitude),
        "S" | "W" => Some(-magnitude),
        _ => None,
    }
}

pub fn coordinates_from_dms(
    latitude: &[f64],
    latitude_ref: &str,
    longitude: &[f64],
    longitude_ref: &str,
) -> Option<(f64, f64)> {
    Some((
        dms_to_decimal(latitude, latitude_ref)?,
        dms_to_decimal(longitude, longitude_ref)?,
    ))
}

/// A map link centred on the coordinates.
pub fn map_link(latitude: f64, longitude: f64) -> String {
    format!("https://www.google.com/maps?q={},{}", latitude, longitude)
}
