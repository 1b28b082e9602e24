pub mod auth;
pub mod capabilities;
pub mod catalog;
pub mod domain;
pub mod download;
pub mod error;
pub mod geo;
pub mod nas;
pub mod pipeline;
pub mod ports;
pub mod search;
pub mod unpack;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::MediaCatalog;
pub use domain::{
    CaptureTime, Credentials, DeleteOutcome, SearchTuning, Session, SlideRecord, SlideshowOptions,
};
pub use error::{SlideshowError, SlideshowResult};
pub use geo::{GeoCache, GeoResolver, GEO_CACHE_TTL};
pub use nas::NasClient;
pub use pipeline::SlideshowPipeline;
pub use ports::{
    ByteStream, NasTransport, PlaceLookup, PortError, PortResult, RequestUrlBuilder, SharedCache,
};
