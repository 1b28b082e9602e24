pub mod cache;
pub mod geocoding;
pub mod synology;

pub use cache::RedisSharedCache;
pub use geocoding::{GooglePlaceLookup, MockPlaceLookup, GEOCODE_TIMEOUT};
pub use synology::{ReqwestNasTransport, SynologyUrlBuilder};
