//! services/api/src/config.rs
//!
//! Defines the service configuration and how it is loaded.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use slideshow_core::{Credentials, SearchTuning, SlideshowOptions};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub log_level: Level,
    pub nas_base_url: Url,
    pub nas_account: String,
    pub nas_password: String,
    pub nas_accept_invalid_certs: bool,
    pub search_folders: Vec<String>,
    pub sample_count: usize,
    pub search_timeout: Duration,
    pub download_root: PathBuf,
    pub download_file_name: String,
    pub geolocation_enabled: bool,
    pub geolocation_mocks: bool,
    pub google_maps_api_key: Option<String>,
    /// Redis URL for the shared geo cache tier; `None` keeps the cache in-process.
    pub redis_url: Option<String>,
    pub convert_photos: bool,
    pub cors_origin: String,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("nas_base_url", &self.nas_base_url.as_str())
            .field("nas_account", &self.nas_account)
            .field("search_folders", &self.search_folders)
            .field("sample_count", &self.sample_count)
            .field("download_root", &self.download_root)
            .field("geolocation_enabled", &self.geolocation_enabled)
            .field("distributed_cache", &self.redis_url.is_some())
            .finish_non_exhaustive()
    }
}

/// Reads a variable, treating an empty value as unset.
fn optional(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn required(name: &str) -> Result<String, ConfigError> {
    optional(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parsed<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        None => Ok(default),
    }
}

fn flag(name: &str, default: bool) -> Result<bool, ConfigError> {
    match optional(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(ConfigError::InvalidValue(
                name.to_string(),
                format!("'{}' is not a boolean", other),
            )),
        },
        None => Ok(default),
    }
}

/// The Redis URL to use, if the distributed cache is switched on.
pub fn distributed_cache_url(
    enabled: bool,
    redis_url: Option<String>,
) -> Result<Option<String>, ConfigError> {
    match (enabled, redis_url) {
        (false, _) => Ok(None),
        (true, Some(url)) => Ok(Some(url)),
        (true, None) => Err(ConfigError::MissingVar("REDIS_URL".to_string())),
    }
}

/// Splits a comma separated folder list, dropping blanks.
pub fn parse_folder_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Server Settings ---
        let bind_address_str =
            std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let cors_origin =
            optional("CORS_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        // --- NAS Connection ---
        let nas_base_url = Url::parse(&required("NAS_BASE_URL")?)
            .map_err(|e| ConfigError::InvalidValue("NAS_BASE_URL".to_string(), e.to_string()))?;
        let nas_account = required("NAS_ACCOUNT")?;
        let nas_password = required("NAS_PASSWORD")?;
        let nas_accept_invalid_certs = flag("NAS_ACCEPT_INVALID_CERTS", false)?;

        // --- Search and Download ---
        let search_folders = parse_folder_list(&required("SEARCH_FOLDERS")?);
        if search_folders.is_empty() {
            return Err(ConfigError::InvalidValue(
                "SEARCH_FOLDERS".to_string(),
                "at least one folder is required".to_string(),
            ));
        }
        let sample_count = parsed("PHOTO_SAMPLE_COUNT", 20usize)?;
        let search_timeout = Duration::from_secs(parsed("SEARCH_TIMEOUT_SECS", 120u64)?);
        let download_root = optional("DOWNLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./photos"));
        let download_file_name =
            optional("DOWNLOAD_FILE_NAME").unwrap_or_else(|| "photos.zip".to_string());
        let convert_photos = flag("CONVERT_PHOTOS", false)?;

        // --- Geolocation ---
        let geolocation_enabled = flag("GEOLOCATION_ENABLED", false)?;
        let geolocation_mocks = flag("GEOLOCATION_MOCKS", true)?;
        let google_maps_api_key = optional("GOOGLE_MAPS_API_KEY");
        if geolocation_enabled && !geolocation_mocks && google_maps_api_key.is_none() {
            return Err(ConfigError::MissingVar("GOOGLE_MAPS_API_KEY".to_string()));
        }
        let redis_url = distributed_cache_url(
            flag("DISTRIBUTED_CACHE_ENABLED", false)?,
            optional("REDIS_URL"),
        )?;

        Ok(Self {
            bind_address,
            log_level,
            nas_base_url,
            nas_account,
            nas_password,
            nas_accept_invalid_certs,
            search_folders,
            sample_count,
            search_timeout,
            download_root,
            download_file_name,
            geolocation_enabled,
            geolocation_mocks,
            google_maps_api_key,
            redis_url,
            convert_photos,
            cors_origin,
        })
    }

    /// Pipeline inputs derived from this configuration.
    pub fn slideshow_options(&self) -> SlideshowOptions {
        SlideshowOptions {
            search_folders: self.search_folders.clone(),
            sample_count: self.sample_count,
            search_timeout: self.search_timeout,
            download_root: self.download_root.clone(),
            archive_file_name: self.download_file_name.clone(),
            geolocation_enabled: self.geolocation_enabled,
            convert_after_unpack: self.convert_photos,
            search_tuning: SearchTuning::default(),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            account: self.nas_account.clone(),
            password: self.nas_password.clone(),
        }
    }
}

/// A fully populated configuration for tests, rooted at `download_root`.
#[cfg(test)]
pub(crate) fn sample_config(download_root: PathBuf) -> Config {
    Config {
        bind_address: SocketAddr::from(([127, 0, 0, 1], 3000)),
        log_level: Level::INFO,
        nas_base_url: Url::parse("https://nas.local:5001").unwrap(),
        nas_account: "viewer".into(),
        nas_password: "secret".into(),
        nas_accept_invalid_certs: true,
        search_folders: vec!["/photo".into()],
        sample_count: 7,
        search_timeout: Duration::from_secs(45),
        download_root,
        download_file_name: "batch.zip".into(),
        geolocation_enabled: true,
        geolocation_mocks: true,
        google_maps_api_key: None,
        redis_url: None,
        convert_photos: true,
        cors_origin: "http://localhost:3000".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_list_drops_blanks() {
        assert_eq!(
            parse_folder_list(" /photo/2020, ,/photo/2021 ,"),
            vec!["/photo/2020", "/photo/2021"]
        );
        assert!(parse_folder_list(" , ").is_empty());
    }

    #[test]
    fn test_distributed_cache_needs_a_url_only_when_enabled() {
        assert_eq!(
            distributed_cache_url(false, Some("redis://cache:6379".into())).unwrap(),
            None
        );
        assert_eq!(
            distributed_cache_url(true, Some("redis://cache:6379".into())).unwrap(),
            Some("redis://cache:6379".to_string())
        );
        assert!(matches!(
            distributed_cache_url(true, None),
            Err(ConfigError::MissingVar(name)) if name == "REDIS_URL"
        ));
    }

    #[test]
    fn test_options_carry_configured_values() {
        let config = sample_config(PathBuf::from("/tmp/slides"));

        let options = config.slideshow_options();

        assert_eq!(options.sample_count, 7);
        assert_eq!(options.search_timeout, Duration::from_secs(45));
        assert_eq!(options.archive_path(), PathBuf::from("/tmp/slides/batch.zip"));
        assert!(options.geolocation_enabled && options.convert_after_unpack);
        assert_eq!(config.credentials().account, "viewer");
        assert!(!format!("{:?}", config).contains("secret"));
    }
}
