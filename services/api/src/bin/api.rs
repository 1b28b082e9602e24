//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{
        GooglePlaceLookup, MockPlaceLookup, RedisSharedCache, ReqwestNasTransport,
        SynologyUrlBuilder, GEOCODE_TIMEOUT,
    },
    config::Config,
    error::ApiError,
    web::{
        delete_slides_handler, download_photos_handler, list_slides_handler, rest::ApiDoc,
        state::AppState,
    },
};
use axum::http::{header::{ACCEPT, CONTENT_TYPE}, HeaderValue, Method};
use axum::{routing::get, Router};
use slideshow_core::{
    GeoCache, GeoResolver, NasClient, PlaceLookup, SharedCache, SlideshowPipeline, GEO_CACHE_TTL,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, services::ServeDir};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// The shared geo cache tier. The cache is advisory, so an unreachable Redis
/// leaves the service running on the in-process tier alone.
async fn shared_cache(config: &Config) -> Option<Arc<dyn SharedCache>> {
    let url = config.redis_url.as_deref()?;
    match RedisSharedCache::connect(url).await {
        Ok(cache) => Some(Arc::new(cache)),
        Err(e) => {
            warn!("Shared geo cache unavailable, using the in-process cache only: {}", e);
            None
        }
    }
}

/// Builds the place resolver, or `None` when geolocation is switched off.
async fn geo_resolver(config: &Config) -> Result<Option<Arc<GeoResolver>>, ApiError> {
    if !config.geolocation_enabled {
        return Ok(None);
    }

    let lookup: Arc<dyn PlaceLookup> = if config.geolocation_mocks {
        info!("Geolocation enabled with the mock geocoder");
        Arc::new(MockPlaceLookup)
    } else {
        let api_key = config
            .google_maps_api_key
            .clone()
            .ok_or_else(|| ApiError::Internal("GOOGLE_MAPS_API_KEY is required".to_string()))?;
        info!("Geolocation enabled with the Google Maps geocoder");
        Arc::new(GooglePlaceLookup::new(api_key, GEOCODE_TIMEOUT)?)
    };

    Ok(Some(Arc::new(GeoResolver::new(
        lookup,
        GeoCache::new(shared_cache(config).await, GEO_CACHE_TTL),
    ))))
}

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let transport = Arc::new(ReqwestNasTransport::new(config.nas_accept_invalid_certs)?);
    let urls = Arc::new(
        SynologyUrlBuilder::new(&config.nas_base_url)
            .map_err(|e| ApiError::Internal(format!("Invalid NAS base URL: {}", e)))?,
    );
    let nas = NasClient::new(transport, urls);
    let geo = geo_resolver(&config).await?;

    // --- 3. Build the Pipeline and Shared AppState ---
    tokio::fs::create_dir_all(&config.download_root).await?;
    let pipeline = Arc::new(SlideshowPipeline::new(
        nas,
        config.credentials(),
        config.slideshow_options(),
        geo,
    ));
    let app_state = Arc::new(AppState::new(pipeline));

    // --- 4. Create the Web Router ---
    let origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {}", e)))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/download-photos", get(download_photos_handler))
        .route("/slides", get(list_slides_handler).delete(delete_slides_handler))
        .nest_service("/photos", ServeDir::new(&config.download_root))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
