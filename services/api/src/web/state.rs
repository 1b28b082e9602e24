//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use slideshow_core::SlideshowPipeline;
use std::sync::Arc;
use tokio::sync::RwLock;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
pub struct AppState {
    pub pipeline: Arc<SlideshowPipeline>,
    /// Refresh and delete hold the write half; listing holds the read half so it
    /// never sees a half-replaced photo directory.
    pub refresh_lock: RwLock<()>,
}

impl AppState {
    pub fn new(pipeline: Arc<SlideshowPipeline>) -> Self {
        Self {
            pipeline,
            refresh_lock: RwLock::new(()),
        }
    }
}
