pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{delete_slides_handler, download_photos_handler, list_slides_handler};
