//! Streaming file-sharing service.
//!
//! Clients upload files with a multipart `POST` that is streamed straight to
//! disk, follow per-file progress over a WebSocket keyed by `socketId`, and
//! list stored files with `GET`.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::routes::app;
pub use state::AppState;
