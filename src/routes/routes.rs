//! Defines routes for the file-sharing service.
//!
//! ## Structure
//! - **File endpoints** (any path, dispatched by method)
//!   - `GET     /`             list stored files
//!   - `POST    /?socketId=`   streaming multipart upload
//!   - `OPTIONS *`             204, no body
//!   - anything else           `hello world`
//!
//! - **Side endpoints**
//!   - `GET /socket?socketId=` WebSocket progress channel
//!   - `GET /healthz`, `GET /readyz`
//!
//! Every response carries `Access-Control-Allow-Origin: *`.

use crate::{
    handlers::{
        file_handlers::{default_route, list_files, preflight, upload_files},
        health_handlers::{healthz, readyz},
        socket_handlers::socket_handler,
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderValue, header},
    routing::{MethodRouter, get},
};
use std::time::Duration;
use tower_http::{set_header::SetResponseHeaderLayer, timeout::TimeoutLayer, trace::TraceLayer};

/// Method table for the file endpoints.
pub fn dispatcher() -> MethodRouter<AppState> {
    get(list_files)
        .post(upload_files)
        .options(preflight)
        .fallback(default_route)
}

/// Side endpoints answer `OPTIONS` and unknown methods like the file routes.
fn side_route(route: MethodRouter<AppState>) -> MethodRouter<AppState> {
    route.options(preflight).fallback(default_route)
}

/// Build the router for all routes, without state or middleware.
pub fn routes() -> Router<AppState> {
    Router::new()
        // side endpoints
        .route("/healthz", side_route(get(healthz)))
        .route("/readyz", side_route(get(readyz)))
        .route("/socket", side_route(get(socket_handler)))
        // file endpoints (mounted at root and below)
        .route("/", dispatcher())
        .route("/{*path}", dispatcher())
        // uploads are streamed to disk; no buffered body limit applies
        .layer(DefaultBodyLimit::disable())
}

/// Slack between the upload deadline and the outer request timeout, so an
/// upload that runs out of time still answers through its own handler.
const BACKSTOP_GRACE: Duration = Duration::from_secs(5);

/// Full application: routes, middleware and shared state.
///
/// `request_timeout` bounds each upload; the tower timeout only catches
/// requests that outlive it by [`BACKSTOP_GRACE`].
#[allow(deprecated)]
pub fn app(state: AppState, request_timeout: Duration) -> Router {
    routes()
        .with_state(state.with_upload_timeout(request_timeout))
        .layer(TimeoutLayer::new(request_timeout + BACKSTOP_GRACE))
        .layer(TraceLayer::new_for_http())
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        ))
}
