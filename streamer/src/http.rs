//! HTTP front door: landing page, MJPEG stream, single-frame snapshot.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::debug;

use crate::hub::FrameHub;
use crate::mjpeg::{StreamSession, BOUNDARY};

/// Everything the handlers need, injected at construction. The routing layer
/// holds exactly one hub reference; there is no globally reachable service.
pub struct AppState {
    pub hub: Arc<FrameHub>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/stream", get(stream))
        .route("/frame", get(snapshot))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Live Camera Stream</title>
  <style>
    body { font-family: Arial, sans-serif; margin: 20px; background: #f3f3f3; }
    .wrapper { background: #fff; padding: 16px; border-radius: 8px; box-shadow: 0 2px 6px rgba(0,0,0,0.1); }
    img { width: 100%; border: 1px solid #ddd; border-radius: 6px; background: #fafafa; min-height: 160px; }
    h1 { margin-bottom: 4px; }
  </style>
</head>
<body>
  <div class="wrapper">
    <h1>Camera Monitor</h1>
    <img src="/stream" alt="Live stream">
  </div>
</body>
</html>
"#;

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// GET /stream — unbounded multipart body, one part per new frame. The
/// connection stays open until the client disconnects or the hub stops.
async fn stream(State(state): State<Arc<AppState>>) -> Response {
    debug!("viewer connected to stream");
    let session = StreamSession::new(&state.hub);

    Response::builder()
        .status(StatusCode::OK)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/x-mixed-replace; boundary={BOUNDARY}"),
        )
        .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
        .header(header::PRAGMA, "no-cache")
        .body(Body::from_stream(session.into_byte_stream()))
        .expect("static response parts are valid")
}

/// GET /frame — the most recent encoded frame as a plain JPEG, for clients
/// that poll instead of holding a stream open.
async fn snapshot(State(state): State<Arc<AppState>>) -> Response {
    match state.hub.latest() {
        Some((frame, version)) => {
            debug!(version, bytes = frame.size_bytes(), "serving snapshot");
            (
                [
                    (header::CONTENT_TYPE, "image/jpeg"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                frame.data().clone(),
            )
                .into_response()
        }
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
