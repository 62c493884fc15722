use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::infra::metrics;

/// `GET /metrics`, served off the metrics-only port (see
/// [`super::metrics_router`]).
pub async fn metrics() -> Response {
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], metrics::encode()).into_response()
}
