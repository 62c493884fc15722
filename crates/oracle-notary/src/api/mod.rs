//! C7: axum routes translating wire JSON in and out of the domain pipeline.
//! Thin on purpose — every handler's job is parse request, call into
//! `domain`, translate the result or error, nothing else.

mod health;
mod info;
mod metrics;
mod notarize;
mod random;
mod root;
mod whitelist;

use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::HeaderValue;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::domain::RuntimeContext;
use crate::errors::ApiError;

const REQUEST_ID_HEADER: &str = "x-request-id";
/// Independent of the extractor's own 10 KiB `requestBody` domain cap — this
/// bounds the whole HTTP request body tower sees before it ever reaches the
/// validator.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Request id assigned by [`request_id_middleware`], read back out of
/// request extensions by handlers that need to echo it in an error body.
#[derive(Clone)]
pub struct RequestId(pub String);

/// `axum::Json` extractor wrapper that translates a parse failure into
/// [`ApiError::MalformedRequest`] instead of axum's bare-text default
/// rejection, so every failure mode on `/notarize` comes back through the
/// same error envelope.
pub struct DomainJson<T>(pub T);

impl<S, T> FromRequest<S> for DomainJson<T>
where
    axum::Json<T>: FromRequest<S, Rejection = JsonRejection>,
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match axum::Json::<T>::from_request(req, state).await {
            Ok(axum::Json(value)) => Ok(DomainJson(value)),
            Err(rejection) => Err(ApiError::MalformedRequest(rejection.body_text())),
        }
    }
}

pub fn router(ctx: RuntimeContext) -> Router {
    Router::new()
        .route("/", get(root::root))
        .route("/notarize", post(notarize::notarize))
        .route("/random", get(random::random))
        .route("/info", get(info::info))
        .route("/whitelist", get(whitelist::whitelist))
        .route("/health", get(health::health))
        .with_state(ctx)
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_BYTES))
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
}

/// A second, unauthenticated router bound to its own metrics port, kept
/// separate so `/metrics` is never reachable through the public-facing
/// notarization listener.
pub fn metrics_router() -> Router {
    Router::new().route("/metrics", get(metrics::metrics))
}

async fn request_id_middleware(mut req: Request<Body>, next: Next) -> Response {
    let request_id = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    req.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(req).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

/// Serve `router`, bound to `addr`, until `shutdown` resolves.
pub async fn serve(addr: SocketAddr, router: Router, shutdown: oneshot::Receiver<()>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "serving HTTP API");
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            shutdown.await.ok();
        })
        .await
}
