use std::time::{SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;

use super::RequestId;
use crate::domain::RuntimeContext;
use crate::domain::random::{self, RandomError};
use crate::errors::ApiError;
use crate::infra::metrics;

#[derive(Debug, Deserialize)]
pub struct RandomQuery {
    max: String,
}

/// `max` is parsed as a `u128` decimal directly out of the query string
/// rather than through any numeric query type axum ships, since `u128`
/// isn't one of them.
pub async fn random(
    State(ctx): State<RuntimeContext>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    Query(query): Query<RandomQuery>,
) -> Response {
    metrics::record_request("random");
    match run(&ctx, &query.max).await {
        Ok(oracle_data) => Json(oracle_data).into_response(),
        Err(err) => err.into_response_with_request_id(request_id),
    }
}

async fn run(ctx: &RuntimeContext, max: &str) -> Result<crate::domain::oracle::OracleData, ApiError> {
    let max: u128 = max
        .parse()
        .map_err(|_| ApiError::Random(RandomError::InvalidMax))?;
    let timestamp = current_unix_timestamp();
    let oracle_data = random::attested_random(
        max,
        timestamp,
        ctx.enclave.as_ref(),
        ctx.hasher.as_ref(),
        ctx.signer.as_ref(),
    )
    .await?;
    Ok(oracle_data)
}

fn current_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
