use std::time::{Instant, SystemTime, UNIX_EPOCH};

use axum::extract::{Extension, Json, State};
use axum::response::{IntoResponse, Response};

use super::{DomainJson, RequestId};
use crate::domain::oracle::OracleData;
use crate::domain::request::AttestationRequest;
use crate::domain::{RuntimeContext, extract, oracle, validate};
use crate::errors::ApiError;
use crate::infra::metrics;

pub async fn notarize(
    State(ctx): State<RuntimeContext>,
    Extension(RequestId(request_id)): Extension<RequestId>,
    DomainJson(mut req): DomainJson<AttestationRequest>,
) -> Response {
    metrics::record_request("notarize");
    let started = Instant::now();
    let result = run(&ctx, &mut req).await;
    metrics::observe_notarize_duration(started.elapsed());

    match result {
        Ok(oracle_data) => Json(oracle_data).into_response(),
        Err(err) => err.into_response_with_request_id(request_id),
    }
}

async fn run(ctx: &RuntimeContext, req: &mut AttestationRequest) -> Result<OracleData, ApiError> {
    validate::validate(req, &ctx.config.whitelisted_domains)?;
    validate::mask_unaccepted_headers(req);

    let extracted = extract::extract(ctx, req).await?;
    if req.debug_request {
        tracing::debug!(
            status_code = extracted.status_code,
            response_body = %extracted.response_body,
            attestation_data = %extracted.attestation_data,
            "debugRequest: raw extraction result"
        );
    }
    let timestamp = current_unix_timestamp();

    let oracle_data = oracle::build(
        req,
        &extracted.attestation_data,
        timestamp,
        extracted.status_code,
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
