use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::domain::RuntimeContext;
use crate::errors::ApiError;

#[derive(Debug, Serialize)]
pub struct EnclaveInfo {
    #[serde(rename = "reportType")]
    report_type: String,
    info: String,
    #[serde(rename = "signerPubKey")]
    signer_pub_key: String,
}

/// The enclave's attestation type and the public key the
/// signature on every `OracleData` can be verified against.
pub async fn info(State(ctx): State<RuntimeContext>) -> Response {
    match ctx.enclave.read_attestation_type() {
        Ok(report_type) => axum::response::Json(EnclaveInfo {
            info: report_type.clone(),
            report_type,
            signer_pub_key: ctx.signer.public_key(),
        })
        .into_response(),
        Err(err) => ApiError::from(err).into_response(),
    }
}
