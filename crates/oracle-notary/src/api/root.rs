use axum::response::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    service: &'static str,
    description: &'static str,
}

/// A terse service banner, mostly useful for confirming the
/// right thing is listening on the other end of a load balancer health check.
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: "oracle-notary",
        description: "TEE-attested web data notarization oracle",
    })
}
