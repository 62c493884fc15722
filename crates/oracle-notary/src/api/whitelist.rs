use axum::extract::State;
use axum::response::Json;

use crate::domain::RuntimeContext;

/// The domains the validator will accept as notarization targets.
pub async fn whitelist(State(ctx): State<RuntimeContext>) -> Json<Vec<String>> {
    Json(ctx.config.whitelisted_domains.iter().cloned().collect())
}
