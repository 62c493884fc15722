//! Pure types and algorithms: the attestation pipeline (C1-C2-C3-C4-C6) plus
//! the capability traits C5/C6 depend on. Nothing in this module touches a
//! socket or a filesystem directly; that's `crate::infra`'s job.

pub mod encode;
pub mod enclave;
pub mod extract;
pub mod oracle;
pub mod price;
pub mod random;
pub mod request;
pub mod validate;

use std::sync::Arc;

use crate::infra::config::RuntimeConfig;

/// Everything a request handler needs, threaded explicitly rather than
/// reached for through a global singleton — the only process-wide mutable
/// state left out-of-band is the boundary layer's rate-limit cache.
#[derive(Clone)]
pub struct RuntimeContext {
    pub config: Arc<RuntimeConfig>,
    pub enclave: Arc<dyn enclave::EnclaveDevice>,
    pub hasher: Arc<dyn oracle::Hasher>,
    pub signer: Arc<dyn oracle::Signer>,
    pub http: reqwest::Client,
}

impl RuntimeContext {
    pub fn new(
        config: Arc<RuntimeConfig>,
        enclave: Arc<dyn enclave::EnclaveDevice>,
        hasher: Arc<dyn oracle::Hasher>,
        signer: Arc<dyn oracle::Signer>,
        http: reqwest::Client,
    ) -> Self {
        Self {
            config,
            enclave,
            hasher,
            signer,
            http,
        }
    }
}
