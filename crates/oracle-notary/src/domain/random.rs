//! An attested random number in `[0, max)`.
//!
//! The value itself comes from a cryptographic RNG, not from any external
//! source; it is notarized by synthesizing a pseudo-request and routing it
//! through the same encode → enclave → oracle pipeline every other
//! notarization uses, so a consumer cannot distinguish a random draw from a
//! fetched one at the `OracleData` level.

use indexmap::IndexMap;
use rand::RngCore;

use super::enclave::EnclaveDevice;
use super::oracle::{self, Hasher, OracleData, OracleError, Signer};
use super::request::{AttestationRequest, EncodingOptions, EncodingValueKind, RequestMethod, ResponseFormat};

#[derive(Debug, thiserror::Error)]
pub enum RandomError {
    #[error("max must be greater than 1 and at most 2^127")]
    InvalidMax,
    #[error(transparent)]
    Oracle(#[from] OracleError),
}

/// `max` must lie in `(1, 2^127]`; `GET /random?max=` returns 400 otherwise.
/// `2^127` is represented as `u128::MAX / 2 + 1`, the largest value
/// expressible while still leaving the top bit free for the rejection
/// sampling below.
const MAX_UPPER_BOUND: u128 = 1u128 << 127;

/// Draw a uniform value in `[0, max)` using rejection sampling over 128 bits
/// of the RNG's output, then notarize it via a synthesized `AttestationRequest`
/// whose `url` records the bound that was sampled against.
pub async fn attested_random(
    max: u128,
    timestamp: u64,
    enclave_device: &dyn EnclaveDevice,
    hasher: &dyn Hasher,
    signer: &dyn Signer,
) -> Result<OracleData, RandomError> {
    if max <= 1 || max > MAX_UPPER_BOUND {
        return Err(RandomError::InvalidMax);
    }

    let value = sample_below(max);
    let req = synthetic_request(max);

    oracle::build(&req, &value.to_string(), timestamp, 200, enclave_device, hasher, signer)
        .await
        .map_err(RandomError::from)
}

fn sample_below(max: u128) -> u128 {
    let mut rng = rand::rngs::OsRng;
    loop {
        let mut bytes = [0u8; 16];
        rng.fill_bytes(&mut bytes);
        let candidate = u128::from_le_bytes(bytes);
        // Reject draws in the tail that would bias the distribution towards
        // the low end of `[0, max)`.
        let limit = u128::MAX - (u128::MAX % max);
        if candidate < limit {
            return candidate % max;
        }
    }
}

fn synthetic_request(max: u128) -> AttestationRequest {
    AttestationRequest {
        url: format!("crypto/rand:{max}"),
        request_method: RequestMethod::Get,
        response_format: ResponseFormat::Json,
        selector: "value".to_string(),
        html_result_type: None,
        request_body: None,
        request_content_type: None,
        request_headers: IndexMap::new(),
        encoding_options: EncodingOptions {
            value: EncodingValueKind::Int,
            precision: 0,
        },
        debug_request: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_below_stays_in_range() {
        for _ in 0..1000 {
            let v = sample_below(10);
            assert!(v < 10);
        }
    }

    #[test]
    fn synthetic_request_records_the_bound() {
        let req = synthetic_request(42);
        assert_eq!(req.url, "crypto/rand:42");
        assert_eq!(req.encoding_options.value, EncodingValueKind::Int);
    }
}
