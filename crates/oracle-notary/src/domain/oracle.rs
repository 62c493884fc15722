//! C6: reformat the quote into on-chain-friendly chunks, derive the
//! Poseidon8-family hashes, sign the report, and assemble `OracleData`.

use std::time::Duration;

use rand::Rng;
use serde::Serialize;

use super::enclave::{self, EnclaveDevice, EnclaveError};
use super::encode::{self, EncodingError};
use super::request::{AttestationRequest, PriceFeedAsset, ProofPositionalInfo, Target};

const USER_DATA_CHUNKS: usize = 8;
const REPORT_CHUNKS: usize = 10;
const FIELDS_PER_CHUNK: usize = 32;
const FIELD_BYTES: usize = 16;

/// Opaque hash capability over the target chain's native field. Treated as
/// a black box: this crate does not reimplement Poseidon8, it calls
/// through this trait to whatever backs it (`infra::hasher`).
pub trait Hasher: Send + Sync {
    fn hash_bytes(&self, input: &[u8]) -> [u8; 32];
    fn hash_to_field_string(&self, input: &[u8]) -> String;
}

/// Opaque Schnorr-over-curve signing capability of the enclave-resident key.
pub trait Signer: Send + Sync {
    fn sign(&self, message: &[u8; 32]) -> Vec<u8>;
    fn public_key(&self) -> String;
}

#[derive(Debug, Clone, Serialize)]
pub struct OracleData {
    #[serde(rename = "userData")]
    pub user_data: String,
    #[serde(rename = "encodedRequest")]
    pub encoded_request: String,
    #[serde(rename = "requestHash")]
    pub request_hash: String,
    #[serde(rename = "timestampedRequestHash")]
    pub timestamped_request_hash: String,
    pub report: String,
    pub signature: String,
    pub address: String,
    #[serde(rename = "encodedPositions")]
    pub encoded_positions: ProofPositionalInfo,
}

#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error(transparent)]
    Encoding(#[from] EncodingError),
    #[error(transparent)]
    Enclave(#[from] EnclaveError),
}

/// Partition `buf` into `num_chunks` chunks of up to 32 128-bit
/// little-endian fields each, rendering `{ c0: { f0: <dec>u128, ... }, ... }`
/// and omitting each chunk's trailing all-zero fields.
pub fn format_chunks(buf: &[u8], num_chunks: usize) -> Result<String, EncodingError> {
    let max_len = num_chunks * FIELDS_PER_CHUNK * FIELD_BYTES;
    if buf.len() > max_len {
        return Err(EncodingError::Overflow);
    }

    let mut chunks = Vec::with_capacity(num_chunks);
    for chunk_idx in 0..num_chunks {
        let chunk_start = chunk_idx * FIELDS_PER_CHUNK * FIELD_BYTES;
        let mut fields = Vec::new();
        for field_idx in 0..FIELDS_PER_CHUNK {
            let start = chunk_start + field_idx * FIELD_BYTES;
            if start >= buf.len() {
                break;
            }
            let end = (start + FIELD_BYTES).min(buf.len());
            let mut bytes = [0u8; FIELD_BYTES];
            bytes[..end - start].copy_from_slice(&buf[start..end]);
            fields.push((field_idx, u128::from_le_bytes(bytes)));
        }
        while matches!(fields.last(), Some((_, 0))) {
            fields.pop();
        }
        let rendered = fields
            .iter()
            .map(|(i, v)| format!("f{i}: {v}u128"))
            .collect::<Vec<_>>()
            .join(", ");
        chunks.push(format!("c{chunk_idx}: {{ {rendered} }}"));
    }

    Ok(format!("{{ {} }}", chunks.join(", ")))
}

fn prepare_request_hashes(encoded_request: &str, hasher: &dyn Hasher) -> ([u8; 32], String) {
    let bytes = hasher.hash_bytes(encoded_request.as_bytes());
    let string = hasher.hash_to_field_string(encoded_request.as_bytes());
    (bytes, string)
}

/// `requestHashBytes (first 16 bytes) || ts_le (8 bytes) || zeros (8 bytes)`,
/// split into two 16-byte halves each read as a big-endian `u128` (i.e. the
/// same bytes that were assembled little-endian, read back with reversed
/// significance), hashed together as a record literal.
fn prepare_timestamped_hash(request_hash_bytes: &[u8; 32], timestamp: u64, hasher: &dyn Hasher) -> String {
    let mut buf = [0u8; 32];
    buf[0..16].copy_from_slice(&request_hash_bytes[0..16]);
    buf[16..24].copy_from_slice(&timestamp.to_le_bytes());

    let mut a_bytes = [0u8; 16];
    a_bytes.copy_from_slice(&buf[0..16]);
    let mut b_bytes = [0u8; 16];
    b_bytes.copy_from_slice(&buf[16..32]);
    let a = u128::from_be_bytes(a_bytes);
    let b = u128::from_be_bytes(b_bytes);
    let literal = format!("{{ request_hash: {a}u128, attestation_timestamp: {b}u128 }}");
    hasher.hash_to_field_string(literal.as_bytes())
}

/// Sign `H(report)` and sleep a random `[50, 100]` ms jitter afterward to
/// reduce timing side-channel leakage on the signing key.
async fn prepare_signature(report: &str, hasher: &dyn Hasher, signer: &dyn Signer) -> (String, String) {
    let digest = hasher.hash_bytes(report.as_bytes());
    let signature_bytes = signer.sign(&digest);
    let signature = const_hex::encode_prefixed(signature_bytes);
    let address = signer.public_key();

    let jitter_ms = rand::rng().random_range(50..=100u64);
    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;

    (signature, address)
}

/// Compose C1, C5, and the derivations above into the final `OracleData`.
pub async fn build(
    req: &AttestationRequest,
    data: &str,
    timestamp: u64,
    status_code: u64,
    enclave_device: &dyn EnclaveDevice,
    hasher: &dyn Hasher,
    signer: &dyn Signer,
) -> Result<OracleData, OracleError> {
    let (mut user_data_proof, positions) = encode::encode(req, data, timestamp, status_code)?;

    if let Target::PriceFeed(asset) = req.target() {
        user_data_proof[0] = token_id(asset);
    }

    let user_data = format_chunks(&user_data_proof, USER_DATA_CHUNKS)?;
    let attestation_hash = hasher.hash_bytes(user_data.as_bytes());

    let quote_started = std::time::Instant::now();
    let quote = enclave::generate_quote(enclave_device, attestation_hash)?;
    crate::infra::metrics::observe_enclave_quote_duration(quote_started.elapsed());

    let encoded_request_bytes = encode::zero_data_and_timestamp(&user_data_proof, &positions);
    let encoded_request = format_chunks(&encoded_request_bytes, USER_DATA_CHUNKS)?;

    let (request_hash_bytes, request_hash) = prepare_request_hashes(&encoded_request, hasher);
    let timestamped_request_hash = prepare_timestamped_hash(&request_hash_bytes, timestamp, hasher);

    let report = format_chunks(&quote, REPORT_CHUNKS)?;
    let (signature, address) = prepare_signature(&report, hasher, signer).await;

    Ok(OracleData {
        user_data,
        encoded_request,
        request_hash,
        timestamped_request_hash,
        report,
        signature,
        address,
        encoded_positions: positions,
    })
}

fn token_id(asset: PriceFeedAsset) -> u8 {
    asset.token_id()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_formatting_omits_trailing_zero_fields() {
        let mut buf = vec![0u8; FIELD_BYTES * 2];
        buf[0] = 1; // f0 = 1, f1 = 0 (trailing, omitted)
        let rendered = format_chunks(&buf, 1).unwrap();
        assert_eq!(rendered, "{ c0: { f0: 1u128 } }");
    }

    #[test]
    fn chunk_formatting_rejects_oversized_input() {
        let buf = vec![0u8; FIELDS_PER_CHUNK * FIELD_BYTES + 1];
        assert!(matches!(format_chunks(&buf, 1), Err(EncodingError::Overflow)));
    }

    #[test]
    fn empty_chunk_renders_without_fields() {
        let buf = vec![0u8; FIELD_BYTES];
        let rendered = format_chunks(&buf, 1).unwrap();
        assert_eq!(rendered, "{ c0: {  } }");
    }

    struct IdentityHasher;
    impl Hasher for IdentityHasher {
        fn hash_bytes(&self, input: &[u8]) -> [u8; 32] {
            let mut out = [0u8; 32];
            let n = input.len().min(32);
            out[..n].copy_from_slice(&input[..n]);
            out
        }
        fn hash_to_field_string(&self, input: &[u8]) -> String {
            format!("{}field", input.len())
        }
    }

    #[test]
    fn timestamped_hash_is_deterministic() {
        let hasher = IdentityHasher;
        let request_hash_bytes = [9u8; 32];
        let a = prepare_timestamped_hash(&request_hash_bytes, 1715769600, &hasher);
        let b = prepare_timestamped_hash(&request_hash_bytes, 1715769600, &hasher);
        assert_eq!(a, b);
        let c = prepare_timestamped_hash(&request_hash_bytes, 1715769601, &hasher);
        assert_ne!(a, c);
    }
}
