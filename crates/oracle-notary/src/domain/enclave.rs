//! C5: the SGX attestation protocol driven over the enclave device surface.
//!
//! The concrete pseudo-file adapter lives in `infra::enclave_device`; this
//! module only knows the trait and the six-step protocol, so it can be
//! exercised against a test double without touching `/dev/attestation/*`.

pub const MIN_QUOTE_SIZE: usize = 1020;
pub const TARGET_INFO_SIZE: usize = 512;
pub const USER_REPORT_DATA_SIZE: usize = 64;

/// OpenEnclave envelope prefixed onto the raw SGX quote: a 4-byte version,
/// a 4-byte quote type (SGX remote attestation), a 4-byte quote length, and
/// 4 reserved zero bytes.
const OE_HEADER_VERSION: u32 = 1;
const OE_HEADER_SGX_REMOTE_TYPE: u32 = 2;

#[derive(Debug, thiserror::Error)]
pub enum EnclaveError {
    #[error("failed to read my_target_info: {0}")]
    TargetInfoRead(String),
    #[error("failed to write target_info: {0}")]
    TargetInfoWrite(String),
    #[error("failed to write user_report_data: {0}")]
    UserReportDataWrite(String),
    #[error("failed to read quote: {0}")]
    QuoteRead(String),
    #[error("quote is smaller than the minimum SGX quote size ({MIN_QUOTE_SIZE} bytes, got {actual})")]
    QuoteTooSmall { actual: usize },
    #[error("failed to read attestation_type: {0}")]
    AttestationTypeRead(String),
}

/// Driven over `/dev/attestation/*` (or a test double). Implementations
/// must serialize access across threads: only one caller may be mid-protocol
/// against the pseudo-files at a time.
pub trait EnclaveDevice: Send + Sync {
    fn read_my_target_info(&self) -> Result<[u8; TARGET_INFO_SIZE], EnclaveError>;
    fn write_target_info(&self, buf: &[u8; TARGET_INFO_SIZE]) -> Result<(), EnclaveError>;
    fn write_user_report_data(&self, buf: &[u8; USER_REPORT_DATA_SIZE]) -> Result<(), EnclaveError>;
    fn read_quote(&self) -> Result<Vec<u8>, EnclaveError>;
    fn read_attestation_type(&self) -> Result<String, EnclaveError>;
}

/// Run the six-step protocol and return the OpenEnclave-wrapped quote.
/// `attestation_hash` is bound into the first 32 bytes of the 64-byte
/// user-report-data slot; the remaining 32 bytes are zero.
pub fn generate_quote(device: &dyn EnclaveDevice, attestation_hash: [u8; 32]) -> Result<Vec<u8>, EnclaveError> {
    let target_info = device.read_my_target_info()?;
    device.write_target_info(&target_info)?;

    let mut user_report_data = [0u8; USER_REPORT_DATA_SIZE];
    user_report_data[..32].copy_from_slice(&attestation_hash);
    device.write_user_report_data(&user_report_data)?;

    let quote = device.read_quote()?;
    if quote.len() < MIN_QUOTE_SIZE {
        return Err(EnclaveError::QuoteTooSmall { actual: quote.len() });
    }

    Ok(wrap_oe_envelope(&quote))
}

fn wrap_oe_envelope(quote: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(16 + quote.len());
    out.extend_from_slice(&OE_HEADER_VERSION.to_le_bytes());
    out.extend_from_slice(&OE_HEADER_SGX_REMOTE_TYPE.to_le_bytes());
    out.extend_from_slice(&(quote.len() as u32).to_le_bytes());
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(quote);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct MockDevice {
        quote_len: usize,
        written_target_info: Mutex<Option<[u8; TARGET_INFO_SIZE]>>,
        written_report_data: Mutex<Option<[u8; USER_REPORT_DATA_SIZE]>>,
    }

    impl EnclaveDevice for MockDevice {
        fn read_my_target_info(&self) -> Result<[u8; TARGET_INFO_SIZE], EnclaveError> {
            Ok([0x42; TARGET_INFO_SIZE])
        }

        fn write_target_info(&self, buf: &[u8; TARGET_INFO_SIZE]) -> Result<(), EnclaveError> {
            *self.written_target_info.lock().unwrap() = Some(*buf);
            Ok(())
        }

        fn write_user_report_data(&self, buf: &[u8; USER_REPORT_DATA_SIZE]) -> Result<(), EnclaveError> {
            *self.written_report_data.lock().unwrap() = Some(*buf);
            Ok(())
        }

        fn read_quote(&self) -> Result<Vec<u8>, EnclaveError> {
            Ok(vec![0xAA; self.quote_len])
        }

        fn read_attestation_type(&self) -> Result<String, EnclaveError> {
            Ok("sgx".to_string())
        }
    }

    #[test]
    fn binds_hash_into_user_report_data() {
        let device = MockDevice {
            quote_len: MIN_QUOTE_SIZE,
            written_target_info: Mutex::new(None),
            written_report_data: Mutex::new(None),
        };
        let hash = [7u8; 32];
        let quote = generate_quote(&device, hash).unwrap();
        assert_eq!(quote.len(), 16 + MIN_QUOTE_SIZE);

        let written = device.written_report_data.lock().unwrap().unwrap();
        assert_eq!(&written[..32], &hash[..]);
        assert!(written[32..].iter().all(|&b| b == 0));
        assert_eq!(device.written_target_info.lock().unwrap().unwrap(), [0x42; TARGET_INFO_SIZE]);
    }

    #[test]
    fn rejects_undersized_quotes() {
        let device = MockDevice {
            quote_len: MIN_QUOTE_SIZE - 1,
            written_target_info: Mutex::new(None),
            written_report_data: Mutex::new(None),
        };
        assert!(matches!(
            generate_quote(&device, [0u8; 32]),
            Err(EnclaveError::QuoteTooSmall { .. })
        ));
    }
}
