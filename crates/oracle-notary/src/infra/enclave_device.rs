//! Gramine-pseudo-file-backed [`EnclaveDevice`] implementation.
//!
//! Every operation reads or writes one of the pseudo-files Gramine exposes
//! under `/dev/attestation/*` in full, each time — there is no persistent
//! file handle, matching the way the third-party enclave SDK this crate
//! treats as out-of-scope documents the interface.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::domain::enclave::{
    EnclaveDevice, EnclaveError, TARGET_INFO_SIZE, USER_REPORT_DATA_SIZE,
};

/// Driven over the real pseudo-file surface. `root` is `/dev/attestation` in
/// production; tests point it at a `tempfile` directory backed by plain
/// files so the exact read/write offsets can be exercised without Gramine.
pub struct GramineEnclaveDevice {
    root: PathBuf,
    // Only one thread may be mid-protocol against the pseudo-files at a
    // time: the write-then-read handshake for a quote is not safe to
    // interleave across callers.
    lock: Mutex<()>,
}

impl GramineEnclaveDevice {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            lock: Mutex::new(()),
        }
    }

    /// The production device surface.
    pub fn gramine() -> Self {
        Self::new("/dev/attestation")
    }

    fn path(&self, name: &str) -> PathBuf {
        Path::new(&self.root).join(name)
    }
}

impl EnclaveDevice for GramineEnclaveDevice {
    fn read_my_target_info(&self) -> Result<[u8; TARGET_INFO_SIZE], EnclaveError> {
        let _guard = self.lock.lock().unwrap();
        let bytes = fs::read(self.path("my_target_info"))
            .map_err(|err| EnclaveError::TargetInfoRead(err.to_string()))?;
        bytes
            .try_into()
            .map_err(|_| EnclaveError::TargetInfoRead("unexpected my_target_info size".to_string()))
    }

    fn write_target_info(&self, buf: &[u8; TARGET_INFO_SIZE]) -> Result<(), EnclaveError> {
        let _guard = self.lock.lock().unwrap();
        fs::write(self.path("target_info"), buf).map_err(|err| EnclaveError::TargetInfoWrite(err.to_string()))
    }

    fn write_user_report_data(&self, buf: &[u8; USER_REPORT_DATA_SIZE]) -> Result<(), EnclaveError> {
        let _guard = self.lock.lock().unwrap();
        fs::write(self.path("user_report_data"), buf)
            .map_err(|err| EnclaveError::UserReportDataWrite(err.to_string()))
    }

    fn read_quote(&self) -> Result<Vec<u8>, EnclaveError> {
        let _guard = self.lock.lock().unwrap();
        fs::read(self.path("quote")).map_err(|err| EnclaveError::QuoteRead(err.to_string()))
    }

    fn read_attestation_type(&self) -> Result<String, EnclaveError> {
        let _guard = self.lock.lock().unwrap();
        fs::read_to_string(self.path("attestation_type"))
            .map(|s| s.trim().to_string())
            .map_err(|err| EnclaveError::AttestationTypeRead(err.to_string()))
    }
}
