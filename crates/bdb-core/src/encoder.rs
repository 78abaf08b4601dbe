use shared_types::der::{build_integer, build_oid, build_sequence, build_set_of};
use shared_types::{CaptureSession, Resolution};
use tracing::debug;

use crate::error::BdbError;
use crate::json;
use crate::normalize::{BiometricInput, NormalizedRecord};
use crate::{FORMAT_OWNER_OID, FORMAT_VERSION};

/// Serializes capture data into a DER biometric data block
///
/// The sample set is written in DER canonical order, so equal multisets of
/// tuples always produce byte-identical blocks regardless of capture order.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiometricRecordEncoder {
    default_resolution: Resolution,
}

impl BiometricRecordEncoder {
    pub fn new(default_resolution: Resolution) -> Self {
        Self { default_resolution }
    }

    pub fn default_resolution(&self) -> Resolution {
        self.default_resolution
    }

    /// Encode an already normalized record
    pub fn encode(&self, record: &NormalizedRecord) -> Vec<u8> {
        let header = build_sequence(&[&build_oid(FORMAT_OWNER_OID), &build_integer(FORMAT_VERSION)]);
        let resolution = build_sequence(&[
            &build_integer(i64::from(record.resolution.horz)),
            &build_integer(i64::from(record.resolution.vert)),
        ]);
        let count = build_integer(record.samples.len() as i64);
        let samples = build_set_of(record.samples.iter().map(|s| s.to_der()).collect());

        let bdb = build_sequence(&[&header, &resolution, &count, &samples]);
        debug!(
            samples = record.samples.len(),
            bytes = bdb.len(),
            "Encoded biometric data block"
        );
        bdb
    }

    pub fn encode_session(&self, session: &CaptureSession) -> Vec<u8> {
        self.encode(&NormalizedRecord::from_session(session))
    }

    /// Normalize either input shape, then encode
    pub fn encode_input(&self, input: BiometricInput) -> Result<Vec<u8>, BdbError> {
        let record = input.normalize(self.default_resolution)?;
        Ok(self.encode(&record))
    }

    /// Parse capture JSON, normalize, then encode
    pub fn encode_json(&self, text: &str) -> Result<Vec<u8>, BdbError> {
        let input = json::parse_input(text, self.default_resolution)?;
        self.encode_input(input)
    }
}
