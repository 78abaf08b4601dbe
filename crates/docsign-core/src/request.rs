use chrono::{DateTime, Utc};
use shared_crypto::{CertificateChain, DigestAlgorithm, SignedAttribute};
use shared_pdf::ByteRange;

/// Per-document overrides of the engine configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignOptions {
    pub field_name: Option<String>,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub page: Option<u32>,
    /// Defaults to the time the operation starts
    pub signing_time: Option<DateTime<Utc>>,
}

impl SignOptions {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = Some(page);
        self
    }

    pub fn with_signing_time(mut self, at: DateTime<Utc>) -> Self {
        self.signing_time = Some(at);
        self
    }
}

/// Everything the digest and sign stages need for one signature.
///
/// Built after the placeholder is reserved and consumed by
/// [`crate::SigningEngine::sign_request`].
#[derive(Debug, Clone)]
pub struct SignatureRequest<'a> {
    /// Document with the empty placeholder in place
    pub document_bytes: &'a [u8],
    pub byte_range: ByteRange,
    /// Leaf first, never empty when signing succeeds
    pub certificate_chain: &'a CertificateChain,
    /// Caller attributes, the biometric attribute among them
    pub signed_attributes: Vec<SignedAttribute>,
    pub digest_algorithm: DigestAlgorithm,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub signing_time: DateTime<Utc>,
}
