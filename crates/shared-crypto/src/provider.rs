use crate::algorithm::{DigestAlgorithm, KeyType, SignatureAlgorithm};

/// Cryptographic context passed explicitly to signers and builders
///
/// Replaces any process-wide provider registration: each signing operation
/// carries the provider it was configured with. Holds the digest algorithm
/// and whether signatures carry a signing-time attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CryptoProvider {
    digest: DigestAlgorithm,
    signing_time: bool,
}

impl Default for CryptoProvider {
    fn default() -> Self {
        Self::new(DigestAlgorithm::default())
    }
}

impl CryptoProvider {
    /// Signing-time attributes are included by default
    pub fn new(digest: DigestAlgorithm) -> Self {
        Self {
            digest,
            signing_time: true,
        }
    }

    pub fn with_signing_time_attribute(mut self, include: bool) -> Self {
        self.signing_time = include;
        self
    }

    /// Same policy, different digest
    pub fn with_digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    pub fn digest_algorithm(&self) -> DigestAlgorithm {
        self.digest
    }

    pub fn includes_signing_time(&self) -> bool {
        self.signing_time
    }

    pub fn signature_algorithm(&self, key_type: KeyType) -> SignatureAlgorithm {
        SignatureAlgorithm::for_key(key_type, self.digest)
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest.digest(data)
    }

    pub fn digest_parts(&self, parts: &[&[u8]]) -> Vec<u8> {
        self.digest.digest_parts(parts)
    }
}
