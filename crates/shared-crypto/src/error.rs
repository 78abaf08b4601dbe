use thiserror::Error;

use crate::algorithm::DigestAlgorithm;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Signer digests with {actual} but the provider is configured for {expected}")]
    AlgorithmMismatch {
        expected: DigestAlgorithm,
        actual: DigestAlgorithm,
    },

    #[error("Invalid signed attributes: {0}")]
    InvalidAttributes(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Malformed CMS structure: {0}")]
    MalformedCms(String),
}
