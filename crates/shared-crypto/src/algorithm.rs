//! Digest and signature algorithm identifiers

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

/// OID for SHA-256: 2.16.840.1.101.3.4.2.1
pub const OID_SHA256: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];

/// OID for SHA-512: 2.16.840.1.101.3.4.2.3
pub const OID_SHA512: &[u32] = &[2, 16, 840, 1, 101, 3, 4, 2, 3];

/// OID for ECDSA with SHA-256: 1.2.840.10045.4.3.2
pub const OID_ECDSA_SHA256: &[u32] = &[1, 2, 840, 10045, 4, 3, 2];

/// OID for ECDSA with SHA-512: 1.2.840.10045.4.3.4
pub const OID_ECDSA_SHA512: &[u32] = &[1, 2, 840, 10045, 4, 3, 4];

/// OID for sha256WithRSAEncryption: 1.2.840.113549.1.1.11
pub const OID_SHA256_RSA: &[u32] = &[1, 2, 840, 113549, 1, 1, 11];

/// OID for sha512WithRSAEncryption: 1.2.840.113549.1.1.13
pub const OID_SHA512_RSA: &[u32] = &[1, 2, 840, 113549, 1, 1, 13];

/// OID for id-ecPublicKey: 1.2.840.10045.2.1
pub const OID_EC_PUBLIC_KEY: &[u32] = &[1, 2, 840, 10045, 2, 1];

/// OID for the prime256v1 named curve: 1.2.840.10045.3.1.7
pub const OID_PRIME256V1: &[u32] = &[1, 2, 840, 10045, 3, 1, 7];

/// OID for rsaEncryption: 1.2.840.113549.1.1.1
pub const OID_RSA_ENCRYPTION: &[u32] = &[1, 2, 840, 113549, 1, 1, 1];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    #[default]
    Sha256,
    Sha512,
}

impl DigestAlgorithm {
    pub fn oid(self) -> &'static [u32] {
        match self {
            Self::Sha256 => OID_SHA256,
            Self::Sha512 => OID_SHA512,
        }
    }

    pub fn from_oid(oid: &[u32]) -> Option<Self> {
        [Self::Sha256, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == oid)
    }

    pub fn output_len(self) -> usize {
        match self {
            Self::Sha256 => 32,
            Self::Sha512 => 64,
        }
    }

    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        self.digest_parts(&[data])
    }

    /// Digest the concatenation of `parts` without copying them together
    pub fn digest_parts(self, parts: &[&[u8]]) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut hasher = Sha256::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
            Self::Sha512 => {
                let mut hasher = Sha512::new();
                for part in parts {
                    hasher.update(part);
                }
                hasher.finalize().to_vec()
            }
        }
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sha256 => write!(f, "SHA-256"),
            Self::Sha512 => write!(f, "SHA-512"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha256" => Ok(Self::Sha256),
            "sha512" => Ok(Self::Sha512),
            other => Err(format!("Unsupported digest algorithm: {other}")),
        }
    }
}

/// Key families a signer may hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyType {
    EcP256,
    Rsa,
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EcP256 => write!(f, "EC P-256"),
            Self::Rsa => write!(f, "RSA"),
        }
    }
}

/// Digest-then-sign pairings a [`crate::DetachedSigner`] may report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    EcdsaSha256,
    EcdsaSha512,
    RsaPkcs1Sha256,
    RsaPkcs1Sha512,
}

impl SignatureAlgorithm {
    pub const ALL: [Self; 4] = [
        Self::EcdsaSha256,
        Self::EcdsaSha512,
        Self::RsaPkcs1Sha256,
        Self::RsaPkcs1Sha512,
    ];

    /// The pairing for a key family and digest
    pub fn for_key(key_type: KeyType, digest: DigestAlgorithm) -> Self {
        match (key_type, digest) {
            (KeyType::EcP256, DigestAlgorithm::Sha256) => Self::EcdsaSha256,
            (KeyType::EcP256, DigestAlgorithm::Sha512) => Self::EcdsaSha512,
            (KeyType::Rsa, DigestAlgorithm::Sha256) => Self::RsaPkcs1Sha256,
            (KeyType::Rsa, DigestAlgorithm::Sha512) => Self::RsaPkcs1Sha512,
        }
    }

    pub fn digest(self) -> DigestAlgorithm {
        match self {
            Self::EcdsaSha256 | Self::RsaPkcs1Sha256 => DigestAlgorithm::Sha256,
            Self::EcdsaSha512 | Self::RsaPkcs1Sha512 => DigestAlgorithm::Sha512,
        }
    }

    pub fn key_type(self) -> KeyType {
        match self {
            Self::EcdsaSha256 | Self::EcdsaSha512 => KeyType::EcP256,
            Self::RsaPkcs1Sha256 | Self::RsaPkcs1Sha512 => KeyType::Rsa,
        }
    }

    pub fn oid(self) -> &'static [u32] {
        match self {
            Self::EcdsaSha256 => OID_ECDSA_SHA256,
            Self::EcdsaSha512 => OID_ECDSA_SHA512,
            Self::RsaPkcs1Sha256 => OID_SHA256_RSA,
            Self::RsaPkcs1Sha512 => OID_SHA512_RSA,
        }
    }

    pub fn from_oid(oid: &[u32]) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.oid() == oid)
    }

    /// RSA identifiers carry explicit NULL parameters, ECDSA ones omit them
    pub fn has_null_params(self) -> bool {
        self.key_type() == KeyType::Rsa
    }
}

impl fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EcdsaSha256 => "SHA256withECDSA",
            Self::EcdsaSha512 => "SHA512withECDSA",
            Self::RsaPkcs1Sha256 => "SHA256withRSA",
            Self::RsaPkcs1Sha512 => "SHA512withRSA",
        };
        f.write_str(name)
    }
}
