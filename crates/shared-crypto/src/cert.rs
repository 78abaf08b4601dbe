//! X.509 certificate chain handling

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use shared_types::der::{build_oid, build_sequence, oid_to_string};
use x509_cert::der::{Decode, Encode};
use x509_cert::Certificate;

use crate::algorithm::{KeyType, OID_EC_PUBLIC_KEY, OID_PRIME256V1, OID_RSA_ENCRYPTION};
use crate::error::CryptoError;

/// Signer certificate chain, leaf first, held as DER
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertificateChain {
    certs: Vec<Vec<u8>>,
}

impl CertificateChain {
    /// Wrap DER certificates without parsing them
    pub fn from_der_certs(certs: Vec<Vec<u8>>) -> Self {
        Self { certs }
    }

    /// Load every `CERTIFICATE` block from PEM text, keeping file order
    pub fn from_pem(pem: &[u8]) -> Result<Self, CryptoError> {
        let parsed = Certificate::load_pem_chain(pem)
            .map_err(|e| CryptoError::Certificate(format!("invalid PEM chain: {e}")))?;
        if parsed.is_empty() {
            return Err(CryptoError::Certificate(
                "no certificates found in PEM input".to_string(),
            ));
        }

        let certs = parsed
            .iter()
            .map(|cert| {
                cert.to_der()
                    .map_err(|e| CryptoError::Certificate(format!("re-encoding failed: {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { certs })
    }

    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self, CryptoError> {
        let path = path.as_ref();
        let pem = std::fs::read(path).map_err(|e| {
            CryptoError::Certificate(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_pem(&pem)
    }

    pub fn certificates(&self) -> &[Vec<u8>] {
        &self.certs
    }

    pub fn leaf_der(&self) -> Option<&[u8]> {
        self.certs.first().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }

    /// Parse the leaf and check that every other entry is a certificate
    pub fn leaf(&self) -> Result<LeafCertificate, CryptoError> {
        let leaf_der = self
            .leaf_der()
            .ok_or_else(|| CryptoError::Certificate("certificate chain is empty".to_string()))?;
        let leaf = LeafCertificate::parse(leaf_der)?;

        for (index, der) in self.certs.iter().enumerate().skip(1) {
            Certificate::from_der(der).map_err(|e| {
                CryptoError::Certificate(format!("chain entry {index} is not a certificate: {e}"))
            })?;
        }
        Ok(leaf)
    }
}

/// The parts of the signer certificate the CMS builder needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafCertificate {
    pub der: Vec<u8>,
    pub subject: String,
    pub serial_hex: String,
    /// DER `IssuerAndSerialNumber` identifying this certificate
    pub issuer_and_serial: Vec<u8>,
    /// DER `SubjectPublicKeyInfo`
    pub spki_der: Vec<u8>,
    pub key_type: KeyType,
    /// Contents of the SubjectPublicKeyInfo bit string
    pub public_key: Vec<u8>,
    pub not_before: Duration,
    pub not_after: Duration,
}

impl LeafCertificate {
    pub fn parse(der: &[u8]) -> Result<Self, CryptoError> {
        let cert = Certificate::from_der(der)
            .map_err(|e| CryptoError::Certificate(format!("leaf is not an X.509 certificate: {e}")))?;
        let tbs = &cert.tbs_certificate;

        let encode_err = |what: &str, e: x509_cert::der::Error| {
            CryptoError::Certificate(format!("cannot encode {what}: {e}"))
        };
        let issuer = tbs.issuer.to_der().map_err(|e| encode_err("issuer", e))?;
        let serial = tbs
            .serial_number
            .to_der()
            .map_err(|e| encode_err("serial number", e))?;
        let spki = &tbs.subject_public_key_info;
        let spki_der = spki.to_der().map_err(|e| encode_err("public key", e))?;

        let key_oid = spki.algorithm.oid.to_string();
        let curve = spki.algorithm.parameters.as_ref().map(|p| p.value());
        let p256_curve = build_oid(OID_PRIME256V1);
        let key_type = if key_oid == oid_to_string(OID_EC_PUBLIC_KEY) && curve == Some(&p256_curve[2..]) {
            KeyType::EcP256
        } else if key_oid == oid_to_string(OID_RSA_ENCRYPTION) {
            KeyType::Rsa
        } else {
            return Err(CryptoError::Certificate(format!(
                "unsupported leaf key algorithm {key_oid}"
            )));
        };

        Ok(Self {
            der: der.to_vec(),
            subject: tbs.subject.to_string(),
            serial_hex: hex::encode(tbs.serial_number.as_bytes()),
            issuer_and_serial: build_sequence(&[&issuer, &serial]),
            spki_der,
            key_type,
            public_key: spki.subject_public_key.raw_bytes().to_vec(),
            not_before: tbs.validity.not_before.to_unix_duration(),
            not_after: tbs.validity.not_after.to_unix_duration(),
        })
    }

    /// Fail unless `at` lies inside the certificate validity window
    pub fn check_validity(&self, at: DateTime<Utc>) -> Result<(), CryptoError> {
        let at_secs = at.timestamp();
        let not_before = self.not_before.as_secs() as i64;
        let not_after = self.not_after.as_secs() as i64;
        if at_secs < not_before {
            return Err(CryptoError::Certificate(format!(
                "certificate for '{}' is not valid before {}",
                self.subject,
                format_unix(not_before)
            )));
        }
        if at_secs > not_after {
            return Err(CryptoError::Certificate(format!(
                "certificate for '{}' expired at {}",
                self.subject,
                format_unix(not_after)
            )));
        }
        Ok(())
    }
}

fn format_unix(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| secs.to_string())
}
