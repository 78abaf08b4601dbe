//! Read back a detached CMS signature
//!
//! Parsing goes through the `cms` crate so that signatures are checked by an
//! independent decoder rather than the one that built them.

use ::cms::cert::CertificateChoices;
use ::cms::content_info::ContentInfo;
use ::cms::signed_data::{SignedData, SignerIdentifier};
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::signature::Verifier;
use p256::ecdsa::{Signature, VerifyingKey};
use serde::Serialize;
use shared_types::der::{encoded_len, oid_to_string};
use x509_cert::der::asn1::ObjectIdentifier;
use x509_cert::der::{Decode, Encode};

use crate::algorithm::{DigestAlgorithm, KeyType, SignatureAlgorithm};
use crate::attributes::{
    BIOMETRIC_ATTRIBUTE_OID, OID_CONTENT_TYPE, OID_MESSAGE_DIGEST, OID_SIGNING_TIME,
};
use crate::cert::LeafCertificate;
use crate::error::CryptoError;
use crate::signed_data::OID_SIGNED_DATA;

/// Outcome of checking the signature value against the signer key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum SignatureCheck {
    Valid,
    Invalid,
    /// The key or algorithm cannot be checked locally
    Unsupported(String),
}

/// Decoded view of one SignerInfo and its surrounding SignedData
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsInspection {
    pub digest_algorithm_oid: String,
    pub digest_algorithm: Option<DigestAlgorithm>,
    pub signature_algorithm_oid: String,
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Signed attributes re-encoded as the DER SET that was signed
    pub signed_attributes_der: Vec<u8>,
    pub content_type: Option<String>,
    pub message_digest: Option<Vec<u8>>,
    /// Raw UTCTime or GeneralizedTime text
    pub signing_time: Option<String>,
    /// Contents of the biometric attribute's OCTET STRING
    pub biometric: Option<Vec<u8>>,
    pub certificates: Vec<Vec<u8>>,
    /// Certificate named by the signer's issuer and serial number
    pub signer_certificate: Option<Vec<u8>>,
    pub signature: Vec<u8>,
}

fn malformed(what: &str, e: impl std::fmt::Display) -> CryptoError {
    CryptoError::MalformedCms(format!("{what}: {e}"))
}

fn arcs(oid: &ObjectIdentifier) -> Vec<u32> {
    oid.arcs().collect()
}

/// Parse a DER `ContentInfo`. Trailing bytes (placeholder padding) are ignored.
pub fn inspect(der: &[u8]) -> Result<CmsInspection, CryptoError> {
    let len = encoded_len(der).map_err(|e| malformed("ContentInfo", e))?;
    let content_info =
        ContentInfo::from_der(&der[..len]).map_err(|e| malformed("ContentInfo", e))?;
    if arcs(&content_info.content_type) != OID_SIGNED_DATA {
        return Err(CryptoError::MalformedCms(format!(
            "content type {} is not signedData",
            content_info.content_type
        )));
    }

    let inner = content_info
        .content
        .to_der()
        .map_err(|e| malformed("SignedData", e))?;
    let signed_data = SignedData::from_der(&inner).map_err(|e| malformed("SignedData", e))?;

    let signer_infos = signed_data.signer_infos.0.as_slice();
    let signer_info = match signer_infos {
        [only] => only,
        other => {
            return Err(CryptoError::MalformedCms(format!(
                "expected one SignerInfo, found {}",
                other.len()
            )))
        }
    };

    let signed_attrs = signer_info
        .signed_attrs
        .as_ref()
        .ok_or_else(|| CryptoError::MalformedCms("SignerInfo has no signed attributes".into()))?;
    let signed_attributes_der = signed_attrs
        .to_der()
        .map_err(|e| malformed("signed attributes", e))?;

    let mut content_type = None;
    let mut message_digest = None;
    let mut signing_time = None;
    let mut biometric = None;
    for attribute in signed_attrs.iter() {
        let Some(value) = attribute.values.iter().next() else {
            continue;
        };
        let oid = arcs(&attribute.oid);
        if oid == OID_CONTENT_TYPE {
            let ct = ObjectIdentifier::from_bytes(value.value())
                .map_err(|e| malformed("content-type attribute", e))?;
            content_type = Some(ct.to_string());
        } else if oid == OID_MESSAGE_DIGEST {
            message_digest = Some(value.value().to_vec());
        } else if oid == OID_SIGNING_TIME {
            signing_time = Some(String::from_utf8_lossy(value.value()).into_owned());
        } else if oid == BIOMETRIC_ATTRIBUTE_OID {
            biometric = Some(value.value().to_vec());
        }
    }

    let mut certificates = Vec::new();
    let mut signer_certificate = None;
    if let Some(set) = &signed_data.certificates {
        for choice in set.0.iter() {
            let CertificateChoices::Certificate(cert) = choice else {
                continue;
            };
            let cert_der = cert.to_der().map_err(|e| malformed("certificate", e))?;
            if let SignerIdentifier::IssuerAndSerialNumber(id) = &signer_info.sid {
                if cert.tbs_certificate.issuer == id.issuer
                    && cert.tbs_certificate.serial_number == id.serial_number
                {
                    signer_certificate = Some(cert_der.clone());
                }
            }
            certificates.push(cert_der);
        }
    }

    let digest_oid = arcs(&signer_info.digest_alg.oid);
    let signature_oid = arcs(&signer_info.signature_algorithm.oid);

    Ok(CmsInspection {
        digest_algorithm_oid: oid_to_string(&digest_oid),
        digest_algorithm: DigestAlgorithm::from_oid(&digest_oid),
        signature_algorithm_oid: oid_to_string(&signature_oid),
        signature_algorithm: SignatureAlgorithm::from_oid(&signature_oid),
        signed_attributes_der,
        content_type,
        message_digest,
        signing_time,
        biometric,
        certificates,
        signer_certificate,
        signature: signer_info.signature.as_bytes().to_vec(),
    })
}

impl CmsInspection {
    /// Verify the signature over the signed attributes with the signer key.
    ///
    /// Only ECDSA P-256 is checked locally; RSA signatures are reported as
    /// unsupported.
    pub fn verify_signature(&self) -> SignatureCheck {
        let Some(algorithm) = self.signature_algorithm else {
            return SignatureCheck::Unsupported(format!(
                "unknown signature algorithm {}",
                self.signature_algorithm_oid
            ));
        };
        if algorithm.key_type() != KeyType::EcP256 {
            return SignatureCheck::Unsupported(format!("{algorithm} is not verified locally"));
        }
        let Some(cert_der) = &self.signer_certificate else {
            return SignatureCheck::Unsupported("signer certificate not embedded".to_string());
        };

        let leaf = match LeafCertificate::parse(cert_der) {
            Ok(leaf) => leaf,
            Err(e) => return SignatureCheck::Unsupported(e.to_string()),
        };
        if leaf.key_type != KeyType::EcP256 {
            return SignatureCheck::Invalid;
        }
        let Ok(key) = VerifyingKey::from_sec1_bytes(&leaf.public_key) else {
            return SignatureCheck::Invalid;
        };
        let Ok(signature) = Signature::from_der(&self.signature) else {
            return SignatureCheck::Invalid;
        };

        let verified = match algorithm {
            SignatureAlgorithm::EcdsaSha512 => {
                let digest = DigestAlgorithm::Sha512.digest(&self.signed_attributes_der);
                key.verify_prehash(&digest, &signature).is_ok()
            }
            _ => key.verify(&self.signed_attributes_der, &signature).is_ok(),
        };
        if verified {
            SignatureCheck::Valid
        } else {
            SignatureCheck::Invalid
        }
    }
}
