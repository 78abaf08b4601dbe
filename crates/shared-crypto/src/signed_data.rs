//! Detached CMS SignedData assembly
//!
//! Produces a `ContentInfo` wrapping `SignedData` with no encapsulated
//! content. The signed attributes carry the message digest of the signed
//! bytes and the biometric data block; the signer signs the DER SET of those
//! attributes, never the content itself.

use chrono::{DateTime, Utc};
use shared_types::der::{
    build_algorithm_identifier, build_context_specific, build_integer, build_octet_string,
    build_oid, build_sequence, build_set, build_set_of, tag,
};
use tracing::{debug, info};

use crate::algorithm::{DigestAlgorithm, SignatureAlgorithm};
use crate::attributes::{
    SignedAttribute, BIOMETRIC_ATTRIBUTE_OID, OID_CONTENT_TYPE, OID_DATA, OID_MESSAGE_DIGEST,
    OID_SIGNING_TIME,
};
use crate::cert::{CertificateChain, LeafCertificate};
use crate::error::CryptoError;
use crate::provider::CryptoProvider;
use crate::signer::DetachedSigner;

/// OID for id-signedData (PKCS#7): 1.2.840.113549.1.7.2
pub const OID_SIGNED_DATA: &[u32] = &[1, 2, 840, 113549, 1, 7, 2];

/// A finished detached signature and the values that went into it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CmsSignedData {
    pub digest_algorithm: DigestAlgorithm,
    pub signature_algorithm: SignatureAlgorithm,
    pub signer_certificate: LeafCertificate,
    /// DER SET of signed attributes, exactly as signed
    pub signed_attributes: Vec<u8>,
    pub message_digest: Vec<u8>,
    pub signature_value: Vec<u8>,
    pub der: Vec<u8>,
}

impl CmsSignedData {
    pub fn to_der(&self) -> &[u8] {
        &self.der
    }

    pub fn len(&self) -> usize {
        self.der.len()
    }

    pub fn is_empty(&self) -> bool {
        self.der.is_empty()
    }

    pub fn into_der(self) -> Vec<u8> {
        self.der
    }
}

/// Builds detached CMS signatures for one provider configuration
#[derive(Debug, Clone)]
pub struct CmsSignatureBuilder {
    provider: CryptoProvider,
    signing_time: Option<DateTime<Utc>>,
}

impl CmsSignatureBuilder {
    pub fn new(provider: &CryptoProvider) -> Self {
        Self {
            provider: *provider,
            signing_time: None,
        }
    }

    /// Check the leaf is valid at `at`, and record `at` as a signing-time
    /// attribute when the provider's policy includes one
    pub fn with_signing_time(mut self, at: DateTime<Utc>) -> Self {
        self.signing_time = Some(at);
        self
    }

    pub fn provider(&self) -> &CryptoProvider {
        &self.provider
    }

    fn signing_time_attribute(&self) -> Option<DateTime<Utc>> {
        self.signing_time.filter(|_| self.provider.includes_signing_time())
    }

    /// Sign `content` and assemble the SignedData.
    ///
    /// `attributes` must contain exactly one biometric attribute and none of
    /// the attributes the builder computes itself. The certificate chain and
    /// signer pairing are checked before `signer` is invoked.
    pub fn build<S: DetachedSigner + ?Sized>(
        &self,
        content: &[u8],
        attributes: &[SignedAttribute],
        chain: &CertificateChain,
        signer: &S,
    ) -> Result<CmsSignedData, CryptoError> {
        debug!(content_len = content.len(), "Digesting signed content");
        let message_digest = self.provider.digest(content);
        self.build_with_digest(&message_digest, attributes, chain, signer)
    }

    /// Same as [`CmsSignatureBuilder::build`] for content that was already
    /// digested with the provider's algorithm
    pub fn build_with_digest<S: DetachedSigner + ?Sized>(
        &self,
        message_digest: &[u8],
        attributes: &[SignedAttribute],
        chain: &CertificateChain,
        signer: &S,
    ) -> Result<CmsSignedData, CryptoError> {
        let leaf = chain.leaf()?;
        if let Some(at) = self.signing_time {
            leaf.check_validity(at)?;
        }

        let signature_algorithm = signer.algorithm();
        let digest_algorithm = self.provider.digest_algorithm();
        if signature_algorithm.digest() != digest_algorithm {
            return Err(CryptoError::AlgorithmMismatch {
                expected: digest_algorithm,
                actual: signature_algorithm.digest(),
            });
        }
        if signature_algorithm.key_type() != leaf.key_type {
            return Err(CryptoError::Certificate(format!(
                "signer uses {} but the certificate holds a {} key",
                signature_algorithm,
                leaf.key_type
            )));
        }
        if let Some(spki) = signer.public_key_der() {
            if spki != leaf.spki_der {
                return Err(CryptoError::Certificate(format!(
                    "signing key does not match certificate '{}'",
                    leaf.subject
                )));
            }
        }
        if message_digest.len() != digest_algorithm.output_len() {
            return Err(CryptoError::InvalidAttributes(format!(
                "message digest is {} bytes, {} produces {}",
                message_digest.len(),
                digest_algorithm,
                digest_algorithm.output_len()
            )));
        }
        self.check_attributes(attributes)?;

        let signed_attributes = self.signed_attributes(message_digest, attributes);
        debug!(attributes_len = signed_attributes.len(), "Signing attribute set");

        let signature_value = signer.sign(&signed_attributes)?;

        let signer_info = build_signer_info(
            &leaf,
            digest_algorithm,
            signature_algorithm,
            &signed_attributes,
            &signature_value,
        );
        let signed_data = build_signed_data(digest_algorithm, chain, &signer_info);
        let der = build_sequence(&[
            &build_oid(OID_SIGNED_DATA),
            &build_context_specific(0, &signed_data),
        ]);

        info!(
            algorithm = %signature_algorithm,
            signer = %leaf.subject,
            cms_len = der.len(),
            "Built detached CMS signature"
        );

        Ok(CmsSignedData {
            digest_algorithm,
            signature_algorithm,
            signer_certificate: leaf,
            signed_attributes,
            message_digest: message_digest.to_vec(),
            signature_value,
            der,
        })
    }

    fn check_attributes(&self, attributes: &[SignedAttribute]) -> Result<(), CryptoError> {
        let biometric = attributes
            .iter()
            .filter(|attr| attr.is(BIOMETRIC_ATTRIBUTE_OID))
            .count();
        if biometric != 1 {
            return Err(CryptoError::InvalidAttributes(format!(
                "expected exactly one biometric attribute, found {biometric}"
            )));
        }

        let mut reserved = vec![OID_CONTENT_TYPE, OID_MESSAGE_DIGEST];
        if self.signing_time_attribute().is_some() {
            reserved.push(OID_SIGNING_TIME);
        }
        if let Some(attr) = attributes
            .iter()
            .find(|attr| reserved.iter().any(|oid| attr.is(oid)))
        {
            return Err(CryptoError::InvalidAttributes(format!(
                "attribute {:?} is computed by the builder",
                attr.oid()
            )));
        }
        Ok(())
    }

    /// DER SET OF the full attribute list, tagged 0x31 as it is signed
    fn signed_attributes(&self, message_digest: &[u8], extra: &[SignedAttribute]) -> Vec<u8> {
        let mut attributes = vec![SignedAttribute::content_type(OID_DATA)];
        if let Some(at) = self.signing_time_attribute() {
            attributes.push(SignedAttribute::signing_time(at));
        }
        attributes.push(SignedAttribute::message_digest(message_digest));
        attributes.extend(extra.iter().cloned());

        build_set_of(attributes.iter().map(SignedAttribute::to_der).collect())
    }
}

fn build_signer_info(
    leaf: &LeafCertificate,
    digest: DigestAlgorithm,
    signature: SignatureAlgorithm,
    signed_attributes: &[u8],
    signature_value: &[u8],
) -> Vec<u8> {
    // [0] IMPLICIT: same encoding, SET tag swapped for the context tag
    let mut implicit_attrs = signed_attributes.to_vec();
    if let Some(first) = implicit_attrs.first_mut() {
        *first = tag::CONTEXT_0;
    }

    build_sequence(&[
        &build_integer(1),
        &leaf.issuer_and_serial,
        &build_algorithm_identifier(digest.oid(), false),
        &implicit_attrs,
        &build_algorithm_identifier(signature.oid(), signature.has_null_params()),
        &build_octet_string(signature_value),
    ])
}

fn build_signed_data(
    digest: DigestAlgorithm,
    chain: &CertificateChain,
    signer_info: &[u8],
) -> Vec<u8> {
    // certificates is a SET OF, so DER order applies
    let mut certificates = chain.certificates().to_vec();
    certificates.sort_unstable();
    certificates.dedup();
    build_sequence(&[
        &build_integer(1),
        &build_set(&[&build_algorithm_identifier(digest.oid(), false)]),
        &build_sequence(&[&build_oid(OID_DATA)]),
        &build_context_specific(0, &certificates.concat()),
        &build_set(&[signer_info]),
    ])
}
