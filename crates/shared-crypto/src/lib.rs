//! Shared cryptography utilities
//!
//! This crate provides the detached CMS signature machinery: digest and
//! signature algorithm identifiers, the sign-only key capability, certificate
//! chain handling, signed-attribute construction and CMS SignedData assembly
//! and inspection.

pub mod algorithm;
pub mod attributes;
pub mod cert;
pub mod error;
pub mod inspect;
pub mod provider;
pub mod signed_data;
pub mod signer;
pub mod software;

pub use algorithm::{DigestAlgorithm, KeyType, SignatureAlgorithm};
pub use attributes::{SignedAttribute, SignedAttributeBuilder, BIOMETRIC_ATTRIBUTE_OID};
pub use cert::{CertificateChain, LeafCertificate};
pub use error::CryptoError;
pub use inspect::{inspect, CmsInspection, SignatureCheck};
pub use provider::CryptoProvider;
pub use signed_data::{CmsSignatureBuilder, CmsSignedData};
pub use signer::{DetachedSigner, KeyStatus, KeyStoreBackend, KeyStoreSigner};
pub use software::SoftwareKeyStore;
