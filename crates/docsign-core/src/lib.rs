//! Document signing core logic
//!
//! Drives one signing operation end to end: the capture is encoded into a
//! biometric data block, wrapped as a signed attribute, a placeholder is
//! reserved in an incremental update, the covered bytes are digested and
//! signed, and the CMS is patched into the placeholder. File output goes
//! through a scratch file that is atomically renamed over the destination.
//!
//! Every failure is reported as a [`SigningError`] naming the pipeline
//! [`Stage`] it came from.

pub mod config;
pub mod engine;
pub mod error;
pub mod request;
pub mod verify;

pub use config::{ConfigError, SigningConfig};
pub use engine::{SigningEngine, PLACEHOLDER_SLACK};
pub use error::{ErrorKind, SigningError, SigningResult, Stage, StageContext};
pub use request::{SignOptions, SignatureRequest};
pub use verify::{verify_document, SignatureReport};

pub use bdb_core::{BiometricInput, BiometricRecordEncoder};
pub use shared_crypto::{CertificateChain, CryptoProvider, DetachedSigner};
pub use shared_pdf::SignedDocument;
