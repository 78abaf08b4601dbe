//! Sign-only key capability
//!
//! A [`DetachedSigner`] exposes a single digest-then-sign operation. Private
//! key material stays behind a [`KeyStoreBackend`]; callers only ever hold an
//! alias and the ability to request a signature.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::algorithm::{KeyType, SignatureAlgorithm};
use crate::error::CryptoError;
use crate::provider::CryptoProvider;

/// Trait for anything that can produce a detached signature
pub trait DetachedSigner {
    /// The digest/key pairing used by [`DetachedSigner::sign`]
    fn algorithm(&self) -> SignatureAlgorithm;

    /// Digest `message` and sign it, returning the encoded signature value
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// DER SubjectPublicKeyInfo of the signing key, when the store reveals it
    fn public_key_der(&self) -> Option<Vec<u8>> {
        None
    }
}

impl<S: DetachedSigner + ?Sized> DetachedSigner for &S {
    fn algorithm(&self) -> SignatureAlgorithm {
        (**self).algorithm()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        (**self).sign(message)
    }

    fn public_key_der(&self) -> Option<Vec<u8>> {
        (**self).public_key_der()
    }
}

impl<S: DetachedSigner + ?Sized> DetachedSigner for Box<S> {
    fn algorithm(&self) -> SignatureAlgorithm {
        (**self).algorithm()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        (**self).sign(message)
    }

    fn public_key_der(&self) -> Option<Vec<u8>> {
        (**self).public_key_der()
    }
}

impl<S: DetachedSigner + ?Sized> DetachedSigner for Arc<S> {
    fn algorithm(&self) -> SignatureAlgorithm {
        (**self).algorithm()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        (**self).sign(message)
    }

    fn public_key_der(&self) -> Option<Vec<u8>> {
        (**self).public_key_der()
    }
}

/// State of a key inside an isolated store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum KeyStatus {
    Available,
    Locked,
    Revoked,
    Missing,
}

impl fmt::Display for KeyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Available => "available",
            Self::Locked => "locked",
            Self::Revoked => "revoked",
            Self::Missing => "missing",
        };
        f.write_str(label)
    }
}

/// Backend for a key store that never exports private keys
///
/// Hardware vaults, platform key stores and the in-memory
/// [`crate::SoftwareKeyStore`] all implement this.
pub trait KeyStoreBackend {
    fn key_status(&self, alias: &str) -> KeyStatus;

    fn key_type(&self, alias: &str) -> Result<KeyType, CryptoError>;

    /// Digest and sign `message` with the key behind `alias`
    fn perform_signature(
        &self,
        alias: &str,
        algorithm: SignatureAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, CryptoError>;

    fn public_key_der(&self, alias: &str) -> Option<Vec<u8>>;
}

impl<B: KeyStoreBackend + ?Sized> KeyStoreBackend for &B {
    fn key_status(&self, alias: &str) -> KeyStatus {
        (**self).key_status(alias)
    }

    fn key_type(&self, alias: &str) -> Result<KeyType, CryptoError> {
        (**self).key_type(alias)
    }

    fn perform_signature(
        &self,
        alias: &str,
        algorithm: SignatureAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        (**self).perform_signature(alias, algorithm, message)
    }

    fn public_key_der(&self, alias: &str) -> Option<Vec<u8>> {
        (**self).public_key_der(alias)
    }
}

impl<B: KeyStoreBackend + ?Sized> KeyStoreBackend for Arc<B> {
    fn key_status(&self, alias: &str) -> KeyStatus {
        (**self).key_status(alias)
    }

    fn key_type(&self, alias: &str) -> Result<KeyType, CryptoError> {
        (**self).key_type(alias)
    }

    fn perform_signature(
        &self,
        alias: &str,
        algorithm: SignatureAlgorithm,
        message: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        (**self).perform_signature(alias, algorithm, message)
    }

    fn public_key_der(&self, alias: &str) -> Option<Vec<u8>> {
        (**self).public_key_der(alias)
    }
}

/// [`DetachedSigner`] bound to one alias in a [`KeyStoreBackend`]
pub struct KeyStoreSigner<B> {
    backend: B,
    alias: String,
    algorithm: SignatureAlgorithm,
}

impl<B: KeyStoreBackend> KeyStoreSigner<B> {
    /// Bind to `alias`, choosing the pairing from the key type and the
    /// provider's digest. Fails if the key is not usable right now.
    pub fn new(
        backend: B,
        alias: impl Into<String>,
        provider: &CryptoProvider,
    ) -> Result<Self, CryptoError> {
        let alias = alias.into();
        ensure_available(&backend, &alias)?;
        let key_type = backend.key_type(&alias)?;
        let algorithm = provider.signature_algorithm(key_type);
        debug!(alias = %alias, algorithm = %algorithm, "Bound key store signer");

        Ok(Self {
            backend,
            alias,
            algorithm,
        })
    }

    pub fn alias(&self) -> &str {
        &self.alias
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}

impl<B: KeyStoreBackend> DetachedSigner for KeyStoreSigner<B> {
    fn algorithm(&self) -> SignatureAlgorithm {
        self.algorithm
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>, CryptoError> {
        ensure_available(&self.backend, &self.alias)?;
        self.backend
            .perform_signature(&self.alias, self.algorithm, message)
            .map_err(|err| match err {
                CryptoError::SigningUnavailable(_) => err,
                other => CryptoError::SigningUnavailable(other.to_string()),
            })
    }

    fn public_key_der(&self) -> Option<Vec<u8>> {
        self.backend.public_key_der(&self.alias)
    }
}

fn ensure_available<B: KeyStoreBackend + ?Sized>(backend: &B, alias: &str) -> Result<(), CryptoError> {
    match backend.key_status(alias) {
        KeyStatus::Available => Ok(()),
        status => {
            warn!(alias = %alias, status = %status, "Key is not available for signing");
            Err(CryptoError::SigningUnavailable(format!(
                "key '{alias}' is {status}"
            )))
        }
    }
}
