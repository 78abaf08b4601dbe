#![allow(dead_code)]

use std::sync::Arc;

use docsign_core::{BiometricInput, CertificateChain, SigningConfig, SigningEngine};
use shared_crypto::{KeyStoreSigner, SoftwareKeyStore};
use shared_types::RawPoint;

pub const SAMPLE: &[u8] = include_bytes!("../../../../testdata/sample.pdf");
pub const ANNOTATED: &[u8] = include_bytes!("../../../../testdata/annotated.pdf");
pub const ENCRYPTED: &[u8] = include_bytes!("../../../../testdata/encrypted.pdf");
pub const SIGNER_PEM: &[u8] = include_bytes!("../../../../testdata/signer-cert.pem");
pub const CHAIN_PEM: &[u8] = include_bytes!("../../../../testdata/chain.pem");
pub const KEY_PEM: &str = include_str!("../../../../testdata/signer-key.pem");

pub type TestSigner = KeyStoreSigner<Arc<SoftwareKeyStore>>;

pub fn key_store() -> Arc<SoftwareKeyStore> {
    let store = Arc::new(SoftwareKeyStore::new());
    store.import_pem("signer", KEY_PEM).unwrap();
    store
}

pub fn engine_with(config: SigningConfig, chain_pem: &[u8]) -> SigningEngine<TestSigner> {
    let provider = config.provider();
    let signer = KeyStoreSigner::new(key_store(), "signer", &provider).unwrap();
    let chain = CertificateChain::from_pem(chain_pem).unwrap();
    SigningEngine::new(config, provider, signer, chain)
}

pub fn engine() -> SigningEngine<TestSigner> {
    engine_with(SigningConfig::default(), SIGNER_PEM)
}

/// The single-point capture `(10, 20, 0, 128)`
pub fn single_point() -> BiometricInput {
    BiometricInput::points(vec![RawPoint {
        x: 10,
        y: 20,
        t: 0,
        p: 128,
    }])
}
