//! The signing pipeline
//!
//! One call runs load, encode, attribute assembly, reservation, digest,
//! signature and patch strictly in sequence. The signer call is the only step
//! that may block on external hardware.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bdb_core::{BiometricInput, BiometricRecordEncoder};
use chrono::{DateTime, Utc};
use shared_crypto::{
    CertificateChain, CmsSignatureBuilder, CmsSignedData, CryptoProvider, DetachedSigner,
    SignedAttribute, SignedAttributeBuilder,
};
use shared_pdf::{IncrementalDocumentSigner, SignatureMetadata, SignedDocument, Unsigned};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::config::SigningConfig;
use crate::error::{ErrorKind, SigningError, SigningResult, Stage, StageContext};
use crate::request::{SignOptions, SignatureRequest};

/// Headroom added on top of the measured CMS size when retrying
pub const PLACEHOLDER_SLACK: usize = 1024;

/// Placeholder size for a retry after a CMS of `required` bytes did not fit
pub fn enlarged_placeholder(required: usize) -> usize {
    (required + PLACEHOLDER_SLACK).next_multiple_of(1024)
}

/// Signs documents with one key, certificate chain and configuration
pub struct SigningEngine<S> {
    config: SigningConfig,
    provider: CryptoProvider,
    encoder: BiometricRecordEncoder,
    signer: S,
    chain: CertificateChain,
}

impl<S: DetachedSigner> SigningEngine<S> {
    pub fn new(
        config: SigningConfig,
        provider: CryptoProvider,
        signer: S,
        chain: CertificateChain,
    ) -> Self {
        let encoder = BiometricRecordEncoder::new(config.default_resolution);
        Self {
            config,
            provider,
            encoder,
            signer,
            chain,
        }
    }

    pub fn config(&self) -> &SigningConfig {
        &self.config
    }

    pub fn provider(&self) -> &CryptoProvider {
        &self.provider
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    /// Normalize and encode a capture; an empty capture is rejected
    pub fn encode_capture(&self, capture: BiometricInput) -> SigningResult<Vec<u8>> {
        let record = capture
            .normalize(self.encoder.default_resolution())
            .at_stage(Stage::EncodeBiometric)?;
        if record.count() == 0 {
            return Err(SigningError::new(
                Stage::EncodeBiometric,
                ErrorKind::MalformedInput("capture contains no samples".into()),
            ));
        }
        Ok(self.encoder.encode(&record))
    }

    /// Sign `document` in memory and return the finalized bytes
    pub fn sign(
        &self,
        document: Vec<u8>,
        capture: BiometricInput,
        options: &SignOptions,
    ) -> SigningResult<SignedDocument> {
        let unsigned = IncrementalDocumentSigner::load(document).at_stage(Stage::Load)?;
        let bdb = self.encode_capture(capture)?;
        let attributes = self.build_attributes(&bdb);

        let signing_time = options.signing_time.unwrap_or_else(Utc::now);
        let mut metadata = self.metadata(options, signing_time);

        let err = match self.attempt(&unsigned, &metadata, &attributes) {
            Ok(signed) => return Ok(signed),
            Err(err) => err,
        };
        let Some(required) = err
            .required_placeholder()
            .filter(|_| self.config.retry_oversized)
        else {
            return Err(err);
        };

        let enlarged = enlarged_placeholder(required);
        warn!(
            required,
            reserved = metadata.placeholder_size,
            enlarged,
            "Signature did not fit the placeholder, retrying once"
        );
        metadata.placeholder_size = enlarged;
        self.attempt(&unsigned, &metadata, &attributes)
    }

    /// Digest the covered bytes of a reserved document and build the CMS
    pub fn sign_request(&self, request: SignatureRequest<'_>) -> SigningResult<CmsSignedData> {
        let digest = request
            .byte_range
            .digest(request.document_bytes, request.digest_algorithm)
            .at_stage(Stage::Digest)?;
        debug!(
            covered = request.byte_range.covered_len(),
            algorithm = %request.digest_algorithm,
            reason = ?request.reason,
            location = ?request.location,
            "Digested byte range"
        );

        let provider = self.provider.with_digest(request.digest_algorithm);
        CmsSignatureBuilder::new(&provider)
            .with_signing_time(request.signing_time)
            .build_with_digest(
                &digest,
                &request.signed_attributes,
                request.certificate_chain,
                &self.signer,
            )
            .at_stage(Stage::Sign)
    }

    /// Read `input`, sign it and atomically replace `output`.
    ///
    /// On any failure `output` is left as it was; `input` is never written
    /// unless it is also `output`.
    pub fn sign_file(
        &self,
        input: &Path,
        output: &Path,
        capture: BiometricInput,
        options: &SignOptions,
    ) -> SigningResult<SignedDocument> {
        let document = std::fs::read(input).at_stage(Stage::Load)?;
        info!(input = %input.display(), bytes = document.len(), "Signing file");

        let signed = self.sign(document, capture, options)?;
        persist_atomically(output, signed.as_bytes()).at_stage(Stage::Persist)?;

        info!(
            output = %output.display(),
            field = %signed.field_name(),
            bytes = signed.as_bytes().len(),
            "Signed document written"
        );
        Ok(signed)
    }

    fn build_attributes(&self, bdb: &[u8]) -> Vec<SignedAttribute> {
        let attributes = SignedAttributeBuilder::new().build_set(bdb);
        debug!(
            stage = %Stage::BuildAttributes,
            bdb_len = bdb.len(),
            count = attributes.len(),
            "Built signed attributes"
        );
        attributes
    }

    fn metadata(&self, options: &SignOptions, signing_time: DateTime<Utc>) -> SignatureMetadata {
        let pick = |own: &Option<String>, configured: &Option<String>| {
            own.clone().or_else(|| configured.clone())
        };
        SignatureMetadata {
            field_name: options.field_name.clone(),
            signer_name: pick(&options.signer_name, &self.config.signer_name),
            reason: pick(&options.reason, &self.config.reason),
            location: pick(&options.location, &self.config.location),
            contact_info: pick(&options.contact_info, &self.config.contact_info),
            signing_time,
            page: options.page.or(self.config.page),
            placeholder_size: self.config.placeholder_size,
        }
    }

    fn attempt(
        &self,
        unsigned: &IncrementalDocumentSigner<Unsigned>,
        metadata: &SignatureMetadata,
        attributes: &[SignedAttribute],
    ) -> SigningResult<SignedDocument> {
        let reserved = unsigned.reserve(metadata).at_stage(Stage::ReservePlaceholder)?;

        let request = SignatureRequest {
            document_bytes: reserved.bytes(),
            byte_range: reserved.byte_range(),
            certificate_chain: &self.chain,
            signed_attributes: attributes.to_vec(),
            digest_algorithm: self.provider.digest_algorithm(),
            reason: metadata.reason.clone(),
            location: metadata.location.clone(),
            signing_time: metadata.signing_time,
        };
        let cms = self.sign_request(request)?;

        let signed = reserved
            .attach(cms.to_der())
            .at_stage(Stage::Patch)?
            .finalize();
        info!(
            field = %signed.field_name(),
            signer = %cms.signer_certificate.subject,
            cms_len = cms.len(),
            "Document signed"
        );
        Ok(signed)
    }
}

impl<S: DetachedSigner + Send + Sync + 'static> SigningEngine<S> {
    /// [`SigningEngine::sign`] on a blocking worker thread
    pub async fn sign_in_background(
        self: Arc<Self>,
        document: Vec<u8>,
        capture: BiometricInput,
        options: SignOptions,
    ) -> SigningResult<SignedDocument> {
        tokio::task::spawn_blocking(move || self.sign(document, capture, &options))
            .await
            .map_err(|e| worker_failed(Stage::Sign, e))?
    }

    /// [`SigningEngine::sign_file`] on a blocking worker thread
    pub async fn sign_file_in_background(
        self: Arc<Self>,
        input: PathBuf,
        output: PathBuf,
        capture: BiometricInput,
        options: SignOptions,
    ) -> SigningResult<SignedDocument> {
        tokio::task::spawn_blocking(move || self.sign_file(&input, &output, capture, &options))
            .await
            .map_err(|e| worker_failed(Stage::Persist, e))?
    }
}

fn worker_failed(stage: Stage, err: tokio::task::JoinError) -> SigningError {
    SigningError::new(stage, ErrorKind::Io(format!("signing worker stopped: {err}")))
}

/// Write to a scratch file beside `dest`, fsync, then rename over `dest`
fn persist_atomically(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match dest.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut scratch = NamedTempFile::new_in(dir)?;
    scratch.write_all(bytes)?;
    scratch.as_file().sync_all()?;
    scratch.persist(dest).map_err(|e| e.error)?;
    debug!(path = %dest.display(), bytes = bytes.len(), "Persisted output");
    Ok(())
}
