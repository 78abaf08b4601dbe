use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use bdb_core::BiometricRecordEncoder;
use clap::Args;
use docsign_core::config::parse_resolution;
use docsign_core::{
    verify_document, BiometricInput, CertificateChain, SignOptions, SignatureReport, SigningConfig,
    SigningEngine,
};
use shared_crypto::{KeyStoreSigner, SignatureCheck, SoftwareKeyStore};
use tracing::info;

/// Alias the command-line key is imported under
const KEY_ALIAS: &str = "cli";

#[derive(Args, Debug)]
pub struct SignArgs {
    /// PDF to sign
    #[arg(long)]
    pub input: PathBuf,

    /// Destination; replaced atomically, may equal the input
    #[arg(long)]
    pub output: PathBuf,

    /// Capture JSON (session, strokes or points)
    #[arg(long)]
    pub capture: PathBuf,

    /// PEM certificate chain, leaf first
    #[arg(long)]
    pub cert: PathBuf,

    /// PEM P-256 private key (PKCS#8 or SEC1)
    #[arg(long)]
    pub key: PathBuf,

    #[arg(long)]
    pub reason: Option<String>,

    #[arg(long)]
    pub location: Option<String>,

    #[arg(long)]
    pub signer_name: Option<String>,

    #[arg(long)]
    pub contact_info: Option<String>,

    /// Signature field name; SignatureN when omitted
    #[arg(long)]
    pub field: Option<String>,

    /// 1-based page for the signature widget
    #[arg(long)]
    pub page: Option<u32>,

    /// sha256 or sha512
    #[arg(long)]
    pub digest: Option<String>,

    /// Reserved CMS capacity in bytes
    #[arg(long)]
    pub placeholder_size: Option<usize>,

    /// Resolution for captures without one, `600` or `600x400`
    #[arg(long)]
    pub resolution: Option<String>,

    /// Leave the signing-time attribute out of the CMS
    #[arg(long)]
    pub no_signing_time: bool,

    /// Fail instead of retrying when the placeholder is too small
    #[arg(long)]
    pub no_retry: bool,
}

impl SignArgs {
    /// Flags take precedence over file and environment settings
    fn apply(&self, mut config: SigningConfig) -> Result<SigningConfig> {
        if let Some(digest) = &self.digest {
            config.digest = digest.parse().map_err(anyhow::Error::msg)?;
        }
        if let Some(size) = self.placeholder_size {
            config.placeholder_size = size;
        }
        if let Some(resolution) = &self.resolution {
            config.default_resolution = parse_resolution(resolution)?;
        }
        if let Some(page) = self.page {
            config.page = Some(page);
        }
        if self.no_signing_time {
            config.include_signing_time = false;
        }
        if self.no_retry {
            config.retry_oversized = false;
        }
        Ok(config.validate()?)
    }

    fn options(&self) -> SignOptions {
        SignOptions {
            field_name: self.field.clone(),
            signer_name: self.signer_name.clone(),
            reason: self.reason.clone(),
            location: self.location.clone(),
            contact_info: self.contact_info.clone(),
            page: self.page,
            signing_time: None,
        }
    }
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Signed PDF
    pub file: PathBuf,

    /// Print the reports as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Capture JSON
    #[arg(long)]
    pub capture: PathBuf,

    /// Write DER here instead of printing hex
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Resolution for captures without one
    #[arg(long)]
    pub resolution: Option<String>,
}

fn read_capture(path: &Path, config: &SigningConfig) -> Result<BiometricInput> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read capture {}", path.display()))?;
    bdb_core::json::parse_input(&text, config.default_resolution)
        .with_context(|| format!("Invalid capture {}", path.display()))
}

fn load_config(file: Option<&Path>) -> Result<SigningConfig> {
    SigningConfig::load(file).context("Failed to load signing configuration")
}

pub async fn sign(args: SignArgs, config_file: Option<&Path>) -> Result<()> {
    let config = args.apply(load_config(config_file)?)?;
    let provider = config.provider();

    let key_pem = std::fs::read_to_string(&args.key)
        .with_context(|| format!("Failed to read key {}", args.key.display()))?;
    let store = Arc::new(SoftwareKeyStore::new());
    store.import_pem(KEY_ALIAS, &key_pem)?;
    let signer = KeyStoreSigner::new(store, KEY_ALIAS, &provider)?;
    let chain = CertificateChain::from_pem_file(&args.cert)?;

    let capture = read_capture(&args.capture, &config)?;
    let options = args.options();
    let engine = Arc::new(SigningEngine::new(config, provider, signer, chain));

    let signed = engine
        .sign_file_in_background(args.input.clone(), args.output.clone(), capture, options)
        .await
        .with_context(|| format!("Failed to sign {}", args.input.display()))?;

    info!(
        output = %args.output.display(),
        field = %signed.field_name(),
        "Signature applied"
    );
    println!("{} signed as {}", args.output.display(), signed.field_name());
    Ok(())
}

pub fn verify(args: VerifyArgs) -> Result<()> {
    let bytes = std::fs::read(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;
    let reports = verify_document(&bytes)
        .with_context(|| format!("Failed to inspect {}", args.file.display()))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else if reports.is_empty() {
        println!("{}: no signatures", args.file.display());
    } else {
        for report in &reports {
            println!("{}", summarize(report));
        }
    }

    verdict(&reports)
}

/// Unchecked signatures still fail the command, but are counted apart from
/// signatures that were checked and found wrong
fn verdict(reports: &[SignatureReport]) -> Result<()> {
    let unchecked = reports
        .iter()
        .filter(|r| matches!(r.signature, SignatureCheck::Unsupported(_)))
        .count();
    let failed = reports.iter().filter(|r| !r.is_valid()).count() - unchecked;
    match (failed, unchecked) {
        (0, 0) => Ok(()),
        (failed, 0) => bail!("{failed} of {} signatures failed verification", reports.len()),
        (failed, unchecked) => bail!(
            "{failed} of {} signatures failed verification, {unchecked} could not be checked \
             (only ECDSA P-256 signature values are verified)",
            reports.len()
        ),
    }
}

fn summarize(report: &SignatureReport) -> String {
    let status = match &report.signature {
        SignatureCheck::Valid if report.is_valid() => "valid".to_string(),
        SignatureCheck::Valid => "INVALID".to_string(),
        SignatureCheck::Invalid => "INVALID".to_string(),
        SignatureCheck::Unsupported(reason) => format!("unchecked ({reason})"),
    };
    let mut line = format!(
        "{}: {status}, digest {}, signer {}",
        report.field_name.as_deref().unwrap_or("(unnamed)"),
        if report.digest_matches { "ok" } else { "mismatch" },
        report.signer.as_deref().unwrap_or("unknown"),
    );
    if let Some(bdb) = &report.biometric {
        line.push_str(&format!(
            ", {} samples at {}x{} dpi",
            bdb.count, bdb.resolution.horz, bdb.resolution.vert
        ));
    }
    if !report.covers_whole_document {
        line.push_str(", later revisions follow");
    }
    for problem in &report.problems {
        line.push_str(&format!("\n  - {problem}"));
    }
    line
}

pub fn encode_bdb(args: EncodeArgs, config_file: Option<&Path>) -> Result<()> {
    let mut config = load_config(config_file)?;
    if let Some(resolution) = &args.resolution {
        config.default_resolution = parse_resolution(resolution)?;
    }
    let capture = read_capture(&args.capture, &config)?;
    let bdb = BiometricRecordEncoder::new(config.default_resolution).encode_input(capture)?;

    match &args.output {
        Some(path) => {
            std::fs::write(path, &bdb)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), bytes = bdb.len(), "Biometric data block written");
        }
        None => println!("{}", hex::encode(&bdb)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const TESTDATA: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata");

    fn fixture(name: &str) -> PathBuf {
        Path::new(TESTDATA).join(name)
    }

    fn sign_args(dir: &Path) -> SignArgs {
        let capture = dir.join("capture.json");
        std::fs::write(&capture, r#"[{"x": 10, "y": 20, "t": 0, "p": 128}]"#).unwrap();
        SignArgs {
            input: fixture("sample.pdf"),
            output: dir.join("signed.pdf"),
            capture,
            cert: fixture("signer-cert.pem"),
            key: fixture("signer-key.pem"),
            reason: Some("Approved".into()),
            location: None,
            signer_name: None,
            contact_info: None,
            field: None,
            page: None,
            digest: None,
            placeholder_size: None,
            resolution: None,
            no_signing_time: false,
            no_retry: false,
        }
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut args = sign_args(dir.path());
        args.digest = Some("sha512".into());
        args.placeholder_size = Some(4096);
        args.resolution = Some("300".into());
        args.no_retry = true;

        let config = args.apply(SigningConfig::default()).unwrap();
        assert_eq!(config.digest, shared_crypto::DigestAlgorithm::Sha512);
        assert_eq!(config.placeholder_size, 4096);
        assert_eq!(config.default_resolution.horz, 300);
        assert!(!config.retry_oversized);

        args.placeholder_size = Some(0);
        assert!(args.apply(SigningConfig::default()).is_err());
    }

    #[tokio::test]
    async fn test_sign_then_verify() {
        let dir = tempfile::tempdir().unwrap();
        let args = sign_args(dir.path());
        let output = args.output.clone();
        sign(args, None).await.unwrap();

        let signed = std::fs::read(&output).unwrap();
        let original = std::fs::read(fixture("sample.pdf")).unwrap();
        assert!(signed.starts_with(&original));

        verify(VerifyArgs {
            file: output.clone(),
            json: true,
        })
        .unwrap();
        let reports = verify_document(&signed).unwrap();
        assert_eq!(reports[0].reason.as_deref(), Some("Approved"));
        assert!(summarize(&reports[0]).starts_with("Signature1: valid"));
    }

    #[tokio::test]
    async fn test_unchecked_signature_reported_apart() {
        let dir = tempfile::tempdir().unwrap();
        let args = sign_args(dir.path());
        let output = args.output.clone();
        sign(args, None).await.unwrap();

        let reports = verify_document(&std::fs::read(&output).unwrap()).unwrap();
        assert!(verdict(&reports).is_ok());

        let mut rsa = reports[0].clone();
        rsa.signature = SignatureCheck::Unsupported("SHA256withRSA is not verified locally".into());
        assert!(summarize(&rsa).contains("unchecked (SHA256withRSA is not verified locally)"));

        let message = verdict(&[rsa.clone()]).unwrap_err().to_string();
        assert!(message.starts_with("0 of 1 signatures failed verification, 1 could not be checked"));

        let mut broken = reports[0].clone();
        broken.digest_matches = false;
        let message = verdict(&[broken, rsa]).unwrap_err().to_string();
        assert!(message.starts_with("1 of 2 signatures failed verification, 1 could not"));
    }

    #[test]
    fn test_verify_unsigned_succeeds() {
        verify(VerifyArgs {
            file: fixture("sample.pdf"),
            json: false,
        })
        .unwrap();
    }

    #[test]
    fn test_encode_bdb_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let args = sign_args(dir.path());
        let output = dir.path().join("capture.bdb");
        encode_bdb(
            EncodeArgs {
                capture: args.capture,
                output: Some(output.clone()),
                resolution: None,
            },
            None,
        )
        .unwrap();

        let decoded = bdb_core::decode(&std::fs::read(output).unwrap()).unwrap();
        assert_eq!(decoded.count, 1);
        assert_eq!(decoded.resolution.horz, 600);
    }
}
