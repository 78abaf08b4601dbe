mod common;

use std::sync::Arc;

use common::*;
use docsign_core::{
    verify_document, BiometricInput, ErrorKind, SignOptions, SigningConfig, Stage,
};
use pretty_assertions::assert_eq;
use sha2::{Digest, Sha256};
use shared_crypto::{inspect, DigestAlgorithm, SignatureCheck};
use shared_pdf::find_signatures;

/// BDB for one sample `(10, 20, 0, 128)` at 600x600 DPI
const SINGLE_POINT_BDB: &[u8] = &[
    0x30, 0x2A, // BDB
    0x30, 0x0A, 0x06, 0x05, 0x2B, 0x24, 0x03, 0x02, 0x01, 0x02, 0x01, 0x02, // header
    0x30, 0x08, 0x02, 0x02, 0x02, 0x58, 0x02, 0x02, 0x02, 0x58, // resolution
    0x02, 0x01, 0x01, // count
    0x31, 0x0F, 0x30, 0x0D, 0x02, 0x01, 0x0A, 0x02, 0x01, 0x14, 0x02, 0x01, 0x00, 0x02, 0x02,
    0x00, 0x80, // samples
];

#[test]
fn signed_document_verifies() {
    let options = SignOptions::default()
        .with_reason("Lease approval")
        .with_location("Berlin");
    let signed = engine()
        .sign(SAMPLE.to_vec(), single_point(), &options)
        .unwrap();
    let bytes = signed.as_bytes();

    assert!(bytes.starts_with(SAMPLE));
    assert_eq!(signed.original_len(), SAMPLE.len());
    assert_eq!(signed.field_name(), "Signature1");

    let reports = verify_document(bytes).unwrap();
    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert!(report.is_valid(), "problems: {:?}", report.problems);
    assert!(report.covers_whole_document);
    assert_eq!(report.signature, SignatureCheck::Valid);
    assert_eq!(report.digest_algorithm, Some(DigestAlgorithm::Sha256));
    assert_eq!(report.reason.as_deref(), Some("Lease approval"));
    assert_eq!(report.location.as_deref(), Some("Berlin"));
    assert_eq!(report.sub_filter.as_deref(), Some("adbe.pkcs7.detached"));
    assert!(report
        .signer
        .as_deref()
        .is_some_and(|s| s.contains("Docsign Test Signer")));

    let bdb = report.biometric.as_ref().unwrap();
    assert_eq!(bdb.count, 1);
    assert_eq!(bdb.resolution.horz, 600);
    assert_eq!((bdb.samples[0].x, bdb.samples[0].y, bdb.samples[0].p), (10, 20, 128));
}

#[test]
fn biometric_attribute_carries_exact_block() {
    let signed = engine()
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let embedded = find_signatures(signed.as_bytes()).unwrap();
    let cms = inspect(&embedded[0].contents).unwrap();
    assert_eq!(cms.biometric.as_deref(), Some(SINGLE_POINT_BDB));
}

#[test]
fn signing_time_attribute_follows_config() {
    let signed = engine()
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let embedded = find_signatures(signed.as_bytes()).unwrap();
    assert!(inspect(&embedded[0].contents).unwrap().signing_time.is_some());

    let config = SigningConfig {
        include_signing_time: false,
        ..SigningConfig::default()
    };
    let signed = engine_with(config, SIGNER_PEM)
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let embedded = find_signatures(signed.as_bytes()).unwrap();
    let cms = inspect(&embedded[0].contents).unwrap();
    assert_eq!(cms.signing_time, None);
    assert!(verify_document(signed.as_bytes()).unwrap()[0].is_valid());
}

#[test]
fn independent_digest_matches_message_digest() {
    let signed = engine()
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let bytes = signed.as_bytes();
    let [_, gap_start, gap_end, tail] = signed.byte_range().to_array().map(|v| v as usize);

    // gap is exactly the hex string, delimiters included
    assert_eq!(bytes[gap_start], b'<');
    assert_eq!(bytes[gap_end - 1], b'>');
    assert_eq!(gap_end + tail, bytes.len());

    let mut hasher = Sha256::new();
    hasher.update(&bytes[..gap_start]);
    hasher.update(&bytes[gap_end..]);
    let digest = hasher.finalize().to_vec();

    let embedded = find_signatures(bytes).unwrap();
    let cms = inspect(&embedded[0].contents).unwrap();
    assert_eq!(cms.message_digest, Some(digest));
}

#[test]
fn tampered_content_fails_digest_check() {
    let signed = engine()
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let mut bytes = signed.into_bytes();
    let at = bytes
        .windows(15)
        .position(|w| w == b"Lease agreement")
        .unwrap();
    bytes[at + 14] = b'T';

    let reports = verify_document(&bytes).unwrap();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].digest_matches);
    assert_eq!(reports[0].signature, SignatureCheck::Valid);
    assert!(!reports[0].is_valid());
}

#[test]
fn sha512_configuration() {
    let config = SigningConfig {
        digest: DigestAlgorithm::Sha512,
        ..SigningConfig::default()
    };
    let signed = engine_with(config, SIGNER_PEM)
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let report = &verify_document(signed.as_bytes()).unwrap()[0];
    assert_eq!(report.digest_algorithm, Some(DigestAlgorithm::Sha512));
    assert!(report.is_valid(), "problems: {:?}", report.problems);
}

#[test]
fn chain_is_embedded() {
    let signed = engine_with(SigningConfig::default(), CHAIN_PEM)
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();
    let embedded = find_signatures(signed.as_bytes()).unwrap();
    let cms = inspect(&embedded[0].contents).unwrap();
    assert_eq!(cms.certificates.len(), 2);

    let report = &verify_document(signed.as_bytes()).unwrap()[0];
    assert!(report.is_valid(), "problems: {:?}", report.problems);
    assert!(report
        .signer
        .as_deref()
        .is_some_and(|s| s.contains("Docsign Chain Signer")));
}

#[test]
fn second_signature_is_appended() {
    let engine = engine();
    let first = engine
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap()
        .into_bytes();
    let second = engine
        .sign(first.clone(), single_point(), &SignOptions::default().with_reason("Counter-signed"))
        .unwrap();

    assert!(second.as_bytes().starts_with(&first));
    assert_eq!(second.field_name(), "Signature2");

    let reports = verify_document(second.as_bytes()).unwrap();
    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.is_valid()));
    assert!(!reports[0].covers_whole_document);
    assert!(reports[1].covers_whole_document);
    assert_eq!(reports[1].reason.as_deref(), Some("Counter-signed"));
}

#[test]
fn document_with_existing_form_and_annotations() {
    let signed = engine()
        .sign(ANNOTATED.to_vec(), single_point(), &SignOptions::default().with_page(1))
        .unwrap();
    assert!(signed.as_bytes().starts_with(ANNOTATED));
    let report = &verify_document(signed.as_bytes()).unwrap()[0];
    assert!(report.is_valid(), "problems: {:?}", report.problems);
}

#[test]
fn json_capture_with_two_strokes() {
    let json = r#"{
        "resolution": {"horz": 300, "vert": 300},
        "strokes": [
            [
                {"x": 1.0, "y": 2.0, "timestamp": 0, "pressure": 0.1, "velocity": 0.0},
                {"x": 3.0, "y": 4.0, "timestamp": 8, "pressure": 0.2, "velocity": 1.5},
                {"x": 5.0, "y": 6.0, "timestamp": 16, "pressure": 0.3, "velocity": 1.5}
            ],
            [
                {"x": 7.0, "y": 8.0, "timestamp": 90, "pressure": 0.4, "velocity": 0.0},
                {"x": 9.0, "y": 10.0, "timestamp": 98, "pressure": 0.5, "velocity": 2.0}
            ]
        ]
    }"#;
    let capture = bdb_core::json::parse_input(json, Default::default()).unwrap();
    let signed = engine()
        .sign(SAMPLE.to_vec(), capture, &SignOptions::default())
        .unwrap();

    let report = &verify_document(signed.as_bytes()).unwrap()[0];
    let bdb = report.biometric.as_ref().unwrap();
    assert_eq!(bdb.count, 5);
    assert_eq!(bdb.samples.len(), 5);
    assert_eq!(bdb.resolution.horz, 300);
}

#[test]
fn oversized_signature_is_retried_once() {
    let config = SigningConfig {
        placeholder_size: 64,
        ..SigningConfig::default()
    };
    let signed = engine_with(config, SIGNER_PEM)
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap();

    let gap = signed.byte_range().gap();
    assert!(gap.len() > 2 * 64 + 2);
    let report = &verify_document(signed.as_bytes()).unwrap()[0];
    assert!(report.is_valid(), "problems: {:?}", report.problems);
}

#[test]
fn oversized_signature_without_retry_leaves_files_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, SAMPLE).unwrap();
    std::fs::write(&output, b"previous").unwrap();

    let config = SigningConfig {
        placeholder_size: 64,
        retry_oversized: false,
        ..SigningConfig::default()
    };
    let err = engine_with(config, SIGNER_PEM)
        .sign_file(&input, &output, single_point(), &SignOptions::default())
        .unwrap_err();

    assert_eq!(err.stage, Stage::Patch);
    assert!(matches!(
        err.kind,
        ErrorKind::SignatureTooLarge { available: 64, required } if required > 64
    ));
    assert_eq!(std::fs::read(&input).unwrap(), SAMPLE.to_vec());
    assert_eq!(std::fs::read(&output).unwrap(), b"previous".to_vec());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn sign_file_replaces_destination() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("signed.pdf");
    std::fs::write(&input, SAMPLE).unwrap();

    let signed = engine()
        .sign_file(&input, &output, single_point(), &SignOptions::default())
        .unwrap();

    let written = std::fs::read(&output).unwrap();
    assert_eq!(written, signed.as_bytes().to_vec());
    assert_eq!(std::fs::read(&input).unwrap(), SAMPLE.to_vec());
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
}

#[test]
fn sign_file_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("doc.pdf");
    std::fs::write(&path, SAMPLE).unwrap();

    engine()
        .sign_file(&path, &path, single_point(), &SignOptions::default())
        .unwrap();
    let written = std::fs::read(&path).unwrap();
    assert!(written.starts_with(SAMPLE));
    assert_eq!(verify_document(&written).unwrap().len(), 1);
}

#[test]
fn locked_key_reports_signing_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, SAMPLE).unwrap();

    let engine = engine();
    engine.signer().backend().lock("signer").unwrap();
    let err = engine
        .sign_file(&input, &output, single_point(), &SignOptions::default())
        .unwrap_err();

    assert_eq!(err.stage, Stage::Sign);
    assert!(matches!(err.kind, ErrorKind::SigningUnavailable(_)));
    assert!(!output.exists());
}

#[test]
fn missing_input_fails_at_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = engine()
        .sign_file(
            &dir.path().join("missing.pdf"),
            &dir.path().join("out.pdf"),
            single_point(),
            &SignOptions::default(),
        )
        .unwrap_err();
    assert_eq!(err.stage, Stage::Load);
    assert!(matches!(err.kind, ErrorKind::Io(_)));
}

#[test]
fn encrypted_document_is_rejected() {
    let err = engine()
        .sign(ENCRYPTED.to_vec(), single_point(), &SignOptions::default())
        .unwrap_err();
    assert_eq!(err.stage, Stage::Load);
    assert!(matches!(err.kind, ErrorKind::InvalidDocument(_)));
}

#[test]
fn existing_field_name_is_rejected() {
    let engine = engine();
    let first = engine
        .sign(SAMPLE.to_vec(), single_point(), &SignOptions::default())
        .unwrap()
        .into_bytes();
    let err = engine
        .sign(first, single_point(), &SignOptions::default().with_field_name("Signature1"))
        .unwrap_err();
    assert_eq!(err.stage, Stage::ReservePlaceholder);
    assert!(matches!(err.kind, ErrorKind::InvalidDocument(_)));
}

#[test]
fn empty_capture_is_rejected() {
    let err = engine()
        .sign(SAMPLE.to_vec(), BiometricInput::points(Vec::new()), &SignOptions::default())
        .unwrap_err();
    assert_eq!(err.stage, Stage::EncodeBiometric);
}

#[tokio::test]
async fn background_signing() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.pdf");
    let output = dir.path().join("out.pdf");
    std::fs::write(&input, SAMPLE).unwrap();

    let engine = Arc::new(engine());
    let signed = Arc::clone(&engine)
        .sign_file_in_background(input, output.clone(), single_point(), SignOptions::default())
        .await
        .unwrap();
    assert_eq!(std::fs::read(&output).unwrap(), signed.as_bytes().to_vec());

    let in_memory = engine
        .sign_in_background(SAMPLE.to_vec(), single_point(), SignOptions::default())
        .await
        .unwrap();
    assert!(verify_document(in_memory.as_bytes()).unwrap()[0].is_valid());
}
