//! Verification of signed documents
//!
//! Each embedded signature is checked independently of how it was produced:
//! the byte range is digested again, compared with the message-digest
//! attribute, the signature value is checked against the embedded signer
//! certificate and the biometric data block is decoded.

use bdb_core::DecodedBdb;
use serde::Serialize;
use shared_crypto::{inspect, CmsInspection, DigestAlgorithm, LeafCertificate, SignatureCheck};
use shared_pdf::{find_signatures, EmbeddedSignature, PdfSignError};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignatureReport {
    pub field_name: Option<String>,
    pub byte_range: [u64; 4],
    /// The range reaches the end of the checked file
    pub covers_whole_document: bool,
    /// The range ends on a revision's `%%EOF` marker
    pub covers_revision: bool,
    pub sub_filter: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub digest_algorithm: Option<DigestAlgorithm>,
    pub digest_matches: bool,
    pub signature: SignatureCheck,
    pub signer: Option<String>,
    pub signing_time: Option<String>,
    pub biometric: Option<DecodedBdb>,
    /// Anything that could not be checked, in plain words
    pub problems: Vec<String>,
}

impl SignatureReport {
    /// Digest and signature both check out and the biometric block decodes
    pub fn is_valid(&self) -> bool {
        self.covers_revision
            && self.digest_matches
            && self.signature == SignatureCheck::Valid
            && self.biometric.is_some()
    }
}

/// Check every signature embedded in `bytes`, oldest revision first
pub fn verify_document(bytes: &[u8]) -> Result<Vec<SignatureReport>, PdfSignError> {
    let signatures = find_signatures(bytes)?;
    debug!(count = signatures.len(), "Verifying embedded signatures");
    Ok(signatures.iter().map(|sig| check(bytes, sig)).collect())
}

fn check(bytes: &[u8], sig: &EmbeddedSignature) -> SignatureReport {
    let mut report = SignatureReport {
        field_name: sig.field_name.clone(),
        byte_range: sig.byte_range.to_array(),
        covers_whole_document: sig.byte_range.covers_through(bytes.len()),
        covers_revision: ends_at_revision(bytes, sig.byte_range.end()),
        sub_filter: sig.sub_filter.clone(),
        reason: sig.reason.clone(),
        location: sig.location.clone(),
        digest_algorithm: None,
        digest_matches: false,
        signature: SignatureCheck::Invalid,
        signer: None,
        signing_time: sig.signing_time.clone(),
        biometric: None,
        problems: Vec::new(),
    };
    if !report.covers_revision {
        report
            .problems
            .push("byte range does not end at a revision boundary".into());
    }

    let inspection = match inspect(&sig.contents) {
        Ok(inspection) => inspection,
        Err(e) => {
            warn!(field = ?sig.field_name, error = %e, "Unreadable signature contents");
            report.problems.push(e.to_string());
            return report;
        }
    };

    report.digest_algorithm = inspection.digest_algorithm;
    report.digest_matches = digest_matches(bytes, sig, &inspection, &mut report.problems);
    report.signature = inspection.verify_signature();
    report.signer = inspection
        .signer_certificate
        .as_deref()
        .and_then(|der| LeafCertificate::parse(der).ok())
        .map(|leaf| leaf.subject);
    if inspection.signing_time.is_some() {
        report.signing_time = inspection.signing_time.clone();
    }

    match inspection.biometric.as_deref().map(bdb_core::decode) {
        Some(Ok(decoded)) => report.biometric = Some(decoded),
        Some(Err(e)) => report.problems.push(e.to_string()),
        None => report.problems.push("no biometric attribute".into()),
    }

    debug!(
        field = ?report.field_name,
        digest_matches = report.digest_matches,
        signature = ?report.signature,
        "Checked signature"
    );
    report
}

fn digest_matches(
    bytes: &[u8],
    sig: &EmbeddedSignature,
    inspection: &CmsInspection,
    problems: &mut Vec<String>,
) -> bool {
    let Some(algorithm) = inspection.digest_algorithm else {
        problems.push(format!(
            "unsupported digest algorithm {}",
            inspection.digest_algorithm_oid
        ));
        return false;
    };
    let Some(expected) = &inspection.message_digest else {
        problems.push("no message-digest attribute".into());
        return false;
    };
    match sig.byte_range.digest(bytes, algorithm) {
        Ok(actual) if actual == *expected => true,
        Ok(_) => {
            problems.push("document digest differs from the signed message digest".into());
            false
        }
        Err(e) => {
            problems.push(e.to_string());
            false
        }
    }
}

fn ends_at_revision(bytes: &[u8], end: usize) -> bool {
    let Some(head) = bytes.get(..end) else {
        return false;
    };
    let trimmed = match head.iter().rposition(|b| !b.is_ascii_whitespace()) {
        Some(last) => &head[..=last],
        None => return false,
    };
    trimmed.ends_with(b"%%EOF")
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_pdf::{IncrementalDocumentSigner, SignatureMetadata};

    const SAMPLE: &[u8] = include_bytes!("../../../testdata/sample.pdf");

    #[test]
    fn test_unsigned_document() {
        assert!(verify_document(SAMPLE).unwrap().is_empty());
    }

    #[test]
    fn test_non_cms_contents_reported() {
        let meta = SignatureMetadata {
            placeholder_size: 64,
            ..SignatureMetadata::default()
        };
        let signed = IncrementalDocumentSigner::load(SAMPLE.to_vec())
            .unwrap()
            .reserve(&meta)
            .unwrap()
            .attach(&[0x30, 0x03, 0x02, 0x01, 0x07])
            .unwrap()
            .finalize()
            .into_bytes();

        let reports = verify_document(&signed).unwrap();
        assert_eq!(reports.len(), 1);
        let report = &reports[0];
        assert!(report.covers_whole_document);
        assert!(report.covers_revision);
        assert!(!report.digest_matches);
        assert_eq!(report.signature, SignatureCheck::Invalid);
        assert!(!report.problems.is_empty());
        assert!(!report.is_valid());
    }

    #[test]
    fn test_revision_boundary() {
        let bytes = b"%PDF-1.4\n...\n%%EOF\r\nmore";
        assert!(ends_at_revision(bytes, 20));
        assert!(!ends_at_revision(bytes, 12));
        assert!(!ends_at_revision(bytes, 100));
    }
}
