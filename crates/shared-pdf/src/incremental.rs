//! Incremental (append-only) signing
//!
//! The signer never rewrites an existing byte. Reservation appends a new
//! revision holding the signature dictionary, an invisible widget, the
//! updated page and form objects, a cross-reference section and a trailer
//! chained to the previous one with `/Prev`. The `/Contents` hex string is a
//! zero-filled placeholder; its span is the byte-range gap, so the digest can
//! be computed before the signature exists and the signature patched in
//! afterwards without moving anything.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Document, Object, ObjectId};
use shared_crypto::DigestAlgorithm;
use tracing::{debug, info};

use crate::byte_range::ByteRange;
use crate::error::PdfSignError;
use crate::writer::{text_string, write_dictionary, write_indirect, write_object, write_xref};

/// Default DER capacity of the `/Contents` placeholder, in bytes
pub const DEFAULT_PLACEHOLDER_SIZE: usize = 8192;

/// Annotation flags for the signature widget: Print | Locked
const WIDGET_FLAGS: i64 = 132;

/// AcroForm SigFlags: SignaturesExist | AppendOnly
const SIG_FLAGS: i64 = 3;

/// Descriptive fields written into the signature dictionary
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMetadata {
    /// Field name; a unique `SignatureN` is chosen when absent
    pub field_name: Option<String>,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub contact_info: Option<String>,
    pub signing_time: DateTime<Utc>,
    /// 1-based page for the widget; the last page when absent
    pub page: Option<u32>,
    /// Reserved DER capacity in bytes (the hex string is twice as long)
    pub placeholder_size: usize,
}

impl Default for SignatureMetadata {
    fn default() -> Self {
        Self {
            field_name: None,
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
            signing_time: Utc::now(),
            page: None,
            placeholder_size: DEFAULT_PLACEHOLDER_SIZE,
        }
    }
}

/// Signing state machine over one document
#[derive(Debug)]
pub struct IncrementalDocumentSigner<S> {
    state: S,
}

/// Parsed original document, not yet touched
#[derive(Debug)]
pub struct Unsigned {
    original: Vec<u8>,
    document: Document,
}

/// Update section appended, `/ByteRange` final, `/Contents` still zero
#[derive(Debug)]
pub struct PlaceholderReserved {
    bytes: Vec<u8>,
    original_len: usize,
    byte_range: ByteRange,
    placeholder_size: usize,
    field_name: String,
}

/// Signature accepted and ready to be written into the gap
#[derive(Debug)]
pub struct SignatureComputed {
    reserved: PlaceholderReserved,
    hex: Vec<u8>,
}

/// Final output of the state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedDocument {
    bytes: Vec<u8>,
    byte_range: ByteRange,
    field_name: String,
    original_len: usize,
}

impl SignedDocument {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Length of the untouched prefix
    pub fn original_len(&self) -> usize {
        self.original_len
    }
}

impl IncrementalDocumentSigner<Unsigned> {
    /// Parse `original`, rejecting encrypted documents
    pub fn load(original: Vec<u8>) -> Result<Self, PdfSignError> {
        let document = match Document::load_mem(&original) {
            Ok(document) => document,
            Err(e) if raw_trailer_has_encrypt(&original) => {
                debug!(error = %e, "Parse failed on an encrypted document");
                return Err(PdfSignError::Encrypted);
            }
            Err(e) => return Err(PdfSignError::Parse(e.to_string())),
        };
        if document.trailer.get(b"Encrypt").is_ok() || raw_trailer_has_encrypt(&original) {
            return Err(PdfSignError::Encrypted);
        }
        if document.get_pages().is_empty() {
            return Err(PdfSignError::InvalidDocument("document has no pages".into()));
        }

        Ok(Self {
            state: Unsigned { original, document },
        })
    }

    pub fn original(&self) -> &[u8] {
        &self.state.original
    }

    pub fn page_count(&self) -> usize {
        self.state.document.get_pages().len()
    }

    /// Names of every existing form field carrying a `/T`
    pub fn existing_field_names(&self) -> BTreeSet<String> {
        self.state
            .document
            .objects
            .values()
            .filter_map(|object| object.as_dict().ok())
            .filter(|dict| dict.get(b"FT").is_ok())
            .filter_map(|dict| dict.get(b"T").ok())
            .filter_map(|t| match t {
                Object::String(bytes, _) => Some(decode_text(bytes)),
                _ => None,
            })
            .collect()
    }

    /// Append the update section with an empty placeholder.
    ///
    /// Borrows the unsigned state so a caller can reserve again with a
    /// larger placeholder.
    pub fn reserve(
        &self,
        metadata: &SignatureMetadata,
    ) -> Result<IncrementalDocumentSigner<PlaceholderReserved>, PdfSignError> {
        if metadata.placeholder_size == 0 {
            return Err(PdfSignError::InvalidDocument(
                "placeholder size must be positive".into(),
            ));
        }
        let Unsigned { original, document } = &self.state;

        let field_name = self.choose_field_name(metadata.field_name.as_deref())?;
        let page_id = self.target_page(metadata.page)?;
        let root_id = document
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| PdfSignError::InvalidDocument("trailer has no /Root reference".into()))?;
        let prev_xref = previous_xref_offset(original)?;

        let declared_size = document
            .trailer
            .get(b"Size")
            .and_then(Object::as_i64)
            .ok()
            .and_then(|size| u32::try_from(size).ok())
            .unwrap_or(0);
        let first_new_id = declared_size.max(document.max_id + 1);
        let sig_id: ObjectId = (first_new_id, 0);
        let widget_id: ObjectId = (first_new_id + 1, 0);

        let updated_page = with_widget_annotation(document, page_id, widget_id)?;
        let form_objects = form_update(document, root_id, widget_id)?;

        let mut bytes = original.clone();
        if !matches!(bytes.last(), Some(b'\n') | Some(b'\r')) {
            bytes.push(b'\n');
        }
        let mut xref_entries = Vec::new();

        // signature dictionary, written by hand to know the placeholder offsets
        xref_entries.push((sig_id, bytes.len()));
        let (byte_range_at, contents_at) = write_signature_dictionary(&mut bytes, sig_id, metadata);

        xref_entries.push((widget_id, bytes.len()));
        let widget = widget_dictionary(&field_name, sig_id, page_id);
        write_indirect(&mut bytes, widget_id, &serialize(&Object::Dictionary(widget)));

        xref_entries.push((page_id, bytes.len()));
        write_indirect(&mut bytes, page_id, &serialize(&Object::Dictionary(updated_page)));

        for (id, object) in form_objects {
            xref_entries.push((id, bytes.len()));
            write_indirect(&mut bytes, id, &serialize(&object));
        }

        let size = xref_entries
            .iter()
            .map(|((id, _), _)| id + 1)
            .fold(declared_size, u32::max);
        let xref_at = bytes.len();
        write_xref(&mut bytes, xref_entries);
        write_trailer(&mut bytes, document, size, root_id, prev_xref);
        bytes.extend_from_slice(format!("startxref\n{xref_at}\n%%EOF\n").as_bytes());

        let gap_start = contents_at;
        let gap_end = contents_at + metadata.placeholder_size * 2 + 2;
        let byte_range = ByteRange::new(gap_start, gap_end, bytes.len() - gap_end)?;
        let rendered = byte_range.render_padded();
        bytes[byte_range_at..byte_range_at + rendered.len()].copy_from_slice(rendered.as_bytes());

        debug!(
            sig_object = sig_id.0,
            gap_start,
            gap_end,
            total = bytes.len(),
            "Reserved signature placeholder"
        );

        Ok(IncrementalDocumentSigner {
            state: PlaceholderReserved {
                bytes,
                original_len: original.len(),
                byte_range,
                placeholder_size: metadata.placeholder_size,
                field_name,
            },
        })
    }

    fn choose_field_name(&self, requested: Option<&str>) -> Result<String, PdfSignError> {
        let existing = self.existing_field_names();
        match requested {
            Some(name) if existing.contains(name) => Err(PdfSignError::FieldExists(name.into())),
            Some(name) => Ok(name.to_string()),
            None => Ok((1..)
                .map(|n| format!("Signature{n}"))
                .find(|candidate| !existing.contains(candidate))
                .unwrap_or_else(|| "Signature".to_string())),
        }
    }

    fn target_page(&self, page: Option<u32>) -> Result<ObjectId, PdfSignError> {
        let pages = self.state.document.get_pages();
        let count = pages.len();
        let number = page.unwrap_or(count as u32);
        pages
            .get(&number)
            .copied()
            .ok_or(PdfSignError::PageNotFound { page: number, count })
    }
}

impl IncrementalDocumentSigner<PlaceholderReserved> {
    pub fn byte_range(&self) -> ByteRange {
        self.state.byte_range
    }

    /// Whole file with the zero placeholder in place
    pub fn bytes(&self) -> &[u8] {
        &self.state.bytes
    }

    pub fn field_name(&self) -> &str {
        &self.state.field_name
    }

    pub fn placeholder_size(&self) -> usize {
        self.state.placeholder_size
    }

    /// The covered content, gap removed
    pub fn signed_content(&self) -> Result<Vec<u8>, PdfSignError> {
        self.state.byte_range.signed_content(&self.state.bytes)
    }

    /// Digest of the covered content
    pub fn digest(&self, algorithm: DigestAlgorithm) -> Result<Vec<u8>, PdfSignError> {
        self.state.byte_range.digest(&self.state.bytes, algorithm)
    }

    /// Accept DER signature bytes, checking they fit the placeholder
    pub fn attach(
        self,
        cms: &[u8],
    ) -> Result<IncrementalDocumentSigner<SignatureComputed>, PdfSignError> {
        let available = self.state.placeholder_size;
        if cms.len() > available {
            return Err(PdfSignError::SignatureTooLarge {
                required: cms.len(),
                available,
            });
        }
        Ok(IncrementalDocumentSigner {
            state: SignatureComputed {
                reserved: self.state,
                hex: hex::encode_upper(cms).into_bytes(),
            },
        })
    }
}

impl IncrementalDocumentSigner<SignatureComputed> {
    /// Write the signature into the gap; length and every other byte stay put
    pub fn finalize(self) -> SignedDocument {
        let SignatureComputed { reserved, hex } = self.state;
        let PlaceholderReserved {
            mut bytes,
            original_len,
            byte_range,
            placeholder_size,
            field_name,
        } = reserved;

        let start = byte_range.gap().start + 1;
        let span = &mut bytes[start..start + placeholder_size * 2];
        span[..hex.len()].copy_from_slice(&hex);
        span[hex.len()..].fill(b'0');

        info!(
            field = %field_name,
            signature_len = hex.len() / 2,
            total = bytes.len(),
            "Signature embedded"
        );

        SignedDocument {
            bytes,
            byte_range,
            field_name,
            original_len,
        }
    }
}

fn serialize(object: &Object) -> Vec<u8> {
    let mut out = Vec::new();
    write_object(&mut out, object);
    out
}

/// Find the last occurrence of a pattern in bytes
pub fn find_last_occurrence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    let len = needle.len();
    if len == 0 || len > haystack.len() {
        return None;
    }
    (0..=(haystack.len() - len))
        .rev()
        .find(|&i| &haystack[i..i + len] == needle)
}

/// Offset named by the final `startxref`
pub fn previous_xref_offset(bytes: &[u8]) -> Result<usize, PdfSignError> {
    let marker = find_last_occurrence(bytes, b"startxref")
        .ok_or_else(|| PdfSignError::InvalidDocument("no startxref marker".into()))?;
    let digits: String = bytes[marker + b"startxref".len()..]
        .iter()
        .skip_while(|b| b.is_ascii_whitespace())
        .take_while(|b| b.is_ascii_digit())
        .map(|&b| b as char)
        .collect();
    digits
        .parse()
        .map_err(|_| PdfSignError::InvalidDocument("startxref offset is not a number".into()))
}

fn raw_trailer_has_encrypt(bytes: &[u8]) -> bool {
    final_trailer(bytes)
        .is_some_and(|trailer| find_last_occurrence(trailer, b"/Encrypt").is_some())
}

/// Raw bytes of the newest trailer dictionary.
///
/// For a classic section this is the `trailer` dictionary after the table the
/// final `startxref` names; for a cross-reference stream it is the stream's
/// dictionary up to the `stream` keyword. Object bodies are never included.
fn final_trailer(bytes: &[u8]) -> Option<&[u8]> {
    let marker = find_last_occurrence(bytes, b"startxref")?;
    let section = previous_xref_offset(bytes)
        .ok()
        .and_then(|offset| bytes.get(offset..marker))
        .map(|section| {
            let skip = section
                .iter()
                .position(|b| !b.is_ascii_whitespace())
                .unwrap_or(section.len());
            &section[skip..]
        });

    match section {
        Some(section) if section.starts_with(b"xref") => {
            let start = find_last_occurrence(section, b"trailer")?;
            Some(&section[start..])
        }
        Some(section) if !section.is_empty() => {
            let end = find_first_occurrence(section, b"stream").unwrap_or(section.len());
            Some(&section[..end])
        }
        // startxref offset unusable: fall back to a trailer keyword near the end
        _ => {
            let start = find_last_occurrence(&bytes[..marker], b"trailer")?;
            Some(&bytes[start..marker])
        }
    }
}

fn find_first_occurrence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return None;
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}

pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        String::from_utf8_lossy(bytes).into_owned()
    }
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Result<&'a Object, PdfSignError> {
    match object {
        Object::Reference(id) => document
            .get_object(*id)
            .map_err(|e| PdfSignError::InvalidDocument(format!("dangling reference {id:?}: {e}"))),
        other => Ok(other),
    }
}

/// Writes `/Type /Sig` by hand and returns the offsets of the `/ByteRange`
/// array and of the `<` opening `/Contents`
fn write_signature_dictionary(
    out: &mut Vec<u8>,
    id: ObjectId,
    metadata: &SignatureMetadata,
) -> (usize, usize) {
    out.extend_from_slice(format!("{} {} obj\n", id.0, id.1).as_bytes());
    out.extend_from_slice(b"<</Type /Sig/Filter /Adobe.PPKLite/SubFilter /adbe.pkcs7.detached");

    out.extend_from_slice(b"/ByteRange ");
    let byte_range_at = out.len();
    out.extend_from_slice(ByteRange::placeholder().as_bytes());

    out.extend_from_slice(b"/Contents ");
    let contents_at = out.len();
    out.push(b'<');
    out.resize(out.len() + metadata.placeholder_size * 2, b'0');
    out.push(b'>');

    let signing_time = metadata
        .signing_time
        .format("D:%Y%m%d%H%M%S+00'00'")
        .to_string();
    let mut extra = Dictionary::new();
    extra.set("M", text_string(&signing_time));
    for (key, value) in [
        ("Name", &metadata.signer_name),
        ("Reason", &metadata.reason),
        ("Location", &metadata.location),
        ("ContactInfo", &metadata.contact_info),
    ] {
        if let Some(value) = value {
            extra.set(key, text_string(value));
        }
    }
    // splice the optional entries into the same dictionary
    let mut rendered = Vec::new();
    write_dictionary(&mut rendered, &extra);
    out.extend_from_slice(&rendered[2..rendered.len() - 2]);
    out.extend_from_slice(b">>\nendobj\n");

    (byte_range_at, contents_at)
}

fn widget_dictionary(field_name: &str, sig_id: ObjectId, page_id: ObjectId) -> Dictionary {
    let mut widget = Dictionary::new();
    widget.set("Type", Object::Name(b"Annot".to_vec()));
    widget.set("Subtype", Object::Name(b"Widget".to_vec()));
    widget.set("FT", Object::Name(b"Sig".to_vec()));
    widget.set("T", text_string(field_name));
    widget.set("V", Object::Reference(sig_id));
    widget.set(
        "Rect",
        Object::Array(vec![
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(0),
            Object::Integer(0),
        ]),
    );
    widget.set("F", Object::Integer(WIDGET_FLAGS));
    widget.set("P", Object::Reference(page_id));
    widget
}

/// Copy of the page dictionary with the widget appended to `/Annots`
fn with_widget_annotation(
    document: &Document,
    page_id: ObjectId,
    widget_id: ObjectId,
) -> Result<Dictionary, PdfSignError> {
    let mut page = document
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|_| PdfSignError::InvalidDocument("page is not a dictionary".into()))?
        .clone();

    let mut annots = match page.get(b"Annots") {
        Ok(annots) => resolve(document, annots)?
            .as_array()
            .map_err(|_| PdfSignError::InvalidDocument("/Annots is not an array".into()))?
            .clone(),
        Err(_) => Vec::new(),
    };
    annots.push(Object::Reference(widget_id));
    page.set("Annots", Object::Array(annots));
    Ok(page)
}

/// Objects to rewrite so the AcroForm lists the new field.
///
/// An indirect AcroForm is rewritten in place; an inline or missing one
/// means rewriting the catalog.
fn form_update(
    document: &Document,
    root_id: ObjectId,
    widget_id: ObjectId,
) -> Result<Vec<(ObjectId, Object)>, PdfSignError> {
    let catalog = document
        .get_object(root_id)
        .and_then(Object::as_dict)
        .map_err(|_| PdfSignError::InvalidDocument("catalog is not a dictionary".into()))?;

    let (acroform_id, acroform) = match catalog.get(b"AcroForm") {
        Ok(Object::Reference(id)) => {
            let dict = document
                .get_object(*id)
                .and_then(Object::as_dict)
                .map_err(|_| PdfSignError::InvalidDocument("/AcroForm is not a dictionary".into()))?;
            (Some(*id), dict.clone())
        }
        Ok(Object::Dictionary(dict)) => (None, dict.clone()),
        Ok(_) => {
            return Err(PdfSignError::InvalidDocument(
                "/AcroForm is not a dictionary".into(),
            ))
        }
        Err(_) => (None, Dictionary::new()),
    };

    let mut acroform = acroform;
    let mut fields = match acroform.get(b"Fields") {
        Ok(fields) => resolve(document, fields)?
            .as_array()
            .map_err(|_| PdfSignError::InvalidDocument("/Fields is not an array".into()))?
            .clone(),
        Err(_) => Vec::new(),
    };
    fields.push(Object::Reference(widget_id));
    acroform.set("Fields", Object::Array(fields));
    acroform.set("SigFlags", Object::Integer(SIG_FLAGS));

    match acroform_id {
        Some(id) => Ok(vec![(id, Object::Dictionary(acroform))]),
        None => {
            let mut catalog = catalog.clone();
            catalog.set("AcroForm", Object::Dictionary(acroform));
            Ok(vec![(root_id, Object::Dictionary(catalog))])
        }
    }
}

fn write_trailer(
    out: &mut Vec<u8>,
    document: &Document,
    size: u32,
    root_id: ObjectId,
    prev_xref: usize,
) {
    let mut trailer = Dictionary::new();
    trailer.set("Size", Object::Integer(i64::from(size)));
    trailer.set("Root", Object::Reference(root_id));
    trailer.set("Prev", Object::Integer(prev_xref as i64));
    for key in [&b"Info"[..], b"ID"] {
        if let Ok(value) = document.trailer.get(key) {
            trailer.set(key.to_vec(), value.clone());
        }
    }
    out.extend_from_slice(b"trailer\n");
    write_dictionary(out, &trailer);
    out.push(b'\n');
}
