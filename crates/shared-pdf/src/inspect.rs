//! Locate signatures already embedded in a PDF

use lopdf::{Document, Object, ObjectId};
use serde::Serialize;
use shared_types::der::encoded_len;
use tracing::debug;

use crate::byte_range::ByteRange;
use crate::error::PdfSignError;
use crate::incremental::decode_text;

/// One signature dictionary found in a document
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmbeddedSignature {
    pub object_id: (u32, u16),
    pub field_name: Option<String>,
    pub byte_range: ByteRange,
    pub sub_filter: Option<String>,
    pub signer_name: Option<String>,
    pub reason: Option<String>,
    pub location: Option<String>,
    pub signing_time: Option<String>,
    /// `/Contents` with trailing zero padding removed
    #[serde(skip)]
    pub contents: Vec<u8>,
}

impl EmbeddedSignature {
    /// Covered bytes of `document`, gap removed
    pub fn signed_content(&self, document: &[u8]) -> Result<Vec<u8>, PdfSignError> {
        self.byte_range.signed_content(document)
    }
}

fn text(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_text(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

fn byte_range_of(document: &Document, value: &Object) -> Result<ByteRange, PdfSignError> {
    let value = match value {
        Object::Reference(id) => document
            .get_object(*id)
            .map_err(|e| PdfSignError::InvalidByteRange(e.to_string()))?,
        other => other,
    };
    let items = value
        .as_array()
        .map_err(|_| PdfSignError::InvalidByteRange("/ByteRange is not an array".into()))?;
    let numbers: Vec<i64> = items
        .iter()
        .map(|item| item.as_i64())
        .collect::<Result<_, _>>()
        .map_err(|_| PdfSignError::InvalidByteRange("non-integer entry".into()))?;
    let values: [i64; 4] = numbers.try_into().map_err(|v: Vec<i64>| {
        PdfSignError::InvalidByteRange(format!("{} entries, expected 4", v.len()))
    })?;
    ByteRange::from_array(values)
}

/// Strip placeholder padding after the DER value
fn trim_contents(raw: &[u8]) -> Vec<u8> {
    match encoded_len(raw) {
        Ok(len) => raw[..len].to_vec(),
        Err(_) => raw.to_vec(),
    }
}

/// Every signature dictionary in `bytes`, ordered by where its range ends
pub fn find_signatures(bytes: &[u8]) -> Result<Vec<EmbeddedSignature>, PdfSignError> {
    let document = Document::load_mem(bytes).map_err(|e| PdfSignError::Parse(e.to_string()))?;

    let field_names: Vec<(ObjectId, String)> = document
        .objects
        .values()
        .filter_map(|object| object.as_dict().ok())
        .filter_map(|dict| {
            let sig_ref = dict.get(b"V").and_then(Object::as_reference).ok()?;
            Some((sig_ref, text(dict, b"T")?))
        })
        .collect();

    let mut signatures = Vec::new();
    for (&id, object) in document.objects.iter() {
        let Ok(dict) = object.as_dict() else {
            continue;
        };
        let (Ok(range), Ok(contents)) = (dict.get(b"ByteRange"), dict.get(b"Contents")) else {
            continue;
        };
        let Object::String(raw, _) = contents else {
            continue;
        };

        let byte_range = byte_range_of(&document, range)?;
        let field_name = field_names
            .iter()
            .find(|(sig_id, _)| *sig_id == id)
            .map(|(_, name)| name.clone());
        debug!(object = id.0, field = ?field_name, "Found signature dictionary");

        signatures.push(EmbeddedSignature {
            object_id: id,
            field_name,
            byte_range,
            sub_filter: text(dict, b"SubFilter"),
            signer_name: text(dict, b"Name"),
            reason: text(dict, b"Reason"),
            location: text(dict, b"Location"),
            signing_time: text(dict, b"M"),
            contents: trim_contents(raw),
        });
    }

    signatures.sort_by_key(|sig| sig.byte_range.end());
    Ok(signatures)
}
