//! Minimal ASN.1 DER toolkit
//!
//! Only the handful of universal types needed for biometric data blocks and
//! CMS signed attributes are covered: INTEGER, OCTET STRING, NULL, OBJECT
//! IDENTIFIER, UTCTime, SEQUENCE, SET and constructed context-specific tags.
//! Tags are always single-octet (low tag number form).

use thiserror::Error;

/// Universal and commonly used tag octets
pub mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const BIT_STRING: u8 = 0x03;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OID: u8 = 0x06;
    pub const UTC_TIME: u8 = 0x17;
    pub const GENERALIZED_TIME: u8 = 0x18;
    pub const SEQUENCE: u8 = 0x30;
    pub const SET: u8 = 0x31;
    /// `[0]` constructed, context-specific
    pub const CONTEXT_0: u8 = 0xA0;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DerError {
    #[error("Unexpected end of DER data")]
    Truncated,

    #[error("Unexpected tag: expected 0x{expected:02X}, found 0x{found:02X}")]
    UnexpectedTag { expected: u8, found: u8 },

    #[error("Unsupported tag encoding 0x{0:02X}")]
    UnsupportedTag(u8),

    #[error("Unsupported length encoding")]
    UnsupportedLength,

    #[error("Integer is empty or does not fit in 64 bits")]
    InvalidInteger,

    #[error("Malformed object identifier")]
    InvalidOid,

    #[error("{0} trailing bytes after DER value")]
    TrailingData(usize),
}

// === Encoding ===

/// Encode a single tag-length-value triple
pub fn build_tlv(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(content.len() + 6);
    result.push(tag);
    encode_length(content.len(), &mut result);
    result.extend_from_slice(content);
    result
}

fn encode_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    out.push(0x80 | (bytes.len() - skip) as u8);
    out.extend_from_slice(&bytes[skip..]);
}

pub fn build_sequence(items: &[&[u8]]) -> Vec<u8> {
    build_tlv(tag::SEQUENCE, &items.concat())
}

/// Build a SET from already-encoded elements, preserving the given order
pub fn build_set(items: &[&[u8]]) -> Vec<u8> {
    build_tlv(tag::SET, &items.concat())
}

/// Build a SET OF in DER canonical order.
///
/// Elements are sorted by their encodings as unsigned octet strings.
/// Duplicates are kept.
pub fn build_set_of(mut items: Vec<Vec<u8>>) -> Vec<u8> {
    items.sort_unstable();
    build_tlv(tag::SET, &items.concat())
}

/// Encode a signed integer with minimal two's-complement content octets
pub fn build_integer(value: i64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let next_high_bit = bytes[start + 1] & 0x80;
        let redundant = (bytes[start] == 0x00 && next_high_bit == 0)
            || (bytes[start] == 0xFF && next_high_bit != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    build_tlv(tag::INTEGER, &bytes[start..])
}

pub fn build_octet_string(content: &[u8]) -> Vec<u8> {
    build_tlv(tag::OCTET_STRING, content)
}

pub fn build_null() -> Vec<u8> {
    vec![tag::NULL, 0x00]
}

/// Encode an OBJECT IDENTIFIER from its arcs
pub fn build_oid(arcs: &[u32]) -> Vec<u8> {
    let (first, rest) = match arcs {
        [a, b, rest @ ..] => (u64::from(*a) * 40 + u64::from(*b), rest),
        [a] => (u64::from(*a) * 40, &[][..]),
        [] => (0, &[][..]),
    };

    let mut body = Vec::with_capacity(arcs.len() * 2);
    push_base128(&mut body, first);
    for &arc in rest {
        push_base128(&mut body, u64::from(arc));
    }
    build_tlv(tag::OID, &body)
}

fn push_base128(out: &mut Vec<u8>, mut value: u64) {
    let mut chunk = [0u8; 10];
    let mut start = chunk.len();
    loop {
        start -= 1;
        chunk[start] = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            break;
        }
    }
    let last = chunk.len() - 1;
    for (i, byte) in chunk.iter().enumerate().skip(start) {
        out.push(if i < last { byte | 0x80 } else { *byte });
    }
}

/// Constructed context-specific tag (`[n]` IMPLICIT over a constructed type)
pub fn build_context_specific(tag_number: u8, content: &[u8]) -> Vec<u8> {
    build_tlv(tag::CONTEXT_0 | (tag_number & 0x1F), content)
}

/// UTCTime from an already formatted `YYMMDDHHMMSSZ` string
pub fn build_utc_time(formatted: &str) -> Vec<u8> {
    build_tlv(tag::UTC_TIME, formatted.as_bytes())
}

/// AlgorithmIdentifier with absent or NULL parameters
pub fn build_algorithm_identifier(oid: &[u32], null_params: bool) -> Vec<u8> {
    let oid_encoded = build_oid(oid);
    if null_params {
        build_sequence(&[&oid_encoded, &build_null()])
    } else {
        build_sequence(&[&oid_encoded])
    }
}

/// Dotted-decimal rendering of OID arcs
pub fn oid_to_string(arcs: &[u32]) -> String {
    arcs.iter()
        .map(|arc| arc.to_string())
        .collect::<Vec<_>>()
        .join(".")
}

// === Decoding ===

/// A parsed tag-length-value triple borrowing from the input
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub content: &'a [u8],
    /// Header plus content length
    pub encoded_len: usize,
}

/// Parse one TLV from the front of `data`, returning it and the remainder
pub fn parse_tlv(data: &[u8]) -> Result<(Tlv<'_>, &[u8]), DerError> {
    let (&tag, after_tag) = data.split_first().ok_or(DerError::Truncated)?;
    if tag & 0x1F == 0x1F {
        return Err(DerError::UnsupportedTag(tag));
    }

    let (len, len_octets) = parse_length(after_tag)?;
    let header_len = 1 + len_octets;
    let total = header_len.checked_add(len).ok_or(DerError::UnsupportedLength)?;
    if data.len() < total {
        return Err(DerError::Truncated);
    }

    let tlv = Tlv {
        tag,
        content: &data[header_len..total],
        encoded_len: total,
    };
    Ok((tlv, &data[total..]))
}

fn parse_length(data: &[u8]) -> Result<(usize, usize), DerError> {
    let (&first, rest) = data.split_first().ok_or(DerError::Truncated)?;
    if first < 0x80 {
        return Ok((first as usize, 1));
    }

    let count = (first & 0x7F) as usize;
    if count == 0 || count > 4 {
        return Err(DerError::UnsupportedLength);
    }
    if rest.len() < count {
        return Err(DerError::Truncated);
    }

    let len = rest[..count]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((len, 1 + count))
}

/// Parse a TLV and require a specific tag, returning its content and the remainder
pub fn expect_tlv(data: &[u8], expected: u8) -> Result<(&[u8], &[u8]), DerError> {
    let (tlv, rest) = parse_tlv(data)?;
    if tlv.tag != expected {
        return Err(DerError::UnexpectedTag {
            expected,
            found: tlv.tag,
        });
    }
    Ok((tlv.content, rest))
}

/// Total encoded length of the TLV at the front of `data`.
///
/// Used to strip trailing padding after a DER value.
pub fn encoded_len(data: &[u8]) -> Result<usize, DerError> {
    parse_tlv(data).map(|(tlv, _)| tlv.encoded_len)
}

/// Decode INTEGER content octets into an `i64`
pub fn parse_integer(content: &[u8]) -> Result<i64, DerError> {
    if content.is_empty() || content.len() > 8 {
        return Err(DerError::InvalidInteger);
    }
    let initial: i64 = if content[0] & 0x80 != 0 { -1 } else { 0 };
    Ok(content
        .iter()
        .fold(initial, |acc, &b| (acc << 8) | i64::from(b)))
}

/// Read a complete INTEGER TLV from the front of `data`
pub fn read_integer(data: &[u8]) -> Result<(i64, &[u8]), DerError> {
    let (content, rest) = expect_tlv(data, tag::INTEGER)?;
    Ok((parse_integer(content)?, rest))
}

/// Decode OBJECT IDENTIFIER content octets into arcs
pub fn parse_oid(content: &[u8]) -> Result<Vec<u32>, DerError> {
    if content.is_empty() || content[content.len() - 1] & 0x80 != 0 {
        return Err(DerError::InvalidOid);
    }

    let mut values = Vec::new();
    let mut current: u64 = 0;
    for &byte in content {
        if current > (u64::MAX >> 7) {
            return Err(DerError::InvalidOid);
        }
        current = (current << 7) | u64::from(byte & 0x7F);
        if byte & 0x80 == 0 {
            values.push(current);
            current = 0;
        }
    }

    let mut arcs = Vec::with_capacity(values.len() + 1);
    let first = values[0];
    let (a, b) = if first < 80 {
        (first / 40, first % 40)
    } else {
        (2, first - 80)
    };
    arcs.push(a as u32);
    arcs.push(u32::try_from(b).map_err(|_| DerError::InvalidOid)?);
    for value in &values[1..] {
        arcs.push(u32::try_from(*value).map_err(|_| DerError::InvalidOid)?);
    }
    Ok(arcs)
}

/// Read a complete OBJECT IDENTIFIER TLV from the front of `data`
pub fn read_oid(data: &[u8]) -> Result<(Vec<u32>, &[u8]), DerError> {
    let (content, rest) = expect_tlv(data, tag::OID)?;
    Ok((parse_oid(content)?, rest))
}

/// Split the content of a constructed value into its element encodings
pub fn split_elements(mut content: &[u8]) -> Result<Vec<Tlv<'_>>, DerError> {
    let mut elements = Vec::new();
    while !content.is_empty() {
        let (tlv, rest) = parse_tlv(content)?;
        elements.push(tlv);
        content = rest;
    }
    Ok(elements)
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: INTEGER encoding round-trips for every i64
        #[test]
        fn integer_roundtrip(value in any::<i64>()) {
            let encoded = build_integer(value);
            let (decoded, rest) = read_integer(&encoded).unwrap();
            prop_assert_eq!(decoded, value);
            prop_assert!(rest.is_empty());
        }

        /// Property: INTEGER content never carries a redundant leading octet
        #[test]
        fn integer_is_minimal(value in any::<i64>()) {
            let encoded = build_integer(value);
            let content = &encoded[2..];
            if content.len() > 1 {
                let redundant = (content[0] == 0x00 && content[1] & 0x80 == 0)
                    || (content[0] == 0xFF && content[1] & 0x80 != 0);
                prop_assert!(!redundant);
            }
        }

        /// Property: OIDs round-trip through their DER form
        #[test]
        fn oid_roundtrip(
            first in 0u32..2,
            second in 0u32..40,
            tail in prop::collection::vec(any::<u32>(), 0..8),
        ) {
            let mut arcs = vec![first, second];
            arcs.extend(tail);
            let encoded = build_oid(&arcs);
            let (decoded, _) = read_oid(&encoded).unwrap();
            prop_assert_eq!(decoded, arcs);
        }

        /// Property: any content length is recovered by the parser
        #[test]
        fn tlv_length_roundtrip(len in 0usize..5000) {
            let content = vec![0x5Au8; len];
            let encoded = build_tlv(tag::OCTET_STRING, &content);
            let (tlv, rest) = parse_tlv(&encoded).unwrap();
            prop_assert_eq!(tlv.content.len(), len);
            prop_assert_eq!(tlv.encoded_len, encoded.len());
            prop_assert!(rest.is_empty());
        }

        /// Property: SET OF output does not depend on input order
        #[test]
        fn set_of_is_order_independent(values in prop::collection::vec(any::<i64>(), 0..20)) {
            let forward: Vec<Vec<u8>> = values.iter().map(|v| build_integer(*v)).collect();
            let mut backward = forward.clone();
            backward.reverse();
            prop_assert_eq!(build_set_of(forward), build_set_of(backward));
        }
    }
}
