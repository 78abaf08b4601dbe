//! CMS signed attributes
//!
//! The biometric data block rides inside the signature as an authenticated
//! attribute, so any change to it invalidates the signature value.

use chrono::{DateTime, Datelike, Utc};
use shared_types::der::{
    build_oid, build_octet_string, build_sequence, build_set_of, build_tlv, tag,
};

/// OID for content-type attribute: 1.2.840.113549.1.9.3
pub const OID_CONTENT_TYPE: &[u32] = &[1, 2, 840, 113549, 1, 9, 3];

/// OID for message-digest attribute: 1.2.840.113549.1.9.4
pub const OID_MESSAGE_DIGEST: &[u32] = &[1, 2, 840, 113549, 1, 9, 4];

/// OID for signing-time attribute: 1.2.840.113549.1.9.5
pub const OID_SIGNING_TIME: &[u32] = &[1, 2, 840, 113549, 1, 9, 5];

/// OID for id-data (PKCS#7): 1.2.840.113549.1.7.1
pub const OID_DATA: &[u32] = &[1, 2, 840, 113549, 1, 7, 1];

/// Private-enterprise arc carrying the ISO/IEC 19794-7 biometric data block.
///
/// Consumers locate the biometric payload by this exact value.
pub const BIOMETRIC_ATTRIBUTE_OID: &[u32] = &[1, 3, 6, 1, 4, 1, 59327, 1, 1];

/// One attribute: an identifier and a set of DER-encoded values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedAttribute {
    oid: Vec<u32>,
    values: Vec<Vec<u8>>,
}

impl SignedAttribute {
    /// `values` must each be a complete DER encoding
    pub fn new(oid: &[u32], values: Vec<Vec<u8>>) -> Self {
        Self {
            oid: oid.to_vec(),
            values,
        }
    }

    pub fn oid(&self) -> &[u32] {
        &self.oid
    }

    pub fn values(&self) -> &[Vec<u8>] {
        &self.values
    }

    pub fn is(&self, oid: &[u32]) -> bool {
        self.oid == oid
    }

    /// `Attribute ::= SEQUENCE { attrType OID, attrValues SET OF ANY }`
    pub fn to_der(&self) -> Vec<u8> {
        build_sequence(&[&build_oid(&self.oid), &build_set_of(self.values.clone())])
    }

    pub fn content_type(content_type: &[u32]) -> Self {
        Self::new(OID_CONTENT_TYPE, vec![build_oid(content_type)])
    }

    pub fn message_digest(digest: &[u8]) -> Self {
        Self::new(OID_MESSAGE_DIGEST, vec![build_octet_string(digest)])
    }

    /// UTCTime through 2049, GeneralizedTime afterwards
    pub fn signing_time(at: DateTime<Utc>) -> Self {
        let value = if (1950..2050).contains(&at.year()) {
            build_tlv(tag::UTC_TIME, at.format("%y%m%d%H%M%SZ").to_string().as_bytes())
        } else {
            build_tlv(
                tag::GENERALIZED_TIME,
                at.format("%Y%m%d%H%M%SZ").to_string().as_bytes(),
            )
        };
        Self::new(OID_SIGNING_TIME, vec![value])
    }

    pub fn biometric(bdb: &[u8]) -> Self {
        Self::new(BIOMETRIC_ATTRIBUTE_OID, vec![build_octet_string(bdb)])
    }
}

/// Builds the attributes a caller contributes to a signature
#[derive(Debug, Clone, Default)]
pub struct SignedAttributeBuilder {
    extra: Vec<SignedAttribute>,
}

impl SignedAttributeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a caller-defined attribute alongside the biometric one
    pub fn with_attribute(mut self, attribute: SignedAttribute) -> Self {
        self.extra.push(attribute);
        self
    }

    /// Wrap the biometric data block as its signed attribute
    pub fn build(&self, bdb: &[u8]) -> SignedAttribute {
        SignedAttribute::biometric(bdb)
    }

    /// The biometric attribute followed by any caller-defined ones
    pub fn build_set(&self, bdb: &[u8]) -> Vec<SignedAttribute> {
        let mut attributes = Vec::with_capacity(1 + self.extra.len());
        attributes.push(self.build(bdb));
        attributes.extend(self.extra.iter().cloned());
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use shared_types::der::{expect_tlv, read_oid};

    #[test]
    fn test_biometric_attribute_layout() {
        let bdb = vec![0x30, 0x00];
        let attribute = SignedAttributeBuilder::new().build(&bdb);
        let der = attribute.to_der();

        let (body, rest) = expect_tlv(&der, tag::SEQUENCE).unwrap();
        assert!(rest.is_empty());
        let (oid, body) = read_oid(body).unwrap();
        assert_eq!(oid, BIOMETRIC_ATTRIBUTE_OID);
        let (values, _) = expect_tlv(body, tag::SET).unwrap();
        let (octets, _) = expect_tlv(values, tag::OCTET_STRING).unwrap();
        assert_eq!(octets, bdb.as_slice());
    }

    #[test]
    fn test_signing_time_encodings() {
        let t = Utc.with_ymd_and_hms(2024, 3, 5, 7, 8, 9).unwrap();
        let attribute = SignedAttribute::signing_time(t);
        assert_eq!(attribute.values()[0], b"\x17\x0d240305070809Z".to_vec());

        let far = Utc.with_ymd_and_hms(2051, 1, 2, 3, 4, 5).unwrap();
        let attribute = SignedAttribute::signing_time(far);
        assert_eq!(attribute.values()[0], b"\x18\x0f20510102030405Z".to_vec());
    }

    #[test]
    fn test_message_digest_value() {
        let attribute = SignedAttribute::message_digest(&[1, 2, 3]);
        assert!(attribute.is(OID_MESSAGE_DIGEST));
        assert_eq!(attribute.values()[0], vec![0x04, 0x03, 1, 2, 3]);
    }

    #[test]
    fn test_build_set_keeps_extras() {
        let extra = SignedAttribute::new(&[1, 2, 3, 4], vec![vec![0x05, 0x00]]);
        let set = SignedAttributeBuilder::new()
            .with_attribute(extra.clone())
            .build_set(b"bdb");
        assert_eq!(set.len(), 2);
        assert!(set[0].is(BIOMETRIC_ATTRIBUTE_OID));
        assert_eq!(set[1], extra);
    }
}
