use serde::Serialize;
use shared_types::der::{
    expect_tlv, oid_to_string, read_integer, read_oid, split_elements, tag, DerError,
};
use shared_types::Resolution;

use crate::error::BdbError;
use crate::normalize::SampleTuple;
use crate::{FORMAT_OWNER_OID, FORMAT_VERSION};

/// Contents of a parsed biometric data block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedBdb {
    pub format_owner: String,
    pub format_version: i64,
    pub resolution: Resolution,
    pub count: i64,
    /// Tuples in encoded (canonical) order, not capture order
    pub samples: Vec<SampleTuple>,
}

/// Parse and validate a biometric data block
pub fn decode(bytes: &[u8]) -> Result<DecodedBdb, BdbError> {
    let (body, trailing) = expect_tlv(bytes, tag::SEQUENCE)?;
    ensure_consumed(trailing)?;

    let (header, body) = expect_tlv(body, tag::SEQUENCE)?;
    let (owner, header) = read_oid(header)?;
    let (format_version, header) = read_integer(header)?;
    ensure_consumed(header)?;
    if owner != FORMAT_OWNER_OID {
        return Err(BdbError::InvalidBlock(format!(
            "unexpected format owner {}",
            oid_to_string(&owner)
        )));
    }
    if format_version != FORMAT_VERSION {
        return Err(BdbError::InvalidBlock(format!(
            "unsupported format version {format_version}"
        )));
    }

    let (resolution, body) = expect_tlv(body, tag::SEQUENCE)?;
    let (horz, resolution) = read_integer(resolution)?;
    let (vert, resolution) = read_integer(resolution)?;
    ensure_consumed(resolution)?;
    let resolution = Resolution {
        horz: dimension(horz)?,
        vert: dimension(vert)?,
    };

    let (count, body) = read_integer(body)?;
    let (set, body) = expect_tlv(body, tag::SET)?;
    ensure_consumed(body)?;

    let samples = split_elements(set)?
        .into_iter()
        .map(|element| {
            if element.tag != tag::SEQUENCE {
                return Err(BdbError::from(DerError::UnexpectedTag {
                    expected: tag::SEQUENCE,
                    found: element.tag,
                }));
            }
            let (x, rest) = read_integer(element.content)?;
            let (y, rest) = read_integer(rest)?;
            let (t, rest) = read_integer(rest)?;
            let (p, rest) = read_integer(rest)?;
            ensure_consumed(rest)?;
            Ok(SampleTuple { x, y, t, p })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if usize::try_from(count).ok() != Some(samples.len()) {
        return Err(BdbError::InvalidBlock(format!(
            "count field {count} does not match {} samples",
            samples.len()
        )));
    }

    Ok(DecodedBdb {
        format_owner: oid_to_string(&owner),
        format_version,
        resolution,
        count,
        samples,
    })
}

fn ensure_consumed(rest: &[u8]) -> Result<(), BdbError> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(DerError::TrailingData(rest.len()).into())
    }
}

fn dimension(value: i64) -> Result<u32, BdbError> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| BdbError::InvalidBlock(format!("invalid resolution value {value}")))
}
