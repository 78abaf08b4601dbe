//! Signature byte ranges
//!
//! A PDF signature covers `[0, gap_start) ∪ [gap_end, gap_end + tail_len)`,
//! where the gap is the `/Contents` hex string including its delimiters.

use std::ops::Range;

use serde::Serialize;
use shared_crypto::DigestAlgorithm;

use crate::error::PdfSignError;

/// Width reserved for each patched `/ByteRange` number
pub const BYTE_RANGE_DIGITS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ByteRange {
    gap_start: usize,
    gap_end: usize,
    tail_len: usize,
}

impl ByteRange {
    pub fn new(gap_start: usize, gap_end: usize, tail_len: usize) -> Result<Self, PdfSignError> {
        if gap_start == 0 || gap_end <= gap_start {
            return Err(PdfSignError::InvalidByteRange(format!(
                "gap {gap_start}..{gap_end} is empty or starts the file"
            )));
        }
        Ok(Self {
            gap_start,
            gap_end,
            tail_len,
        })
    }

    /// Build from the four `/ByteRange` integers
    pub fn from_array(values: [i64; 4]) -> Result<Self, PdfSignError> {
        let [start, first_len, second_start, second_len] = values;
        if start != 0 {
            return Err(PdfSignError::InvalidByteRange(format!(
                "first range starts at {start}, not 0"
            )));
        }
        let to_usize = |v: i64| {
            usize::try_from(v)
                .map_err(|_| PdfSignError::InvalidByteRange(format!("negative offset {v}")))
        };
        Self::new(
            to_usize(first_len)?,
            to_usize(second_start)?,
            to_usize(second_len)?,
        )
    }

    pub fn to_array(&self) -> [u64; 4] {
        [
            0,
            self.gap_start as u64,
            self.gap_end as u64,
            self.tail_len as u64,
        ]
    }

    /// The excluded span, delimiters included
    pub fn gap(&self) -> Range<usize> {
        self.gap_start..self.gap_end
    }

    /// Offset one past the last covered byte
    pub fn end(&self) -> usize {
        self.gap_end + self.tail_len
    }

    /// Number of bytes fed to the digest
    pub fn covered_len(&self) -> usize {
        self.gap_start + self.tail_len
    }

    /// True when the range reaches the end of a file of `len` bytes
    pub fn covers_through(&self, len: usize) -> bool {
        self.end() == len
    }

    /// The two covered slices of `bytes`
    pub fn parts<'a>(&self, bytes: &'a [u8]) -> Result<[&'a [u8]; 2], PdfSignError> {
        if self.end() > bytes.len() {
            return Err(PdfSignError::InvalidByteRange(format!(
                "range ends at {} but the file has {} bytes",
                self.end(),
                bytes.len()
            )));
        }
        Ok([&bytes[..self.gap_start], &bytes[self.gap_end..self.end()]])
    }

    /// Concatenated covered content
    pub fn signed_content(&self, bytes: &[u8]) -> Result<Vec<u8>, PdfSignError> {
        Ok(self.parts(bytes)?.concat())
    }

    pub fn digest(&self, bytes: &[u8], algorithm: DigestAlgorithm) -> Result<Vec<u8>, PdfSignError> {
        Ok(algorithm.digest_parts(&self.parts(bytes)?))
    }

    /// `[0 a b c]` with each number space-padded to a fixed width so the
    /// rendering always fits the placeholder written at reservation time
    pub fn render_padded(&self) -> String {
        let [a, b, c, d] = self.to_array();
        format!(
            "[{a} {b:<w$} {c:<w$} {d:<w$}]",
            w = BYTE_RANGE_DIGITS
        )
    }

    /// The placeholder written before offsets are known; same width as
    /// [`ByteRange::render_padded`]
    pub fn placeholder() -> String {
        let nines = "9".repeat(BYTE_RANGE_DIGITS);
        format!("[0 {nines} {nines} {nines}]")
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Property: padded rendering never exceeds the placeholder width
        #[test]
        fn padded_fits_placeholder(a in 1usize..9_999_999_999, gap in 1usize..100_000, tail in 0usize..9_999_999_999) {
            let b = a.saturating_add(gap).min(9_999_999_999);
            prop_assume!(b > a);
            let range = ByteRange::new(a, b, tail).unwrap();
            prop_assert_eq!(range.render_padded().len(), ByteRange::placeholder().len());
        }

        /// Property: covered content never includes a gap byte
        #[test]
        fn parts_exclude_gap(head in 1usize..64, gap in 2usize..64, tail in 0usize..64) {
            let mut bytes = vec![b'a'; head];
            bytes.extend(vec![b'#'; gap]);
            bytes.extend(vec![b'z'; tail]);
            let range = ByteRange::new(head, head + gap, tail).unwrap();
            let content = range.signed_content(&bytes).unwrap();
            prop_assert_eq!(content.len(), head + tail);
            prop_assert!(!content.contains(&b'#'));
        }
    }
}
