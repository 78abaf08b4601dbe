//! Biometric data block (BDB) encoding
//!
//! Converts a handwritten-signature capture into the DER record defined by
//! ISO/IEC 19794-7:
//!
//! ```text
//! BDB ::= SEQUENCE {
//!     header      SEQUENCE { formatOwner OBJECT IDENTIFIER, formatVersion INTEGER },
//!     resolution  SEQUENCE { horz INTEGER, vert INTEGER },
//!     count       INTEGER,
//!     samples     SET OF SEQUENCE { x INTEGER, y INTEGER, t INTEGER, p INTEGER }
//! }
//! ```
//!
//! Samples from every stroke are flattened into one set; stroke boundaries
//! are not preserved.

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod json;
pub mod normalize;

pub use decoder::{decode, DecodedBdb};
pub use encoder::BiometricRecordEncoder;
pub use error::BdbError;
pub use normalize::{BiometricInput, NormalizedRecord, SampleTuple};

/// Format owner registered for ISO/IEC JTC 1 SC 37 biometric data
pub const FORMAT_OWNER_OID: &[u32] = &[1, 3, 36, 3, 2, 1];

/// Format type version written into every header
pub const FORMAT_VERSION: i64 = 2;
