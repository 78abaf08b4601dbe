//! Shared PDF handling utilities
//!
//! This crate applies detached signatures to PDFs as append-only incremental
//! updates and reads embedded signatures back out.
//!
//! Signing walks a typestate machine:
//!
//! ```text
//! Unsigned --reserve--> PlaceholderReserved --attach--> SignatureComputed --finalize--> SignedDocument
//! ```
//!
//! The original bytes are never rewritten; every change lives in a new
//! section appended after them.

pub mod byte_range;
pub mod error;
pub mod incremental;
pub mod inspect;
pub mod writer;

pub use byte_range::ByteRange;
pub use error::PdfSignError;
pub use incremental::{
    IncrementalDocumentSigner, PlaceholderReserved, SignatureComputed, SignatureMetadata,
    SignedDocument, Unsigned, DEFAULT_PLACEHOLDER_SIZE,
};
pub use inspect::{find_signatures, EmbeddedSignature};
