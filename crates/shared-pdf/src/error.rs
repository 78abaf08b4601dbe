use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PdfSignError {
    #[error("Failed to parse PDF: {0}")]
    Parse(String),

    #[error("Encrypted documents cannot be signed")]
    Encrypted,

    #[error("Invalid document structure: {0}")]
    InvalidDocument(String),

    #[error("Page {page} not found (document has {count} pages)")]
    PageNotFound { page: u32, count: usize },

    #[error("Signature field '{0}' already exists")]
    FieldExists(String),

    #[error("Signature too large: {required} bytes needed, {available} bytes reserved")]
    SignatureTooLarge { required: usize, available: usize },

    #[error("Invalid byte range: {0}")]
    InvalidByteRange(String),
}
