use std::fmt;

use bdb_core::BdbError;
use serde::Serialize;
use shared_crypto::CryptoError;
use shared_pdf::PdfSignError;
use thiserror::Error;

pub type SigningResult<T> = Result<T, SigningError>;

/// Pipeline step an error was raised in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Load,
    EncodeBiometric,
    BuildAttributes,
    ReservePlaceholder,
    Digest,
    Sign,
    Patch,
    Persist,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Load => "load",
            Self::EncodeBiometric => "encode biometric",
            Self::BuildAttributes => "build attributes",
            Self::ReservePlaceholder => "reserve placeholder",
            Self::Digest => "digest",
            Self::Sign => "sign",
            Self::Patch => "patch",
            Self::Persist => "persist",
        };
        f.write_str(label)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Signing unavailable: {0}")]
    SigningUnavailable(String),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Signature needs {required} bytes but the placeholder holds {available}")]
    SignatureTooLarge { required: usize, available: usize },

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<BdbError> for ErrorKind {
    fn from(err: BdbError) -> Self {
        Self::MalformedInput(err.to_string())
    }
}

impl From<CryptoError> for ErrorKind {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::Certificate(msg) => Self::Certificate(msg),
            CryptoError::InvalidAttributes(_) => Self::MalformedInput(err.to_string()),
            CryptoError::MalformedCms(_) => Self::InvalidDocument(err.to_string()),
            CryptoError::SigningUnavailable(msg) => Self::SigningUnavailable(msg),
            CryptoError::AlgorithmMismatch { .. } | CryptoError::InvalidKey(_) => {
                Self::SigningUnavailable(err.to_string())
            }
        }
    }
}

impl From<PdfSignError> for ErrorKind {
    fn from(err: PdfSignError) -> Self {
        match err {
            PdfSignError::SignatureTooLarge {
                required,
                available,
            } => Self::SignatureTooLarge {
                required,
                available,
            },
            other => Self::InvalidDocument(other.to_string()),
        }
    }
}

impl From<std::io::Error> for ErrorKind {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// A failed signing operation: what went wrong and where
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage} failed: {kind}")]
pub struct SigningError {
    pub stage: Stage,
    pub kind: ErrorKind,
}

impl SigningError {
    pub fn new(stage: Stage, kind: ErrorKind) -> Self {
        Self { stage, kind }
    }

    /// Bytes the signature needed, when the placeholder was too small
    pub fn required_placeholder(&self) -> Option<usize> {
        match self.kind {
            ErrorKind::SignatureTooLarge { required, .. } => Some(required),
            _ => None,
        }
    }
}

/// Tag a component error with the stage it was raised in
pub trait StageContext<T> {
    fn at_stage(self, stage: Stage) -> SigningResult<T>;
}

impl<T, E: Into<ErrorKind>> StageContext<T> for Result<T, E> {
    fn at_stage(self, stage: Stage) -> SigningResult<T> {
        self.map_err(|err| SigningError::new(stage, err.into()))
    }
}
