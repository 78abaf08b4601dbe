use shared_types::der::DerError;
use shared_types::ValidationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BdbError {
    #[error("Malformed biometric input: field '{field}' {reason}")]
    MalformedInput { field: String, reason: String },

    #[error("Invalid biometric data block: {0}")]
    InvalidBlock(String),
}

impl BdbError {
    pub fn malformed(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl From<ValidationError> for BdbError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::InvalidResolution { .. } => {
                Self::malformed("resolution", "must have positive horz and vert")
            }
            ValidationError::EmptyStroke { stroke } => {
                Self::malformed(format!("strokes[{stroke}]"), "has no samples")
            }
            ValidationError::InvalidSample {
                stroke,
                index,
                field,
                reason,
            } => Self::malformed(format!("strokes[{stroke}][{index}].{field}"), reason),
        }
    }
}

impl From<DerError> for BdbError {
    fn from(err: DerError) -> Self {
        Self::InvalidBlock(err.to_string())
    }
}
