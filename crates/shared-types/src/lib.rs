//! Types shared across the signing workspace
//!
//! Holds the pen-capture data model handed over by the capture surface and
//! the small DER toolkit used by the biometric encoder and the CMS builder.

pub mod capture;
pub mod der;
pub mod types;

pub use capture::CaptureRecorder;
pub use types::{CaptureSession, PointSample, RawPoint, Resolution, Stroke, ValidationError};
