//! Input normalization
//!
//! Both accepted input shapes, a full capture session or a bare list of
//! pre-quantized points, collapse into one [`NormalizedRecord`] before any
//! bytes are produced.

use serde::{Deserialize, Serialize};
use shared_types::der::{build_integer, build_sequence};
use shared_types::{CaptureSession, PointSample, RawPoint, Resolution};

use crate::error::BdbError;

/// Quantization scale applied to pen pressure in `[0, 1]`
pub const PRESSURE_SCALE: f32 = 255.0;

/// One `(x, y, t, p)` tuple as stored in the data block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SampleTuple {
    pub x: i64,
    pub y: i64,
    pub t: i64,
    pub p: i64,
}

impl SampleTuple {
    /// Coordinates truncate toward zero, pressure rounds to the 0..=255 scale
    pub fn from_sample(sample: &PointSample) -> Self {
        Self {
            x: sample.x as i64,
            y: sample.y as i64,
            t: sample.timestamp_millis,
            p: (sample.pressure * PRESSURE_SCALE).round() as i64,
        }
    }

    pub(crate) fn to_der(self) -> Vec<u8> {
        build_sequence(&[
            &build_integer(self.x),
            &build_integer(self.y),
            &build_integer(self.t),
            &build_integer(self.p),
        ])
    }
}

impl From<RawPoint> for SampleTuple {
    fn from(point: RawPoint) -> Self {
        Self {
            x: point.x,
            y: point.y,
            t: point.t,
            p: point.p,
        }
    }
}

/// The two equivalent shapes a caller may hand to the encoder
#[derive(Debug, Clone, PartialEq)]
pub enum BiometricInput {
    Session(CaptureSession),
    Points {
        resolution: Option<Resolution>,
        points: Vec<RawPoint>,
    },
}

impl From<CaptureSession> for BiometricInput {
    fn from(session: CaptureSession) -> Self {
        Self::Session(session)
    }
}

impl BiometricInput {
    pub fn points(points: Vec<RawPoint>) -> Self {
        Self::Points {
            resolution: None,
            points,
        }
    }

    /// Collapse into the canonical record, filling in `default_resolution`
    /// for points-only input that carries none.
    pub fn normalize(self, default_resolution: Resolution) -> Result<NormalizedRecord, BdbError> {
        match self {
            Self::Session(session) => Ok(NormalizedRecord::from_session(&session)),
            Self::Points { resolution, points } => {
                let resolution = resolution.unwrap_or(default_resolution);
                resolution.validate()?;
                Ok(NormalizedRecord {
                    resolution,
                    samples: points.into_iter().map(SampleTuple::from).collect(),
                })
            }
        }
    }
}

/// Canonical encoder input: a resolution and the flattened sample tuples
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub resolution: Resolution,
    pub samples: Vec<SampleTuple>,
}

impl NormalizedRecord {
    pub fn from_session(session: &CaptureSession) -> Self {
        Self {
            resolution: session.resolution(),
            samples: session.samples().map(SampleTuple::from_sample).collect(),
        }
    }

    pub fn count(&self) -> usize {
        self.samples.len()
    }
}
