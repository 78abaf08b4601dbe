use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default capture resolution in dots per inch
pub const DEFAULT_DPI: u32 = 600;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid resolution {horz}x{vert}: both axes must be positive")]
    InvalidResolution { horz: u32, vert: u32 },

    #[error("Stroke {stroke} has no samples")]
    EmptyStroke { stroke: usize },

    #[error("Stroke {stroke}, sample {index}: field '{field}' {reason}")]
    InvalidSample {
        stroke: usize,
        index: usize,
        field: &'static str,
        reason: String,
    },
}

/// Capture resolution of the drawing surface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Resolution {
    pub horz: u32,
    pub vert: u32,
}

impl Resolution {
    pub fn new(horz: u32, vert: u32) -> Result<Self, ValidationError> {
        let resolution = Self { horz, vert };
        resolution.validate()?;
        Ok(resolution)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.horz == 0 || self.vert == 0 {
            return Err(ValidationError::InvalidResolution {
                horz: self.horz,
                vert: self.vert,
            });
        }
        Ok(())
    }
}

impl Default for Resolution {
    fn default() -> Self {
        Self {
            horz: DEFAULT_DPI,
            vert: DEFAULT_DPI,
        }
    }
}

/// One pen sample as recorded by the capture surface
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointSample {
    pub x: f32,
    pub y: f32,
    /// Milliseconds since the capture surface started recording
    #[serde(rename = "timestamp", alias = "timestampMillis")]
    pub timestamp_millis: i64,
    /// Normalized pen pressure in `[0, 1]`
    pub pressure: f32,
    /// Pen speed in surface units per millisecond
    #[serde(default)]
    pub velocity: f32,
}

impl PointSample {
    /// Check one sample, reporting the offending field
    pub fn validate(&self, stroke: usize, index: usize) -> Result<(), ValidationError> {
        let invalid = |field: &'static str, reason: &str| ValidationError::InvalidSample {
            stroke,
            index,
            field,
            reason: reason.to_string(),
        };

        if !self.x.is_finite() {
            return Err(invalid("x", "must be a finite number"));
        }
        if !self.y.is_finite() {
            return Err(invalid("y", "must be a finite number"));
        }
        if self.timestamp_millis < 0 {
            return Err(invalid("timestamp", "must not be negative"));
        }
        if !(0.0..=1.0).contains(&self.pressure) {
            return Err(invalid("pressure", "must be within [0, 1]"));
        }
        if !self.velocity.is_finite() || self.velocity < 0.0 {
            return Err(invalid("velocity", "must be a finite, non-negative number"));
        }
        Ok(())
    }
}

/// An ordered, non-empty run of samples between pen-down and pen-up
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<PointSample>", into = "Vec<PointSample>")]
pub struct Stroke(Vec<PointSample>);

impl Stroke {
    pub fn new(samples: Vec<PointSample>) -> Result<Self, ValidationError> {
        if samples.is_empty() {
            return Err(ValidationError::EmptyStroke { stroke: 0 });
        }
        Ok(Self(samples))
    }

    pub fn samples(&self) -> &[PointSample] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl TryFrom<Vec<PointSample>> for Stroke {
    type Error = ValidationError;

    fn try_from(samples: Vec<PointSample>) -> Result<Self, Self::Error> {
        Self::new(samples)
    }
}

impl From<Stroke> for Vec<PointSample> {
    fn from(stroke: Stroke) -> Self {
        stroke.0
    }
}

/// A complete handwritten-signature capture
///
/// Immutable once built; every stroke and sample has been validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "UncheckedSession")]
pub struct CaptureSession {
    resolution: Resolution,
    strokes: Vec<Stroke>,
}

#[derive(Deserialize)]
struct UncheckedSession {
    #[serde(default)]
    resolution: Resolution,
    strokes: Vec<Stroke>,
}

impl TryFrom<UncheckedSession> for CaptureSession {
    type Error = ValidationError;

    fn try_from(raw: UncheckedSession) -> Result<Self, Self::Error> {
        Self::new(raw.resolution, raw.strokes)
    }
}

impl CaptureSession {
    pub fn new(resolution: Resolution, strokes: Vec<Stroke>) -> Result<Self, ValidationError> {
        resolution.validate()?;
        for (stroke_index, stroke) in strokes.iter().enumerate() {
            if stroke.is_empty() {
                return Err(ValidationError::EmptyStroke {
                    stroke: stroke_index,
                });
            }
            for (index, sample) in stroke.samples().iter().enumerate() {
                sample.validate(stroke_index, index)?;
            }
        }
        Ok(Self {
            resolution,
            strokes,
        })
    }

    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    pub fn strokes(&self) -> &[Stroke] {
        &self.strokes
    }

    /// All samples in stroke order, stroke boundaries dropped
    pub fn samples(&self) -> impl Iterator<Item = &PointSample> {
        self.strokes.iter().flat_map(|stroke| stroke.samples())
    }

    pub fn sample_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }
}

/// A pre-quantized `(x, y, t, p)` tuple as supplied by points-only callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RawPoint {
    pub x: i64,
    pub y: i64,
    pub t: i64,
    pub p: i64,
}
