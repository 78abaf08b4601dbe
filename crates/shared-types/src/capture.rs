//! Stroke recording with inferred pen velocity
//!
//! Capture surfaces report raw pen positions, timestamps and pressure. The
//! recorder groups them into strokes and derives the speed of each sample
//! from its predecessor in the same stroke.

use crate::types::{CaptureSession, PointSample, Resolution, Stroke, ValidationError};

/// Accumulates pen samples into strokes
#[derive(Debug, Default, Clone)]
pub struct CaptureRecorder {
    finished: Vec<Stroke>,
    current: Vec<PointSample>,
}

impl CaptureRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pen down: starts a new stroke, closing any open one
    pub fn begin_stroke(&mut self) {
        self.end_stroke();
    }

    /// Record a pen position. Pressure is clamped into `[0, 1]`.
    pub fn add_point(&mut self, x: f32, y: f32, timestamp_millis: i64, pressure: f32) {
        let velocity = match self.current.last() {
            Some(prev) => {
                let distance = (x - prev.x).hypot(y - prev.y);
                let elapsed = (timestamp_millis - prev.timestamp_millis).max(1) as f32;
                distance / elapsed
            }
            None => 0.0,
        };

        self.current.push(PointSample {
            x,
            y,
            timestamp_millis,
            pressure: pressure.clamp(0.0, 1.0),
            velocity,
        });
    }

    /// Pen up. Empty strokes are discarded.
    pub fn end_stroke(&mut self) {
        let samples = std::mem::take(&mut self.current);
        if let Ok(stroke) = Stroke::new(samples) {
            self.finished.push(stroke);
        }
    }

    pub fn clear(&mut self) {
        self.finished.clear();
        self.current.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.finished.is_empty() && self.current.is_empty()
    }

    pub fn stroke_count(&self) -> usize {
        self.finished.len() + usize::from(!self.current.is_empty())
    }

    /// Close the open stroke and freeze everything into a session
    pub fn finish(mut self, resolution: Resolution) -> Result<CaptureSession, ValidationError> {
        self.end_stroke();
        CaptureSession::new(resolution, self.finished)
    }
}
