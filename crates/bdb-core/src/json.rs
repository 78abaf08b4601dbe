//! JSON front end for the encoder
//!
//! Accepted documents:
//! - `{"resolution": {"horz": H, "vert": V}, "points": [{"x", "y", "t", "p"}, ...]}`
//! - `[{"x", "y", "t", "p"}, ...]` (points only, default resolution)
//! - `{"resolution": ..., "strokes": [[{"x", "y", "timestamp", "pressure", "velocity"}, ...], ...]}`
//! - `[[{"x", "y", "timestamp", "pressure", "velocity"}, ...], ...]` (bare strokes)
//!
//! Fields are read one by one so that errors name the exact offending path.

use serde_json::{Map, Value};
use shared_types::{CaptureSession, PointSample, RawPoint, Resolution, Stroke};

use crate::error::BdbError;
use crate::normalize::BiometricInput;

/// Parse capture JSON into one of the accepted input shapes.
///
/// Bare stroke arrays carry no resolution, so `default_resolution` is applied
/// to them directly.
pub fn parse_input(text: &str, default_resolution: Resolution) -> Result<BiometricInput, BdbError> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| BdbError::malformed("$", format!("is not valid JSON: {e}")))?;

    match value {
        Value::Array(items) => {
            if items.first().map_or(false, Value::is_array) {
                let strokes = parse_strokes(&items, "$")?;
                Ok(BiometricInput::Session(CaptureSession::new(
                    default_resolution,
                    strokes,
                )?))
            } else {
                Ok(BiometricInput::Points {
                    resolution: None,
                    points: parse_points(&items, "$")?,
                })
            }
        }
        Value::Object(map) => {
            let resolution = match map.get("resolution") {
                Some(value) => Some(parse_resolution(value)?),
                None => None,
            };

            if let Some(strokes) = map.get("strokes") {
                let items = strokes
                    .as_array()
                    .ok_or_else(|| BdbError::malformed("strokes", "must be an array"))?;
                let strokes = parse_strokes(items, "strokes")?;
                let session =
                    CaptureSession::new(resolution.unwrap_or(default_resolution), strokes)?;
                Ok(BiometricInput::Session(session))
            } else if let Some(points) = map.get("points") {
                let items = points
                    .as_array()
                    .ok_or_else(|| BdbError::malformed("points", "must be an array"))?;
                Ok(BiometricInput::Points {
                    resolution,
                    points: parse_points(items, "points")?,
                })
            } else {
                Err(BdbError::malformed("$", "must contain 'points' or 'strokes'"))
            }
        }
        _ => Err(BdbError::malformed("$", "must be an object or an array")),
    }
}

fn parse_resolution(value: &Value) -> Result<Resolution, BdbError> {
    let map = value
        .as_object()
        .ok_or_else(|| BdbError::malformed("resolution", "must be an object"))?;
    let horz = positive_dimension(map, "horz")?;
    let vert = positive_dimension(map, "vert")?;
    Ok(Resolution { horz, vert })
}

fn positive_dimension(map: &Map<String, Value>, key: &str) -> Result<u32, BdbError> {
    let path = format!("resolution.{key}");
    let value = integer_field(map, key, &path)?;
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or_else(|| BdbError::malformed(path, "must be a positive integer"))
}

fn parse_points(items: &[Value], path: &str) -> Result<Vec<RawPoint>, BdbError> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let point_path = format!("{path}[{i}]");
            let map = item
                .as_object()
                .ok_or_else(|| BdbError::malformed(point_path.as_str(), "must be an object"))?;
            Ok(RawPoint {
                x: integer_field(map, "x", &format!("{point_path}.x"))?,
                y: integer_field(map, "y", &format!("{point_path}.y"))?,
                t: integer_field(map, "t", &format!("{point_path}.t"))?,
                p: integer_field(map, "p", &format!("{point_path}.p"))?,
            })
        })
        .collect()
}

fn parse_strokes(items: &[Value], path: &str) -> Result<Vec<Stroke>, BdbError> {
    let mut strokes = Vec::with_capacity(items.len());
    for (s, item) in items.iter().enumerate() {
        let stroke_path = format!("{path}[{s}]");
        let samples = item
            .as_array()
            .ok_or_else(|| BdbError::malformed(stroke_path.as_str(), "must be an array"))?;

        let samples = samples
            .iter()
            .enumerate()
            .map(|(i, sample)| parse_sample(sample, &format!("{stroke_path}[{i}]")))
            .collect::<Result<Vec<_>, _>>()?;

        let stroke = Stroke::new(samples)
            .map_err(|_| BdbError::malformed(stroke_path.as_str(), "has no samples"))?;
        strokes.push(stroke);
    }
    Ok(strokes)
}

fn parse_sample(value: &Value, path: &str) -> Result<PointSample, BdbError> {
    let map = value
        .as_object()
        .ok_or_else(|| BdbError::malformed(path, "must be an object"))?;

    let timestamp_key = ["timestamp", "timestampMillis"]
        .into_iter()
        .find(|key| map.contains_key(*key))
        .unwrap_or("timestamp");

    Ok(PointSample {
        x: number_field(map, "x", &format!("{path}.x"))? as f32,
        y: number_field(map, "y", &format!("{path}.y"))? as f32,
        timestamp_millis: integer_field(map, timestamp_key, &format!("{path}.{timestamp_key}"))?,
        pressure: number_field(map, "pressure", &format!("{path}.pressure"))? as f32,
        velocity: match map.get("velocity") {
            Some(_) => number_field(map, "velocity", &format!("{path}.velocity"))? as f32,
            None => 0.0,
        },
    })
}

fn number_field(map: &Map<String, Value>, key: &str, path: &str) -> Result<f64, BdbError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(BdbError::malformed(path, "is missing")),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| BdbError::malformed(path, "is not a number")),
    }
}

/// Integers may arrive as floats from some capture surfaces; they truncate
fn integer_field(map: &Map<String, Value>, key: &str, path: &str) -> Result<i64, BdbError> {
    match map.get(key) {
        None | Some(Value::Null) => Err(BdbError::malformed(path, "is missing")),
        Some(value) => value
            .as_i64()
            .or_else(|| value.as_f64().filter(|f| f.is_finite()).map(|f| f as i64))
            .ok_or_else(|| BdbError::malformed(path, "is not a number")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: BdbError) -> String {
        match err {
            BdbError::MalformedInput { field, .. } => field,
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_full_record() {
        let input = parse_input(
            r#"{"resolution":{"horz":300,"vert":200},"points":[{"x":10,"y":20,"t":0,"p":128}]}"#,
            Resolution::default(),
        )
        .unwrap();
        assert_eq!(
            input,
            BiometricInput::Points {
                resolution: Some(Resolution { horz: 300, vert: 200 }),
                points: vec![RawPoint { x: 10, y: 20, t: 0, p: 128 }],
            }
        );
    }

    #[test]
    fn test_points_only_array() {
        let input = parse_input(r#"[{"x":1,"y":2,"t":3,"p":4}]"#, Resolution::default()).unwrap();
        assert_eq!(
            input,
            BiometricInput::Points {
                resolution: None,
                points: vec![RawPoint { x: 1, y: 2, t: 3, p: 4 }],
            }
        );
    }

    #[test]
    fn test_empty_array_is_empty_points() {
        let input = parse_input("[]", Resolution::default()).unwrap();
        assert_eq!(input, BiometricInput::points(Vec::new()));
    }

    #[test]
    fn test_bare_strokes_use_default_resolution() {
        let json = r#"[
            [{"x":1.5,"y":2.5,"timestamp":0,"pressure":0.5,"velocity":0.0},
             {"x":3.0,"y":4.0,"timestamp":8,"pressure":0.6,"velocity":0.3}],
            [{"x":9.0,"y":9.0,"timestamp":40,"pressure":0.7,"velocity":0.0}]
        ]"#;
        let default = Resolution { horz: 500, vert: 500 };
        match parse_input(json, default).unwrap() {
            BiometricInput::Session(session) => {
                assert_eq!(session.resolution(), default);
                assert_eq!(session.strokes().len(), 2);
                assert_eq!(session.sample_count(), 3);
            }
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn test_session_object() {
        let json = r#"{"resolution":{"horz":600,"vert":600},
            "strokes":[[{"x":0,"y":0,"timestampMillis":5,"pressure":1}]]}"#;
        match parse_input(json, Resolution::default()).unwrap() {
            BiometricInput::Session(session) => {
                assert_eq!(session.strokes()[0].samples()[0].timestamp_millis, 5);
                assert_eq!(session.strokes()[0].samples()[0].velocity, 0.0);
            }
            other => panic!("expected session, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_point_field_named() {
        let err = parse_input(
            r#"{"points":[{"x":1,"y":2,"t":3,"p":4},{"x":1,"y":2,"p":4}]}"#,
            Resolution::default(),
        )
        .unwrap_err();
        assert_eq!(field_of(err), "points[1].t");
    }

    #[test]
    fn test_non_numeric_resolution() {
        let err = parse_input(
            r#"{"resolution":{"horz":"wide","vert":600},"points":[]}"#,
            Resolution::default(),
        )
        .unwrap_err();
        assert_eq!(field_of(err), "resolution.horz");
    }

    #[test]
    fn test_zero_resolution() {
        let err = parse_input(
            r#"{"resolution":{"horz":600,"vert":0},"points":[]}"#,
            Resolution::default(),
        )
        .unwrap_err();
        assert_eq!(field_of(err), "resolution.vert");
    }

    #[test]
    fn test_sample_range_error_carries_path() {
        let err = parse_input(
            r#"{"strokes":[[{"x":0,"y":0,"timestamp":0,"pressure":2.0}]]}"#,
            Resolution::default(),
        )
        .unwrap_err();
        assert_eq!(field_of(err), "strokes[0][0].pressure");
    }

    #[test]
    fn test_empty_stroke() {
        let err = parse_input(r#"[[{"x":0,"y":0,"timestamp":0,"pressure":0.1}],[]]"#, Resolution::default())
            .unwrap_err();
        assert_eq!(field_of(err), "$[1]");
    }

    #[test]
    fn test_invalid_json_and_wrong_shape() {
        assert_eq!(field_of(parse_input("{", Resolution::default()).unwrap_err()), "$");
        assert_eq!(field_of(parse_input("42", Resolution::default()).unwrap_err()), "$");
        assert_eq!(
            field_of(parse_input(r#"{"resolution":{"horz":1,"vert":1}}"#, Resolution::default()).unwrap_err()),
            "$"
        );
    }
}
