//! Stroke canonicalization and payload compression.
//!
//! Canonicalization turns whatever JSON a client sent into a [`Stroke`] with
//! every field clamped and coerced. Compression turns the canonical form into
//! the gzip bytes that tile rows persist. Decompression is lenient: a row
//! whose payload fails to inflate or parse is skipped, never a read error.

use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{
    DEFAULT_BRUSH_SIZE, DEFAULT_OPACITY, MAX_BRUSH_SIZE, MIN_BRUSH_SIZE,
};
use crate::error::Result;
use crate::models::{Stroke, StrokePoint};

/// Coerce raw client JSON into a canonical stroke.
///
/// `now_ms` becomes the stroke's server-assigned `t`, overriding any client
/// value. A missing or empty `id` is replaced with a freshly minted one.
/// Non-finite points are silently dropped; a stroke can come out with zero
/// points, which the ingest path treats as an empty footprint.
pub fn canonicalize(raw: &Value, now_ms: i64) -> Stroke {
    let obj = raw.as_object();
    let field = |name: &str| obj.and_then(|o| o.get(name));

    let id = match field("id").and_then(Value::as_str) {
        Some(s) if !s.is_empty() => s.to_string(),
        _ => Uuid::new_v4().to_string(),
    };

    let user_id = field("userId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let color = field("color")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let size = finite(field("size"))
        .unwrap_or(DEFAULT_BRUSH_SIZE)
        .clamp(MIN_BRUSH_SIZE, MAX_BRUSH_SIZE);

    let opacity = finite(field("opacity"))
        .unwrap_or(DEFAULT_OPACITY)
        .clamp(0.0, 1.0);

    let erase = field("erase").and_then(Value::as_bool).unwrap_or(false);

    let z = field("z").and_then(Value::as_i64).unwrap_or(0);

    let points = field("points")
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(point_from_value).collect())
        .unwrap_or_default();

    Stroke {
        id,
        user_id,
        color,
        size,
        opacity,
        erase,
        points,
        z,
        t: now_ms,
    }
}

/// Accept both the object form `{x, y, p}` and the triple form `[x, y, p]`.
fn point_from_value(v: &Value) -> Option<StrokePoint> {
    let (x, y, p) = match v {
        Value::Object(o) => (
            finite(o.get("x"))?,
            finite(o.get("y"))?,
            finite(o.get("p")).unwrap_or(0.0),
        ),
        Value::Array(a) => (
            finite(a.first())?,
            finite(a.get(1))?,
            finite(a.get(2)).unwrap_or(0.0),
        ),
        _ => return None,
    };
    Some(StrokePoint { x, y, p })
}

fn finite(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_f64).filter(|n| n.is_finite())
}

/// Serialize a canonical stroke to compact JSON and gzip it.
pub fn compress(stroke: &Stroke, level: u32) -> Result<Vec<u8>> {
    let json = serde_json::to_vec(stroke)?;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(level.clamp(1, 9)));
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Inflate and parse a persisted payload. `None` on any failure.
pub fn decompress(payload: &[u8]) -> Option<Stroke> {
    let mut decoder = GzDecoder::new(payload);
    let mut json = Vec::new();
    decoder.read_to_end(&mut json).ok()?;
    serde_json::from_slice(&json).ok()
}
