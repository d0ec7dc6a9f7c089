use serde::{Deserialize, Serialize};

/// One sampled point of a stroke, in world pixels. `p` is pen pressure,
/// 0 when the input device reports none.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct StrokePoint {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub p: f64,
}

/// A client-emitted drawing event, immutable once accepted.
///
/// The serialized form of this struct is the canonical stroke JSON: it is
/// what gets gzip-compressed into tile rows and what HTTP readers get back.
/// Field names follow the client wire vocabulary (`userId`, flat camelCase).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stroke {
    pub id: String,
    #[serde(rename = "userId", default)]
    pub user_id: String,
    #[serde(default)]
    pub color: String,
    pub size: f64,
    pub opacity: f64,
    #[serde(default)]
    pub erase: bool,
    pub points: Vec<StrokePoint>,
    #[serde(default)]
    pub z: i64,
    #[serde(default)]
    pub t: i64,
}

/// Integer tile coordinate at a fixed zoom level.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub tx: i64,
    pub ty: i64,
}

/// Per-tile query result: the replayable stroke timeline of one tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TileStrokes {
    pub z: i64,
    pub tx: i64,
    pub ty: i64,
    pub strokes: Vec<Stroke>,
}
