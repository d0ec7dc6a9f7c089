//! Channel framing: compact positional arrays plus the tolerated object form.
//!
//! Every frame is one JSON text message. The compact form `[op, ...]` is the
//! authoritative encoding and the only one the server emits; the object form
//! `{type, payload}` is accepted inbound for every opcode. The positional
//! layouts are part of the wire contract, so frames are assembled and picked
//! apart by hand over `serde_json::Value` rather than through a tagged enum.
//!
//! Anything malformed decodes to `None` and is dropped without closing the
//! channel.

use serde_json::{json, Value};

use fresco_store::{Stroke, TileCoord};

/// Wire opcodes. The numeric values are the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Identify = 0,
    Presence = 1,
    Stroke = 2,
    TilesRequest = 3,
    TileData = 4,
    Welcome = 5,
    TileBatchDone = 6,
    Leave = 7,
}

/// Session role, set once at identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Peer,
    Tiles,
}

/// A decoded client-to-server frame.
#[derive(Debug, Clone)]
pub enum Inbound {
    Identify { role: Role },
    Presence(PresenceUpdate),
    /// Raw stroke object; canonicalization happens at ingest.
    Stroke { raw: Value },
    TilesRequest {
        /// Opaque request correlator, echoed back verbatim.
        req_id: Value,
        z: i64,
        tiles: Vec<TileCoord>,
    },
}

/// Partial presence mutation: any subset of fields may appear.
#[derive(Debug, Clone, Default)]
pub struct PresenceUpdate {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub color: Option<String>,
    pub name: Option<String>,
}

/// Decode one text frame. `None` means drop it silently.
pub fn decode(text: &str) -> Option<Inbound> {
    let value: Value = serde_json::from_str(text).ok()?;
    match value {
        Value::Array(fields) => decode_compact(&fields),
        Value::Object(_) => {
            let msg_type = value.get("type")?.as_str()?;
            let payload = value.get("payload").cloned().unwrap_or(Value::Null);
            decode_object(msg_type, payload)
        }
        _ => None,
    }
}

fn decode_compact(fields: &[Value]) -> Option<Inbound> {
    let op = fields.first()?.as_u64()?;
    match op {
        0 => {
            let role = if fields.get(1).and_then(Value::as_u64) == Some(1) {
                Role::Tiles
            } else {
                Role::Peer
            };
            Some(Inbound::Identify { role })
        }
        // [1, id, x, y, color, name] -- the id slot is the sender's own and
        // is ignored; the server knows who is talking.
        1 => Some(Inbound::Presence(PresenceUpdate {
            x: finite(fields.get(2)),
            y: finite(fields.get(3)),
            color: non_empty_str(fields.get(4)),
            name: non_empty_str(fields.get(5)),
        })),
        // [2, id, userId, color, size, opacity, erase, pointsFlat]
        2 => {
            let points: Vec<Value> = fields
                .get(7)
                .and_then(Value::as_array)
                .map(|flat| {
                    flat.chunks(2)
                        .filter(|pair| pair.len() == 2)
                        .map(|pair| json!({"x": pair[0], "y": pair[1], "p": 0}))
                        .collect()
                })
                .unwrap_or_default();

            let erase = match fields.get(6) {
                Some(Value::Bool(b)) => *b,
                Some(v) => v.as_f64().map(|n| n != 0.0).unwrap_or(false),
                None => false,
            };

            let raw = json!({
                "id": fields.get(1).cloned().unwrap_or(Value::Null),
                "userId": fields.get(2).cloned().unwrap_or(Value::Null),
                "color": fields.get(3).cloned().unwrap_or(Value::Null),
                "size": fields.get(4).cloned().unwrap_or(Value::Null),
                "opacity": fields.get(5).cloned().unwrap_or(Value::Null),
                "erase": erase,
                "points": points,
            });
            Some(Inbound::Stroke { raw })
        }
        // [3, reqId, z, [[tx, ty], ...]]
        3 => {
            let req_id = fields.get(1).cloned().unwrap_or(Value::Null);
            let z = fields.get(2).and_then(Value::as_i64).unwrap_or(0);
            let tiles = fields
                .get(3)
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(tile_entry).collect())
                .unwrap_or_default();
            Some(Inbound::TilesRequest { req_id, z, tiles })
        }
        _ => None,
    }
}

fn decode_object(msg_type: &str, payload: Value) -> Option<Inbound> {
    match msg_type {
        "identify" => {
            let role_field = payload.get("role");
            let is_tiles = role_field.and_then(Value::as_str) == Some("tiles")
                || role_field.and_then(Value::as_u64) == Some(1);
            Some(Inbound::Identify {
                role: if is_tiles { Role::Tiles } else { Role::Peer },
            })
        }
        "presence" => Some(Inbound::Presence(PresenceUpdate {
            x: finite(payload.get("x")),
            y: finite(payload.get("y")),
            color: non_empty_str(payload.get("color")),
            name: non_empty_str(payload.get("name")),
        })),
        "stroke" => Some(Inbound::Stroke { raw: payload }),
        "tilesRequest" => {
            let req_id = payload.get("reqId").cloned().unwrap_or(Value::Null);
            let z = payload.get("z").and_then(Value::as_i64).unwrap_or(0);
            let tiles = payload
                .get("tiles")
                .and_then(Value::as_array)
                .map(|entries| entries.iter().filter_map(tile_entry).collect())
                .unwrap_or_default();
            Some(Inbound::TilesRequest { req_id, z, tiles })
        }
        _ => None,
    }
}

/// Accept a tile as `[tx, ty]` or `{tx, ty}`; anything else is skipped.
/// Shared with the HTTP batch endpoint, which applies the same leniency.
pub(crate) fn tile_entry(v: &Value) -> Option<TileCoord> {
    let (tx, ty) = match v {
        Value::Array(pair) => (finite(pair.first())?, finite(pair.get(1))?),
        Value::Object(o) => (finite(o.get("tx"))?, finite(o.get("ty"))?),
        _ => return None,
    };
    Some(TileCoord {
        tx: tx as i64,
        ty: ty as i64,
    })
}

fn finite(v: Option<&Value>) -> Option<f64> {
    v.and_then(Value::as_f64).filter(|n| n.is_finite())
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------- outbound

/// `[5, id, color, name, [[id, x, y], ...]]`
///
/// The peer snapshot carries only id and cursor; clients backfill color and
/// name from subsequent presence frames.
pub fn welcome_frame(id: &str, color: &str, name: &str, others: &[(String, f64, f64)]) -> String {
    let snapshot: Vec<Value> = others
        .iter()
        .map(|(id, x, y)| json!([id, x, y]))
        .collect();
    json!([Op::Welcome as u8, id, color, name, snapshot]).to_string()
}

/// `[1, id, x, y, color, name]`
pub fn presence_frame(id: &str, x: f64, y: f64, color: &str, name: &str) -> String {
    json!([Op::Presence as u8, id, x, y, color, name]).to_string()
}

/// `[2, id, userId, color, size, opacity, erase, pointsFlat]`
pub fn stroke_frame(stroke: &Stroke) -> String {
    let mut fields = vec![json!(Op::Stroke as u8)];
    fields.extend(stroke_compact(stroke));
    Value::Array(fields).to_string()
}

/// `[4, reqId, z, tx, ty, [stroke-compact, ...]]`
pub fn tile_data_frame(req_id: &Value, z: i64, tx: i64, ty: i64, strokes: &[Stroke]) -> String {
    let compact: Vec<Value> = strokes
        .iter()
        .map(|s| Value::Array(stroke_compact(s)))
        .collect();
    json!([Op::TileData as u8, req_id, z, tx, ty, compact]).to_string()
}

/// `[6, reqId]`
pub fn batch_done_frame(req_id: &Value) -> String {
    json!([Op::TileBatchDone as u8, req_id]).to_string()
}

/// `[7, id]`
pub fn leave_frame(id: &str) -> String {
    json!([Op::Leave as u8, id]).to_string()
}

/// Shared positional body for stroke frames, without the leading opcode.
/// Pressure does not survive the flat point encoding.
fn stroke_compact(stroke: &Stroke) -> Vec<Value> {
    let mut flat = Vec::with_capacity(stroke.points.len() * 2);
    for pt in &stroke.points {
        flat.push(json!(pt.x));
        flat.push(json!(pt.y));
    }
    vec![
        json!(stroke.id),
        json!(stroke.user_id),
        json!(stroke.color),
        json!(stroke.size),
        json!(stroke.opacity),
        json!(if stroke.erase { 1 } else { 0 }),
        Value::Array(flat),
    ]
}
