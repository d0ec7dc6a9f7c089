//! Duplex channel handling: one task per connection reads frames in receive
//! order; a writer task drains the session's outbound queue so delivery
//! preserves enqueue order. Closing the socket tears both down, which also
//! cancels any tile streaming still queued for that session.

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use fresco_store::constants::MAX_BATCH_WS;
use fresco_store::TileCoord;

use crate::api::AppState;
use crate::protocol::{self, Inbound, Role};
use crate::sessions::FrameSender;

pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (out, mut out_rx) = mpsc::unbounded_channel::<String>();

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sink.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut role: Option<Role> = None;
    let mut peer_id: Option<Uuid> = None;

    while let Some(Ok(msg)) = stream.next().await {
        let text = match msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            // Pings are answered by axum; binary and pongs are not ours.
            _ => continue,
        };

        let Some(frame) = protocol::decode(text.as_str()) else {
            continue;
        };

        match (frame, role) {
            (Inbound::Identify { role: wanted }, None) => {
                role = Some(wanted);
                if wanted == Role::Peer {
                    let joined = state.registry.register(out.clone()).await;
                    peer_id = Some(joined.id);

                    let welcome = protocol::welcome_frame(
                        &joined.id.to_string(),
                        &joined.cursor_color,
                        &joined.display_name,
                        &joined.others,
                    );
                    let _ = out.send(welcome);

                    tracing::info!(peer = %joined.id, "peer identified");
                } else {
                    tracing::debug!("tiles channel identified");
                }
            }

            (Inbound::Presence(update), Some(Role::Peer)) => {
                let Some(id) = peer_id else { continue };
                if let Some(presence) = state.registry.apply_presence(id, update).await {
                    state.relay.broadcast_presence(&presence).await;
                }
            }

            (Inbound::Stroke { raw }, Some(Role::Peer)) => {
                if let Err(e) = state.ingest.ingest(&raw, peer_id).await {
                    tracing::error!(error = %e, "channel stroke ingest failed");
                }
            }

            (Inbound::TilesRequest { req_id, z, tiles }, Some(Role::Tiles)) => {
                stream_tiles(&state, &out, req_id, z, tiles).await;
            }

            // Role gating: everything else is silently ignored, including
            // frames before identification and re-identification attempts.
            _ => {}
        }
    }

    drop(out);

    if let Some(id) = peer_id {
        state.registry.remove(id).await;
        state.relay.broadcast_leave(id).await;
        tracing::info!(peer = %id, "peer disconnected");
    }

    let _ = writer.await;
}

/// Answer one `tilesRequest`: a `tileData` frame per valid tile in request
/// order (empty tiles included), then exactly one `tileBatchDone`. Over-cap
/// requests get only the completion frame.
async fn stream_tiles(
    state: &AppState,
    out: &FrameSender,
    req_id: Value,
    z: i64,
    tiles: Vec<TileCoord>,
) {
    if tiles.len() > MAX_BATCH_WS {
        tracing::warn!(requested = tiles.len(), cap = MAX_BATCH_WS, "tile batch over cap");
        let _ = out.send(protocol::batch_done_frame(&req_id));
        return;
    }

    for TileCoord { tx, ty } in tiles {
        match state.ingest.scan_tile(z, tx, ty, None).await {
            Ok(strokes) => {
                let _ = out.send(protocol::tile_data_frame(&req_id, z, tx, ty, &strokes));
            }
            Err(e) => {
                tracing::error!(error = %e, tx, ty, "tile scan failed, skipping tile");
            }
        }
    }

    let _ = out.send(protocol::batch_done_frame(&req_id));
}
