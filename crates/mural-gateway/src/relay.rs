//! Synchronization relay: per-connection lifecycle and message dispatch.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use mural_core::config::Rgba;
use mural_core::protocol::{ClientFrame, PixelEdit, ServerFrame};
use mural_core::{MuralError, Result};
use mural_store::{CanvasGeometry, PixelWrite, apply_pixels, assemble_viewport};

use crate::state::GatewayState;

/// Handle one WebSocket session from registration to close.
pub async fn handle_ws_connection(state: Arc<GatewayState>, ws: WebSocket) {
    let conn_id = Uuid::new_v4().to_string();
    info!(conn_id = %conn_id, "Session connected");

    let (mut ws_tx, mut ws_rx) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    state.registry.register(conn_id.clone(), tx.clone()).await;
    let sessions = state.registry.len().await;
    info!(sessions, "Total connected sessions");

    // Writer task: everything leaving this session goes through one channel,
    // so snapshot replies and relayed deltas cannot interleave mid-frame.
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    // Advisory only: the protocol accepts deltas before the first snapshot.
    let mut synced = false;

    while let Some(msg_result) = ws_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                handle_frame(&state, &conn_id, &tx, text.as_str(), &mut synced).await;
            }
            Ok(Message::Close(_)) => {
                debug!(conn_id = %conn_id, "Session requested close");
                break;
            }
            Ok(Message::Ping(_)) => {
                // Axum answers pings automatically.
            }
            Err(e) => {
                error!(conn_id = %conn_id, %e, "WebSocket error");
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    state.registry.unregister(&conn_id).await;
    info!(conn_id = %conn_id, "Session disconnected");
}

async fn handle_frame(
    state: &Arc<GatewayState>,
    conn_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
    text: &str,
    synced: &mut bool,
) {
    match serde_json::from_str::<ClientFrame>(text) {
        Ok(ClientFrame::Screen { width, height }) => {
            match assemble_viewport(state.store.as_ref(), width, height).await {
                Ok(texture) => {
                    debug!(conn_id = %conn_id, width, height, bytes = texture.len(), "Serving snapshot");
                    let _ = tx.send(Message::Binary(texture.into()));
                    *synced = true;
                }
                Err(e) => {
                    warn!(conn_id = %conn_id, %e, "Snapshot failed");
                    send_error(tx, &e);
                }
            }
        }
        Ok(ClientFrame::Delta { delta }) => {
            if !*synced {
                debug!(conn_id = %conn_id, "Delta from un-synced session");
            }
            let writes = match resolve_edits(
                state.store.geometry(),
                state.config.paint_color(),
                &delta,
            ) {
                Ok(writes) => writes,
                Err(e) => {
                    warn!(conn_id = %conn_id, %e, "Dropping delta");
                    return;
                }
            };
            if writes.is_empty() {
                return;
            }

            // Relay before the store write completes; persistence runs as its
            // own task and deliberately races the broadcast.
            state
                .registry
                .broadcast(conn_id, Message::Text(text.to_string().into()))
                .await;

            let state = state.clone();
            let tx = tx.clone();
            let conn_id = conn_id.to_string();
            tokio::spawn(async move {
                if let Err(e) = apply_pixels(state.store.as_ref(), &writes).await {
                    error!(conn_id = %conn_id, %e, "Failed to persist delta");
                    send_error(&tx, &e);
                }
            });
        }
        Err(parse_err) => match serde_json::from_str::<serde_json::Value>(text) {
            Ok(value) => match value.get("type").and_then(|t| t.as_str()) {
                Some(kind @ ("screen" | "delta")) => {
                    warn!(conn_id = %conn_id, kind, %parse_err, "Dropping malformed message");
                }
                Some(kind) => {
                    debug!(conn_id = %conn_id, kind, "Ignoring unknown message type");
                }
                None => {
                    warn!(conn_id = %conn_id, "Dropping message without a type");
                }
            },
            Err(_) => {
                warn!(conn_id = %conn_id, %parse_err, "Dropping unparsable message");
            }
        },
    }
}

fn send_error(tx: &mpsc::UnboundedSender<Message>, e: &MuralError) {
    let code = match e {
        MuralError::ChunkNotFound(_) => "not_found",
        MuralError::Malformed(_) => "malformed",
        _ => "store_unavailable",
    };
    if let Ok(msg) = serde_json::to_string(&ServerFrame::error(code, e.to_string())) {
        let _ = tx.send(Message::Text(msg.into()));
    }
}

/// Bounds-check a delta batch and resolve implicit colors.
///
/// Any out-of-range coordinate rejects the whole batch before store access;
/// a batch that cannot be applied is not relayed to peers either.
fn resolve_edits(
    geometry: &CanvasGeometry,
    paint: Rgba,
    edits: &[PixelEdit],
) -> Result<Vec<PixelWrite>> {
    edits
        .iter()
        .map(|edit| {
            if !geometry.contains(edit.x, edit.y) {
                return Err(MuralError::Malformed(format!(
                    "pixel ({}, {}) outside {}x{} canvas",
                    edit.x, edit.y, geometry.width, geometry.height
                )));
            }
            Ok(PixelWrite {
                x: edit.x as u32,
                y: edit.y as u32,
                color: edit.color.unwrap_or(paint),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAINT: Rgba = [255, 0, 0, 255];

    fn geo() -> CanvasGeometry {
        CanvasGeometry::new(4, 4, 4, 4).unwrap()
    }

    fn edit(x: i64, y: i64, color: Option<Rgba>) -> PixelEdit {
        PixelEdit { x, y, color }
    }

    #[test]
    fn test_resolve_applies_default_paint_color() {
        let writes = resolve_edits(&geo(), PAINT, &[edit(1, 1, None)]).unwrap();
        assert_eq!(writes.len(), 1);
        assert_eq!((writes[0].x, writes[0].y), (1, 1));
        assert_eq!(writes[0].color, PAINT);
    }

    #[test]
    fn test_resolve_keeps_explicit_color() {
        let green = [0, 255, 0, 255];
        let writes = resolve_edits(&geo(), PAINT, &[edit(0, 0, Some(green))]).unwrap();
        assert_eq!(writes[0].color, green);
    }

    #[test]
    fn test_resolve_rejects_out_of_bounds() {
        assert!(resolve_edits(&geo(), PAINT, &[edit(-1, 0, None)]).is_err());
        assert!(resolve_edits(&geo(), PAINT, &[edit(4, 0, None)]).is_err());
        assert!(resolve_edits(&geo(), PAINT, &[edit(0, 4, None)]).is_err());
    }

    #[test]
    fn test_resolve_rejects_whole_batch_on_one_bad_entry() {
        let result = resolve_edits(&geo(), PAINT, &[edit(1, 1, None), edit(9, 9, None)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_accepts_boundary_pixel() {
        let writes = resolve_edits(&geo(), PAINT, &[edit(3, 3, None)]).unwrap();
        assert_eq!((writes[0].x, writes[0].y), (3, 3));
    }
}
