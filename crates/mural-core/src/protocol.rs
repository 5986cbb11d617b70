//! Mural wire protocol: JSON text frames over a persistent WebSocket.
//!
//! The one exception to JSON framing is the viewport snapshot, which is sent
//! as a single binary frame of raw RGBA bytes.

use serde::{Deserialize, Serialize};

use crate::config::Rgba;

/// Client -> server frames.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Request an initial viewport snapshot of `width * height` pixels.
    Screen { width: u32, height: u32 },
    /// A batch of painted pixels since the client's last flush.
    Delta { delta: Vec<PixelEdit> },
}

/// One painted pixel.
///
/// Coordinates are signed so out-of-range values survive parsing and are
/// rejected with a reason instead of failing deserialization. A missing
/// `color` means the server's configured paint color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixelEdit {
    pub x: i64,
    pub y: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<Rgba>,
}

/// Server -> client JSON frames.
///
/// Delta relays are forwarded as the sender's original text and never pass
/// through this enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    Error { code: String, message: String },
}

impl ServerFrame {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}
