use bytes::Bytes;
use serde::Serialize;

/// Kind of user interaction recorded for session replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TouchKind {
    Down,
    Up,
    Move,
    Tap,
}

/// One user interaction captured by the UI recorder.
#[derive(Debug, Clone, PartialEq)]
pub struct TouchItemPayload {
    pub kind: TouchKind,
    pub x: f64,
    pub y: f64,
    /// Accessibility identifier or class name of the touched view
    pub target: Option<String>,
    pub view_name: Option<String>,
}

impl TouchItemPayload {
    pub fn new(kind: TouchKind, x: f64, y: f64) -> Self {
        Self {
            kind,
            x,
            y,
            target: None,
            view_name: None,
        }
    }
}

/// An encoded screen frame for session replay.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenImageItem {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Encoding of `data`, e.g. "jpeg" or "png"
    pub format: String,
}

impl ScreenImageItem {
    pub fn new(data: impl Into<Bytes>, width: u32, height: u32, format: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            width,
            height,
            format: format.into(),
        }
    }
}
