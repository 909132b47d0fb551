// Protocol messages exchanged between the host and its clients.
//
// A single `Message` enum covers both directions; the host ignores variants
// a client has no business sending (and vice versa) rather than erroring,
// so stray or malformed traffic can never take a session down. Payloads are
// bincode-encoded on top of the transport's opaque byte channel.

use serde::{Deserialize, Serialize};

use crate::state::SessionState;
use crate::transport::PeerAddr;

/// Chat log entry classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChatKind {
    /// Free-form table talk.
    Chat,
    /// A wrong guess made during the drawing phase.
    Guess,
    /// Host-synthesized narration (joins, turn starts, correct guesses).
    System,
}

/// One entry in the session's chat/event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: u64,
    pub sender: PeerAddr,
    pub sender_name: String,
    pub text: String,
    pub kind: ChatKind,
    pub correct: bool,
    pub timestamp_ms: u64,
}

/// A point-to-point line segment of the current drawing.
///
/// `size == 0` is a reserved sentinel: the stroke is a flood-fill event with
/// its origin at `(x, y)`, replayed by re-running the fill algorithm on the
/// receiving side instead of shipping pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stroke {
    pub x: i32,
    pub y: i32,
    pub last_x: i32,
    pub last_y: i32,
    /// Packed 0xRRGGBB color.
    pub color: u32,
    pub size: u32,
    pub is_eraser: bool,
}

impl Stroke {
    /// True when this stroke is the flood-fill sentinel.
    pub fn is_fill(&self) -> bool {
        self.size == 0
    }

    /// A fill event at `(x, y)` with the given color.
    pub fn fill(x: i32, y: i32, color: u32) -> Self {
        Stroke {
            x,
            y,
            last_x: x,
            last_y: y,
            color,
            size: 0,
            is_eraser: false,
        }
    }
}

/// The unit of stroke transmission: a handful of samples plus the capture
/// time, amortizing per-message overhead without adding visible latency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeBatch {
    pub strokes: Vec<Stroke>,
    pub captured_at_ms: u64,
}

/// A finished drawing image handed in by a player (legacy vote mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DrawingSubmission {
    pub player: PeerAddr,
    pub data: String,
}

/// The closed message catalog. Receivers must treat unknown or malformed
/// payloads as no-ops; see [`Message::decode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// Client asks to join with a display name and avatar.
    JoinRequest { name: String, avatar_id: u32 },
    /// Host pushes a full (per-recipient masked) state snapshot.
    GameStateUpdate { state: SessionState },
    /// Client hands in a finished drawing image (legacy vote mode).
    SubmitDrawing { data: String },
    /// The drawer picks one of the offered words.
    SelectWord { word: String },
    /// Chat or guess text, relayed through the host's log.
    Chat { message: ChatMessage },
    /// A single stroke (or the fill sentinel).
    DrawStroke { stroke: Stroke },
    /// A buffered run of strokes.
    StrokeBatch { batch: StrokeBatch },
    /// The drawer put the pen down; receivers snapshot for undo.
    StrokeStart,
    /// Pop one snapshot from the local undo history.
    UndoStroke,
    /// Client changed its avatar.
    AvatarUpdate { avatar_id: u32 },
    /// Heartbeat probe.
    Ping,
    /// Heartbeat reply.
    Pong,
}

impl Message {
    /// Decodes a wire payload, returning `None` for malformed bytes so the
    /// caller can drop them silently.
    pub fn decode(bytes: &[u8]) -> Option<Message> {
        bincode::deserialize(bytes).ok()
    }
}
