//! # Client Session Library
//!
//! The client side of the party drawing game: joins a host by room code,
//! forwards local input as fire-and-forget protocol messages, and renders
//! whatever state the host pushes.
//!
//! ## Architecture Overview
//!
//! The client never owns game state. Every `GameStateUpdate` replaces the
//! local copy wholesale — no merging, no diffing — because the host snapshot
//! is always authoritative and complete. What the client does own is its
//! connection lifecycle and its drawing surface:
//!
//! ### Connection Resilience
//! Connecting uses exponential backoff with jitter, and once connected a
//! heartbeat monitor watches for a host that goes dark without a transport
//! disconnect event. Loss of the host degrades an explicit connection
//! status (`connecting | connected | disconnected | error`) rather than
//! tearing anything down; the player record on the host survives and a
//! reconnect revives it, score intact.
//!
//! ### Drawing Relay
//! Local pointer samples are batched (five per batch, or whatever is left
//! at pen-up) to bound both latency and message overhead. Flood fills skip
//! the buffer entirely and ship as a zero-size sentinel stroke that the
//! receiving side replays through the identical fill algorithm. Undo pops a
//! snapshot from a bounded local raster history, which is why it must be an
//! explicit relayed event rather than something inferred from strokes.
//!
//! ## Module Organization
//!
//! - [`session`] — connection lifecycle, snapshot application, intents
//! - [`canvas`] — stroke batching, replay, flood fill, undo history

pub mod canvas;
pub mod session;
