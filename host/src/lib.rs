//! # Host Session Library
//!
//! The authoritative host for the party drawing game. One participant runs
//! this session; everyone else connects as a client and renders whatever the
//! host pushes. The host owns the canonical game state, runs the turn state
//! machine, validates and relays every gameplay event, and scores guesses.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative State
//! The session state lives here and only here. Clients hold read-only,
//! wholesale-replaced copies; every inbound value that affects shared state
//! is re-validated by the host regardless of client-side checks.
//!
//! ### Turn State Machine
//! The game cycles `Lobby -> WordSelection -> Drawing -> TurnResults` through
//! a per-round drawer queue, then lands in `Results` when the configured
//! round count is exhausted. A single per-second tick drives every timed
//! phase: selection timeouts auto-pick a word so an idle drawer never stalls
//! the game, drawing timeouts reveal the word, and hint characters are
//! uncovered as the clock passes the 75/50/25% marks.
//!
//! ### State Masking
//! Every push to a client is independently redacted: non-drawers never see
//! the word choices or the secret word while a turn is live, which keeps
//! devtools-level inspection from spoiling the game. The drawer and the host
//! always see the true values.
//!
//! ### Drawing Relay
//! Stroke, batch, fill and undo events are accepted only from the current
//! drawer and fanned out verbatim to every other connected player. The host
//! never interprets stroke contents.
//!
//! ### Connection Lifecycle
//! Player records are never deleted. Transport disconnects and heartbeat
//! silence both flip a soft `is_connected` flag; a returning address is
//! recognized and revived with its score intact. A disconnected drawer's
//! turn times out like any other.
//!
//! ## Module Organization
//!
//! - [`game`] — the state machine, scoring, hints and drawer queue
//! - [`roster`] — per-peer liveness tracking and chat rate limits
//! - [`session`] — the event loop binding the controller to a transport

pub mod game;
pub mod roster;
pub mod session;
