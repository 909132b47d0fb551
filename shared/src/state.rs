//! The replicated session state: the single aggregate the host mutates and
//! every client displays.
//!
//! The host owns the only live instance. After each mutation it pushes a
//! per-recipient [`redact`]ed copy to every client; clients replace their
//! copy wholesale and never merge. Player records are only ever flagged
//! disconnected, never removed, so scores survive dropouts.

use serde::{Deserialize, Serialize};

use crate::protocol::{ChatMessage, DrawingSubmission};
use crate::transport::PeerAddr;

/// Phases of the session state machine.
///
/// `Guessing` belongs to the legacy vote mode and is never entered by the
/// live word-guessing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    #[default]
    Lobby,
    WordSelection,
    Drawing,
    Guessing,
    TurnResults,
    Results,
}

impl Phase {
    /// True while the secret word must be hidden from non-drawers.
    pub fn masks_word(&self) -> bool {
        matches!(self, Phase::WordSelection | Phase::Drawing | Phase::Guessing)
    }
}

/// One participant. Created on the first accepted join, then only mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    /// Stable transport address; identity key for the whole session.
    pub addr: PeerAddr,
    pub name: String,
    pub avatar_id: u32,
    pub is_host: bool,
    pub score: u32,
    /// Guessed correctly this turn; reset when a new word is picked.
    pub has_guessed: bool,
    /// Legacy vote mode flag.
    pub has_voted: bool,
    /// Soft-disconnect marker; records are never deleted.
    pub is_connected: bool,
}

impl Player {
    pub fn new(addr: PeerAddr, name: String, avatar_id: u32, is_host: bool) -> Self {
        Player {
            addr,
            name,
            avatar_id,
            is_host,
            score: 0,
            has_guessed: false,
            has_voted: false,
            is_connected: true,
        }
    }
}

/// Host-configured game parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameSettings {
    pub rounds: u32,
    pub draw_seconds: u32,
    /// Whether the drawer may send the exact word to end the turn early.
    pub drawer_may_guess: bool,
}

impl Default for GameSettings {
    fn default() -> Self {
        GameSettings {
            rounds: 3,
            draw_seconds: 60,
            drawer_may_guess: false,
        }
    }
}

/// The root aggregate replicated to every client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub phase: Phase,
    pub players: Vec<Player>,
    /// Current round, 1..=settings.rounds.
    pub round: u32,
    /// Seconds remaining in the current phase; ticks once per second.
    pub timer: u32,
    pub drawer: Option<PeerAddr>,
    /// Candidate words offered to the drawer; masked for everyone else.
    pub word_choices: Vec<String>,
    /// The secret word; masked for non-drawers until the turn-results reveal.
    pub word: Option<String>,
    /// Underscore mask of the word, spaces preserved, revealed over time.
    pub hint: String,
    pub chat: Vec<ChatMessage>,
    /// Submitted drawing images (legacy vote mode artifact).
    pub drawings: Vec<DrawingSubmission>,
    pub settings: GameSettings,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            phase: Phase::Lobby,
            players: Vec::new(),
            round: 1,
            timer: 0,
            drawer: None,
            word_choices: Vec::new(),
            word: None,
            hint: String::new(),
            chat: Vec::new(),
            drawings: Vec::new(),
            settings: GameSettings::default(),
        }
    }
}

impl SessionState {
    pub fn with_settings(settings: GameSettings) -> Self {
        SessionState {
            settings,
            ..SessionState::default()
        }
    }

    pub fn player(&self, addr: &PeerAddr) -> Option<&Player> {
        self.players.iter().find(|p| &p.addr == addr)
    }

    pub fn player_mut(&mut self, addr: &PeerAddr) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| &p.addr == addr)
    }

    pub fn host(&self) -> Option<&Player> {
        self.players.iter().find(|p| p.is_host)
    }

    pub fn is_drawer(&self, addr: &PeerAddr) -> bool {
        self.drawer.as_ref() == Some(addr)
    }

    pub fn connected_players(&self) -> impl Iterator<Item = &Player> {
        self.players.iter().filter(|p| p.is_connected)
    }

    /// True when every connected player other than the drawer has guessed.
    pub fn all_guessed(&self) -> bool {
        let mut guessers = 0;
        for player in self.connected_players() {
            if self.is_drawer(&player.addr) {
                continue;
            }
            if !player.has_guessed {
                return false;
            }
            guessers += 1;
        }
        guessers > 0
    }
}

/// Initial hint for a word: every non-space character becomes an underscore,
/// spaces stay in place so word shape remains readable.
pub fn mask_word(word: &str) -> String {
    word.chars().map(|c| if c == ' ' { ' ' } else { '_' }).collect()
}

/// Produces the state snapshot a given recipient is allowed to see.
///
/// The drawer and the host always see the true values; anyone else gets the
/// word choices and the secret word blanked out while [`Phase::masks_word`]
/// holds. Drawer identity, hint, scores and chat are never masked.
pub fn redact(state: &SessionState, recipient: &PeerAddr) -> SessionState {
    let privileged = state.is_drawer(recipient)
        || state.host().map(|h| &h.addr == recipient).unwrap_or(false);

    if privileged || !state.phase.masks_word() {
        return state.clone();
    }

    let mut masked = state.clone();
    masked.word_choices.clear();
    masked.word = None;
    masked
}
