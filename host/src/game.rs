//! The authoritative turn state machine.
//!
//! `GameController` owns the only live `SessionState` and is the sole writer:
//! every mutation happens inside a message or timer callback on the host's
//! event loop, after which the session layer pushes masked snapshots to every
//! client. Transitions follow
//! `Lobby -> WordSelection -> Drawing -> TurnResults -> WordSelection ...`
//! cycling through a per-round drawer queue, then `Results` once the
//! configured round count is exhausted.

use std::collections::{HashSet, VecDeque};

use log::{debug, info};
use rand::seq::SliceRandom;

use shared::protocol::{ChatKind, ChatMessage, DrawingSubmission};
use shared::state::{mask_word, GameSettings, Phase, Player, SessionState};
use shared::transport::PeerAddr;
use shared::validation;
use shared::words;
use shared::{
    now_millis, DRAWER_DRIP_POINTS, EARLY_END_DELAY_SECONDS, GUESS_BASE_POINTS,
    GUESS_TIME_POINTS, HINT_REVEAL_PERCENTS, ORDER_BONUS_POINTS, RESULTS_SECONDS,
    SELECTION_SECONDS, WORD_CHOICE_COUNT,
};

/// Result of processing a join request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    /// A new player record was appended.
    Joined,
    /// A known address came back; its record was marked connected again.
    Reconnected,
    /// The address is already present and connected; nothing changed.
    AlreadyJoined,
    /// The request was invalid (bad name).
    Rejected,
}

fn ceil_div(a: u32, b: u32) -> u32 {
    (a + b - 1) / b
}

pub struct GameController {
    state: SessionState,
    category: String,
    used_words: HashSet<String>,
    drawer_queue: VecDeque<PeerAddr>,
    /// Hint thresholds already crossed this turn.
    hint_stage: usize,
    /// Correct guessers so far this turn; indexes the order bonus table.
    correct_count: usize,
    /// Seconds until the scheduled early turn end, when armed.
    pending_end: Option<u32>,
    next_chat_id: u64,
}

impl GameController {
    pub fn new(settings: GameSettings, category: &str) -> Self {
        GameController {
            state: SessionState::with_settings(settings),
            category: category.to_string(),
            used_words: HashSet::new(),
            drawer_queue: VecDeque::new(),
            hint_stage: 0,
            correct_count: 0,
            pending_end: None,
            next_chat_id: 1,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Handles a join request. Unknown addresses get a fresh record; known
    /// ones are marked reconnected so their score survives dropouts.
    pub fn join(
        &mut self,
        addr: &PeerAddr,
        name: &str,
        avatar_id: u32,
        is_host: bool,
    ) -> JoinOutcome {
        if let Some(player) = self.state.player_mut(addr) {
            if player.is_connected {
                return JoinOutcome::AlreadyJoined;
            }
            player.is_connected = true;
            let name = player.name.clone();
            info!("{} ({}) reconnected", name, addr);
            self.system(format!("{} reconnected", name));
            return JoinOutcome::Reconnected;
        }

        let name = validation::sanitize_name(name);
        if !validation::valid_player_name(&name) {
            debug!("rejecting join from {}: invalid name", addr);
            return JoinOutcome::Rejected;
        }

        info!("{} ({}) joined", name, addr);
        self.state
            .players
            .push(Player::new(addr.clone(), name.clone(), avatar_id, is_host));
        self.system(format!("{} joined the game", name));
        JoinOutcome::Joined
    }

    pub fn set_avatar(&mut self, addr: &PeerAddr, avatar_id: u32) -> bool {
        match self.state.player_mut(addr) {
            Some(player) => {
                player.avatar_id = avatar_id;
                true
            }
            None => false,
        }
    }

    /// Flags a player disconnected in place. The record keeps its score and
    /// its slot in the drawer queue; an absent drawer's turn simply times
    /// out.
    pub fn mark_disconnected(&mut self, addr: &PeerAddr) -> bool {
        let Some(player) = self.state.player_mut(addr) else {
            return false;
        };
        if !player.is_connected {
            return false;
        }
        player.is_connected = false;
        let name = player.name.clone();
        info!("{} ({}) disconnected", name, addr);
        self.system(format!("{} disconnected", name));

        // The remaining guessers may now all have guessed.
        if self.state.phase == Phase::Drawing
            && self.state.all_guessed()
            && self.pending_end.is_none()
        {
            self.pending_end = Some(EARLY_END_DELAY_SECONDS);
        }
        true
    }

    /// Starts the game from the lobby: seeds the drawer queue with every
    /// current player and advances into the first turn.
    pub fn start(&mut self) -> bool {
        if self.state.phase != Phase::Lobby || self.state.players.is_empty() {
            return false;
        }

        self.drawer_queue = self.state.players.iter().map(|p| p.addr.clone()).collect();
        self.state.round = 1;
        let settings = self.state.settings;
        self.system(format!(
            "Game started: {} rounds, {} seconds per drawing",
            settings.rounds, settings.draw_seconds
        ));
        self.start_turn();
        true
    }

    /// The drawer picked a word. Only the designated drawer is honored, and
    /// only a word that was actually offered.
    pub fn select_word(&mut self, addr: &PeerAddr, word: &str) -> bool {
        if self.state.phase != Phase::WordSelection {
            return false;
        }
        if !self.state.is_drawer(addr) {
            debug!("ignoring word selection from non-drawer {}", addr);
            return false;
        }
        let word = word.trim();
        if !validation::valid_word(word) {
            return false;
        }
        let Some(chosen) = self.state.word_choices.iter().find(|w| *w == word).cloned()
        else {
            debug!("ignoring word '{}' that was never offered", word);
            return false;
        };

        self.begin_drawing(chosen);
        true
    }

    /// Chat text from a player. During the drawing phase this doubles as the
    /// guess channel; everywhere else it is plain table talk.
    pub fn chat(&mut self, addr: &PeerAddr, text: &str) -> bool {
        let Some(player) = self.state.player(addr) else {
            return false;
        };
        let already_guessed = player.has_guessed;

        let text = validation::sanitize_message(text);
        if !validation::valid_guess(&text) {
            return false;
        }

        if self.state.phase == Phase::Drawing {
            if let Some(word) = self.state.word.clone() {
                let matches = text.eq_ignore_ascii_case(word.trim());

                if self.state.is_drawer(addr) {
                    // Drawer chat is never relayed mid-turn; the exact word
                    // ends the turn early when the rule allows it.
                    if matches
                        && self.state.settings.drawer_may_guess
                        && self.pending_end.is_none()
                    {
                        let name = self.player_name(addr);
                        self.system(format!("{} ended the turn early", name));
                        self.pending_end = Some(EARLY_END_DELAY_SECONDS);
                        return true;
                    }
                    return false;
                }

                if matches {
                    if already_guessed {
                        return false;
                    }
                    self.award_guess(addr);
                    return true;
                }

                if already_guessed {
                    // They know the word; anything that is not the word is
                    // ordinary chat.
                    self.player_chat(addr, text, ChatKind::Chat);
                    return true;
                }

                self.player_chat(addr, text, ChatKind::Guess);
                return true;
            }
        }

        self.player_chat(addr, text, ChatKind::Chat);
        true
    }

    /// Archives a finished drawing image (legacy vote mode artifact).
    pub fn submit_drawing(&mut self, addr: &PeerAddr, data: String) -> bool {
        if self.state.player(addr).is_none() {
            return false;
        }
        if let Err(reason) = validation::valid_drawing_data(&data) {
            debug!("rejecting drawing from {}: {}", addr, reason);
            return false;
        }
        self.state.drawings.retain(|d| &d.player != addr);
        self.state.drawings.push(DrawingSubmission {
            player: addr.clone(),
            data,
        });
        true
    }

    /// The per-second driver shared by every timed phase. Returns true when
    /// the state changed and should be re-broadcast.
    pub fn tick(&mut self) -> bool {
        match self.state.phase {
            Phase::WordSelection => {
                self.state.timer = self.state.timer.saturating_sub(1);
                if self.state.timer == 0 {
                    // Never stall the game on an idle drawer.
                    let auto = self
                        .state
                        .word_choices
                        .choose(&mut rand::thread_rng())
                        .cloned();
                    match auto {
                        Some(word) => {
                            info!("selection timed out, auto-picking '{}'", word);
                            self.begin_drawing(word);
                        }
                        None => self.end_turn(),
                    }
                }
                true
            }
            Phase::Drawing => {
                if let Some(remaining) = self.pending_end.as_mut() {
                    *remaining -= 1;
                    if *remaining == 0 {
                        self.end_turn();
                        return true;
                    }
                }
                self.state.timer = self.state.timer.saturating_sub(1);
                self.reveal_due_hints();
                if self.state.timer == 0 {
                    self.end_turn();
                }
                true
            }
            Phase::TurnResults => {
                self.state.timer = self.state.timer.saturating_sub(1);
                if self.state.timer == 0 {
                    self.start_turn();
                }
                true
            }
            Phase::Lobby | Phase::Guessing | Phase::Results => false,
        }
    }

    fn start_turn(&mut self) {
        self.pending_end = None;
        self.state.drawings.clear();
        self.state.word = None;
        self.state.word_choices.clear();
        self.state.hint.clear();
        self.hint_stage = 0;
        self.correct_count = 0;

        let drawer = loop {
            match self.drawer_queue.pop_front() {
                Some(addr) => break addr,
                None => {
                    if self.state.round < self.state.settings.rounds {
                        self.state.round += 1;
                        self.drawer_queue =
                            self.state.players.iter().map(|p| p.addr.clone()).collect();
                        info!("round {} begins", self.state.round);
                    } else {
                        self.finish_game();
                        return;
                    }
                }
            }
        };

        let name = self.player_name(&drawer);
        self.state.drawer = Some(drawer);
        self.state.word_choices =
            words::random_words(&self.category, WORD_CHOICE_COUNT, &self.used_words);
        self.state.phase = Phase::WordSelection;
        self.state.timer = SELECTION_SECONDS;
        self.system(format!("{} is choosing a word", name));
    }

    fn begin_drawing(&mut self, word: String) {
        self.used_words.insert(word.clone());
        self.state.hint = mask_word(&word);
        self.state.word = Some(word);
        for player in &mut self.state.players {
            player.has_guessed = false;
        }
        self.state.phase = Phase::Drawing;
        self.state.timer = self.state.settings.draw_seconds;
        self.hint_stage = 0;
        self.correct_count = 0;

        let name = self
            .state
            .drawer
            .clone()
            .map(|addr| self.player_name(&addr))
            .unwrap_or_default();
        self.system(format!("{} is drawing now!", name));
    }

    fn end_turn(&mut self) {
        self.pending_end = None;
        self.state.phase = Phase::TurnResults;
        self.state.timer = RESULTS_SECONDS;
        if let Some(word) = self.state.word.clone() {
            self.system(format!("The word was '{}'", word));
        }
    }

    fn finish_game(&mut self) {
        self.state.phase = Phase::Results;
        self.state.drawer = None;
        self.state.timer = 0;

        let winner = self
            .state
            .players
            .iter()
            .max_by_key(|p| p.score)
            .map(|p| (p.name.clone(), p.score));
        if let Some((name, score)) = winner {
            self.system(format!("Game over! {} wins with {} points", name, score));
        }
    }

    /// Reveals one more hidden hint character for every remaining-time
    /// threshold crossed since the last tick.
    fn reveal_due_hints(&mut self) {
        let total = self.state.settings.draw_seconds.max(1);
        while self.hint_stage < HINT_REVEAL_PERCENTS.len()
            && self.state.timer * 100 <= HINT_REVEAL_PERCENTS[self.hint_stage] * total
        {
            self.reveal_one_hint_char();
            self.hint_stage += 1;
        }
    }

    fn reveal_one_hint_char(&mut self) {
        let Some(word) = self.state.word.as_ref() else {
            return;
        };
        let word_chars: Vec<char> = word.chars().collect();
        let mut hint_chars: Vec<char> = self.state.hint.chars().collect();

        let hidden: Vec<usize> = hint_chars
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == '_')
            .map(|(i, _)| i)
            .collect();
        let Some(&index) = hidden.choose(&mut rand::thread_rng()) else {
            return;
        };

        hint_chars[index] = word_chars[index];
        self.state.hint = hint_chars.into_iter().collect();
    }

    /// Awards a correct guess: base points plus a time-scaled share plus an
    /// order bonus, and drips the drawer a cut per distinct correct guesser.
    fn award_guess(&mut self, addr: &PeerAddr) {
        let total = self.state.settings.draw_seconds.max(1);
        let remaining = self.state.timer;

        let points = GUESS_BASE_POINTS
            + ceil_div(GUESS_TIME_POINTS * remaining, total)
            + ORDER_BONUS_POINTS
                .get(self.correct_count)
                .copied()
                .unwrap_or(0);
        self.correct_count += 1;

        let name = match self.state.player_mut(addr) {
            Some(player) => {
                player.score += points;
                player.has_guessed = true;
                player.name.clone()
            }
            None => return,
        };

        if let Some(drawer_addr) = self.state.drawer.clone() {
            if &drawer_addr != addr {
                let drip = ceil_div(DRAWER_DRIP_POINTS * remaining, total);
                if let Some(drawer) = self.state.player_mut(&drawer_addr) {
                    drawer.score += drip;
                }
            }
        }

        self.push_system(format!("{} guessed the word! (+{})", name, points), true);

        if self.state.all_guessed() && self.pending_end.is_none() {
            self.pending_end = Some(EARLY_END_DELAY_SECONDS);
        }
    }

    fn player_name(&self, addr: &PeerAddr) -> String {
        self.state
            .player(addr)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| addr.clone())
    }

    fn player_chat(&mut self, addr: &PeerAddr, text: String, kind: ChatKind) {
        let Some(player) = self.state.player(addr) else {
            return;
        };
        let message = ChatMessage {
            id: self.next_chat_id,
            sender: addr.clone(),
            sender_name: player.name.clone(),
            text,
            kind,
            correct: false,
            timestamp_ms: now_millis(),
        };
        self.next_chat_id += 1;
        self.state.chat.push(message);
    }

    fn system(&mut self, text: String) {
        self.push_system(text, false);
    }

    fn push_system(&mut self, text: String, correct: bool) {
        let message = ChatMessage {
            id: self.next_chat_id,
            sender: PeerAddr::new(),
            sender_name: String::new(),
            text,
            kind: ChatKind::System,
            correct,
            timestamp_ms: now_millis(),
        };
        self.next_chat_id += 1;
        self.state.chat.push(message);
    }
}
