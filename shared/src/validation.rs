//! Input validation shared by both sides of the wire.
//!
//! Clients use these checks as a courtesy before transmitting; the host
//! re-checks every value that touches shared state. The host is the final
//! arbiter, so nothing here is a security boundary.

use std::time::{Duration, Instant};

pub const MAX_NAME_LEN: usize = 20;
pub const MAX_GUESS_LEN: usize = 100;
pub const MAX_WORD_LEN: usize = 50;

/// Display name: non-empty after trimming, at most 20 characters.
pub fn valid_player_name(name: &str) -> bool {
    let trimmed = name.trim();
    !trimmed.is_empty() && trimmed.chars().count() <= MAX_NAME_LEN
}

/// Trims and truncates a display name to the allowed length.
pub fn sanitize_name(name: &str) -> String {
    name.trim().chars().take(MAX_NAME_LEN).collect()
}

/// Chat text or guess: non-empty after trimming, under 100 characters.
pub fn valid_guess(guess: &str) -> bool {
    let trimmed = guess.trim();
    !trimmed.is_empty() && trimmed.chars().count() < MAX_GUESS_LEN
}

/// Trims and truncates chat text to the allowed length.
pub fn sanitize_message(message: &str) -> String {
    message.trim().chars().take(MAX_GUESS_LEN).collect()
}

/// Word selection: non-empty after trimming, under 50 characters.
pub fn valid_word(word: &str) -> bool {
    let trimmed = word.trim();
    !trimmed.is_empty() && trimmed.chars().count() < MAX_WORD_LEN
}

/// Game settings: 1-20 rounds, 10-300 seconds of drawing time.
pub fn valid_settings(rounds: u32, draw_seconds: u32) -> Result<(), &'static str> {
    if !(1..=20).contains(&rounds) {
        return Err("rounds must be between 1 and 20");
    }
    if !(10..=300).contains(&draw_seconds) {
        return Err("draw time must be between 10 and 300 seconds");
    }
    Ok(())
}

/// A submitted drawing must be a data-URL image of plausible size.
pub fn valid_drawing_data(data: &str) -> Result<(), &'static str> {
    if !data.starts_with("data:image") {
        return Err("not an image payload");
    }
    if data.len() < 100 {
        return Err("drawing appears to be blank");
    }
    Ok(())
}

/// Sliding-window rate limiter for chat traffic.
pub struct RateLimiter {
    timestamps: Vec<Instant>,
    max_messages: usize,
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(5, Duration::from_secs(1))
    }
}

impl RateLimiter {
    pub fn new(max_messages: usize, window: Duration) -> Self {
        RateLimiter {
            timestamps: Vec::new(),
            max_messages,
            window,
        }
    }

    /// Records a send attempt; false means the window is full and the
    /// message should be dropped.
    pub fn allow(&mut self) -> bool {
        let now = Instant::now();
        self.timestamps.retain(|t| now.duration_since(*t) < self.window);

        if self.timestamps.len() < self.max_messages {
            self.timestamps.push(now);
            true
        } else {
            false
        }
    }

    pub fn reset(&mut self) {
        self.timestamps.clear();
    }
}
