pub mod protocol;
pub mod resilience;
pub mod state;
pub mod transport;
pub mod udp;
pub mod validation;
pub mod words;

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of candidate words offered to the drawer each turn.
pub const WORD_CHOICE_COUNT: usize = 3;
/// Seconds the drawer gets to pick a word before the host picks for them.
pub const SELECTION_SECONDS: u32 = 30;
/// Seconds the turn-results screen stays up before the next turn starts.
pub const RESULTS_SECONDS: u32 = 5;
/// Delay between the last correct guess and the early turn end, so the
/// success announcement lands before the reveal.
pub const EARLY_END_DELAY_SECONDS: u32 = 2;

/// Flat points for any correct guess.
pub const GUESS_BASE_POINTS: u32 = 50;
/// Maximum time-scaled points for a correct guess.
pub const GUESS_TIME_POINTS: u32 = 450;
/// Extra points for guessing first and second; later guessers get none.
pub const ORDER_BONUS_POINTS: [u32; 2] = [50, 25];
/// Maximum time-scaled points dripped to the drawer per correct guesser.
pub const DRAWER_DRIP_POINTS: u32 = 100;
/// Remaining-time percentages at which one more hint character is revealed.
pub const HINT_REVEAL_PERCENTS: [u32; 3] = [75, 50, 25];

/// Stroke samples per batch; a batch is also flushed on pen-up.
pub const STROKE_BATCH_SIZE: usize = 5;
/// Raster snapshots kept for undo.
pub const UNDO_HISTORY_LIMIT: usize = 20;

/// Cadence at which peers send heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(3);
/// Silence threshold after which a peer is considered gone dark.
pub const HEARTBEAT_TIMEOUT: Duration = Duration::from_secs(8);

/// Current timestamp in milliseconds since the Unix epoch.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_timeout_exceeds_interval() {
        assert!(HEARTBEAT_TIMEOUT > HEARTBEAT_INTERVAL);
    }

    #[test]
    fn hint_percents_are_descending() {
        for pair in HINT_REVEAL_PERCENTS.windows(2) {
            assert!(pair[0] > pair[1]);
        }
    }

    #[test]
    fn now_millis_is_monotonic_enough() {
        let a = now_millis();
        std::thread::sleep(Duration::from_millis(2));
        let b = now_millis();
        assert!(b > a);
    }
}
