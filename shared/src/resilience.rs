//! Connection resilience: exponential backoff for connection attempts and a
//! heartbeat monitor for detecting peers that go dark without a disconnect
//! event from the transport.

use std::time::Duration;

use rand::Rng;
// tokio's Instant respects a paused test clock, which matters for heartbeat
// timeouts driven by tokio timers.
use tokio::time::Instant;

/// Exponential backoff schedule: delay for attempt *n* is
/// `min(initial * 2^n, max)`, with up to 10% of additive jitter so a crowd
/// of clients reconnecting to the same host does not retry in lockstep.
#[derive(Debug, Clone)]
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::new(5, Duration::from_millis(1000), Duration::from_millis(30000))
    }
}

impl Backoff {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Backoff {
            attempt: 0,
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    /// Base delay for the current attempt.
    pub fn delay(&self) -> Duration {
        let factor = 1u32.checked_shl(self.attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Base delay plus 0-10% jitter; never less than the base.
    pub fn delay_with_jitter(&self) -> Duration {
        let delay = self.delay();
        let jitter = delay.mul_f64(rand::thread_rng().gen_range(0.0..0.1));
        delay + jitter
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }

    pub fn increment(&mut self) {
        if self.can_retry() {
            self.attempt += 1;
        }
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    /// Decides what to do with a failed attempt: `Some(delay)` means wait
    /// that long and try again, `None` means the schedule is exhausted and
    /// the error should be surfaced. The schedule never retries silently
    /// forever.
    pub fn next_delay(&mut self) -> Option<Duration> {
        if !self.can_retry() {
            return None;
        }
        let delay = self.delay_with_jitter();
        self.increment();
        Some(delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Tracks time since the last received heartbeat.
///
/// The monitor is poll-driven: the owning event loop calls [`record`] on
/// every received heartbeat and checks [`timed_out`] on its own timer tick
/// (created from [`interval`]). A timeout fires exactly once per silence
/// period and is rearmed by the next received heartbeat.
///
/// [`record`]: HeartbeatMonitor::record
/// [`timed_out`]: HeartbeatMonitor::timed_out
/// [`interval`]: HeartbeatMonitor::interval
#[derive(Debug)]
pub struct HeartbeatMonitor {
    interval: Duration,
    timeout: Duration,
    last_received: Instant,
    timeout_fired: bool,
}

impl HeartbeatMonitor {
    /// `timeout` must exceed `interval`, otherwise a healthy peer would trip
    /// the monitor between its own pings.
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        debug_assert!(timeout > interval);
        HeartbeatMonitor {
            interval,
            timeout,
            last_received: Instant::now(),
            timeout_fired: false,
        }
    }

    /// Cadence at which the owner should send its own heartbeat.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// A heartbeat arrived; rearms timeout detection.
    pub fn record(&mut self) {
        self.last_received = Instant::now();
        self.timeout_fired = false;
    }

    /// True exactly once when the silence threshold is crossed.
    pub fn timed_out(&mut self) -> bool {
        if self.timeout_fired {
            return false;
        }
        if self.silence() > self.timeout {
            self.timeout_fired = true;
            return true;
        }
        false
    }

    /// Elapsed time since the last received heartbeat.
    pub fn silence(&self) -> Duration {
        self.last_received.elapsed()
    }

    pub fn is_likely_disconnected(&self) -> bool {
        self.silence() > self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delay_sequence_is_deterministic() {
        let mut backoff = Backoff::new(5, Duration::from_millis(1000), Duration::from_millis(30000));

        let expected = [1000u64, 2000, 4000, 8000, 16000, 30000, 30000];
        for (i, want) in expected.iter().enumerate() {
            assert_eq!(
                backoff.delay().as_millis() as u64,
                *want,
                "attempt {} delay",
                i
            );
            // Force past max_attempts to observe the cap.
            backoff.attempt += 1;
        }
    }

    #[test]
    fn jitter_never_decreases_below_base() {
        let backoff = Backoff::new(5, Duration::from_millis(1000), Duration::from_millis(30000));
        for _ in 0..100 {
            let jittered = backoff.delay_with_jitter();
            assert!(jittered >= backoff.delay());
            assert!(jittered <= backoff.delay() + backoff.delay().mul_f64(0.1));
        }
    }

    #[test]
    fn increment_stops_at_max() {
        let mut backoff = Backoff::new(2, Duration::from_millis(10), Duration::from_millis(100));
        assert!(backoff.can_retry());
        backoff.increment();
        backoff.increment();
        assert!(!backoff.can_retry());
        backoff.increment();
        assert_eq!(backoff.attempt(), 2);

        backoff.reset();
        assert_eq!(backoff.attempt(), 0);
        assert!(backoff.can_retry());
    }

    #[test]
    fn next_delay_exhausts_after_max_attempts() {
        let mut backoff = Backoff::new(2, Duration::from_millis(10), Duration::from_millis(100));

        // Two retries are granted, then the schedule is spent.
        assert!(backoff.next_delay().is_some());
        assert!(backoff.next_delay().is_some());
        assert_eq!(backoff.next_delay(), None);
        assert_eq!(backoff.next_delay(), None);
    }

    #[test]
    fn next_delay_follows_the_schedule() {
        let mut backoff = Backoff::new(3, Duration::from_millis(100), Duration::from_millis(250));

        let first = backoff.next_delay().unwrap();
        assert!(first >= Duration::from_millis(100));
        assert!(first <= Duration::from_millis(110));

        let second = backoff.next_delay().unwrap();
        assert!(second >= Duration::from_millis(200));
        assert!(second <= Duration::from_millis(220));

        // Capped at the maximum delay (plus jitter).
        let third = backoff.next_delay().unwrap();
        assert!(third >= Duration::from_millis(250));
        assert!(third <= Duration::from_millis(275));
    }

    #[test]
    fn monitor_fires_once_per_silence_period() {
        let mut monitor =
            HeartbeatMonitor::new(Duration::from_millis(10), Duration::from_millis(50));

        assert!(!monitor.timed_out());

        monitor.last_received = Instant::now() - Duration::from_millis(100);
        assert!(monitor.is_likely_disconnected());
        assert!(monitor.timed_out());
        // Still silent, but the timeout already fired.
        assert!(!monitor.timed_out());

        // A heartbeat rearms the monitor.
        monitor.record();
        assert!(!monitor.timed_out());
        monitor.last_received = Instant::now() - Duration::from_millis(100);
        assert!(monitor.timed_out());
    }
}
