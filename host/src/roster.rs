//! Host-side liveness and abuse bookkeeping for connected peers.
//!
//! The roster tracks *connections*, not players: when a peer was last heard
//! from, whether its silence has already been flagged, and its chat rate
//! budget. Player records themselves live in the session state and are never
//! deleted; the roster only decides when to flip their soft-disconnect
//! marker.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::info;
use shared::transport::PeerAddr;
use shared::validation::RateLimiter;

struct PeerRecord {
    last_seen: Instant,
    timed_out: bool,
    chat_limiter: RateLimiter,
}

impl PeerRecord {
    fn new() -> Self {
        PeerRecord {
            last_seen: Instant::now(),
            timed_out: false,
            chat_limiter: RateLimiter::default(),
        }
    }
}

/// Liveness tracker for every peer that ever sent us a message.
pub struct Roster {
    peers: HashMap<PeerAddr, PeerRecord>,
    timeout: Duration,
}

impl Roster {
    pub fn new(timeout: Duration) -> Self {
        Roster {
            peers: HashMap::new(),
            timeout,
        }
    }

    /// Records activity from a peer, registering it on first contact and
    /// rearming timeout detection.
    pub fn touch(&mut self, addr: &PeerAddr) {
        let record = self
            .peers
            .entry(addr.clone())
            .or_insert_with(PeerRecord::new);
        record.last_seen = Instant::now();
        record.timed_out = false;
    }

    /// Whether a chat message from this peer fits its rate budget.
    pub fn allow_chat(&mut self, addr: &PeerAddr) -> bool {
        self.peers
            .entry(addr.clone())
            .or_insert_with(PeerRecord::new)
            .chat_limiter
            .allow()
    }

    /// Peers that crossed the silence threshold since the last check.
    /// Each silence period is reported once; activity rearms the check.
    pub fn check_timeouts(&mut self) -> Vec<PeerAddr> {
        let mut newly_silent = Vec::new();
        for (addr, record) in &mut self.peers {
            if record.timed_out {
                continue;
            }
            if record.last_seen.elapsed() > self.timeout {
                record.timed_out = true;
                info!("peer {} went silent", addr);
                newly_silent.push(addr.clone());
            }
        }
        newly_silent
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
