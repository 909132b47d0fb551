//! The transport adapter contract and an in-process implementation.
//!
//! The game never talks to sockets directly: host and client controllers are
//! generic over [`Transport`], which exposes exactly the surface a
//! peer-to-peer data channel library provides — claim an address, connect to
//! a remote address, unicast, broadcast, and a stream of connection/message
//! events. One underlying channel per remote peer, ordered per pair.
//!
//! [`MemoryNetwork`] wires transports together over tokio channels and backs
//! every integration test; [`crate::udp`] provides a datagram-backed
//! implementation for the binaries.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use rand::Rng;
use tokio::sync::mpsc;

/// A short, human-shareable peer address. The host's own address doubles as
/// the room code players type to join.
pub type PeerAddr = String;

const ROOM_CODE_LEN: usize = 5;
// No I, O, 0 or 1: codes get read out loud across the room.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Generates a fresh room code.
pub fn generate_room_code() -> PeerAddr {
    let mut rng = rand::thread_rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.gen_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Events surfaced by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    PeerConnected { addr: PeerAddr },
    PeerDisconnected { addr: PeerAddr },
    Message { from: PeerAddr, bytes: Vec<u8> },
}

/// Connection-layer failures. Gameplay sends are fire-and-forget and never
/// produce errors; only address claiming and connecting can fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    Unreachable(PeerAddr),
    AddressTaken(PeerAddr),
    Closed,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Unreachable(addr) => write!(f, "peer {} is unreachable", addr),
            TransportError::AddressTaken(addr) => write!(f, "address {} is already taken", addr),
            TransportError::Closed => write!(f, "transport is closed"),
        }
    }
}

impl std::error::Error for TransportError {}

/// The narrow interface the session controllers consume.
pub trait Transport: Send + 'static {
    /// The address this transport claimed at initialization.
    fn local_addr(&self) -> &PeerAddr;

    /// Establishes a channel to a remote address; fails on unreachable or
    /// rejecting peers. Awaits the underlying handshake.
    fn connect(&self, addr: &PeerAddr)
        -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Best-effort unicast; silently dropped if the peer is not connected.
    fn send(&self, addr: &PeerAddr, bytes: Vec<u8>);

    /// Best-effort send to every currently open channel.
    fn broadcast(&self, bytes: Vec<u8>);

    /// Next transport event; `None` once the transport is closed.
    fn recv(&mut self) -> impl Future<Output = Option<TransportEvent>> + Send;
}

#[derive(Default)]
struct NetworkInner {
    peers: HashMap<PeerAddr, mpsc::UnboundedSender<TransportEvent>>,
    links: HashMap<PeerAddr, HashSet<PeerAddr>>,
}

impl NetworkInner {
    fn push(&self, addr: &PeerAddr, event: TransportEvent) {
        if let Some(tx) = self.peers.get(addr) {
            let _ = tx.send(event);
        }
    }

    fn linked(&self, a: &PeerAddr, b: &PeerAddr) -> bool {
        self.links.get(a).map(|set| set.contains(b)).unwrap_or(false)
    }
}

/// An in-process peer address space. Cloning shares the same network.
#[derive(Clone, Default)]
pub struct MemoryNetwork {
    inner: Arc<Mutex<NetworkInner>>,
}

impl MemoryNetwork {
    pub fn new() -> Self {
        MemoryNetwork::default()
    }

    /// Claims an address on this network. With `None`, a fresh room code is
    /// generated; a desired address fails if another peer holds it.
    pub fn open(&self, desired: Option<&str>) -> Result<MemoryTransport, TransportError> {
        let Ok(mut inner) = self.inner.lock() else {
            return Err(TransportError::Closed);
        };

        let addr = match desired {
            Some(addr) => {
                if inner.peers.contains_key(addr) {
                    return Err(TransportError::AddressTaken(addr.to_string()));
                }
                addr.to_string()
            }
            None => loop {
                let code = generate_room_code();
                if !inner.peers.contains_key(&code) {
                    break code;
                }
            },
        };

        let (tx, rx) = mpsc::unbounded_channel();
        inner.peers.insert(addr.clone(), tx);
        inner.links.entry(addr.clone()).or_default();

        Ok(MemoryTransport {
            addr,
            network: Arc::clone(&self.inner),
            events: rx,
            silent: false,
        })
    }
}

/// One peer's endpoint on a [`MemoryNetwork`].
pub struct MemoryTransport {
    addr: PeerAddr,
    network: Arc<Mutex<NetworkInner>>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    silent: bool,
}

impl MemoryTransport {
    /// Deregisters without notifying linked peers, simulating a process that
    /// dies silently. Peers only find out through heartbeat timeouts.
    pub fn vanish(mut self) {
        self.silent = true;
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let Ok(mut inner) = self.network.lock() else {
            return;
        };
        inner.peers.remove(&self.addr);
        let linked = inner.links.remove(&self.addr).unwrap_or_default();
        for peer in linked {
            if let Some(set) = inner.links.get_mut(&peer) {
                set.remove(&self.addr);
            }
            if !self.silent {
                inner.push(
                    &peer,
                    TransportEvent::PeerDisconnected {
                        addr: self.addr.clone(),
                    },
                );
            }
        }
    }
}

impl Transport for MemoryTransport {
    fn local_addr(&self) -> &PeerAddr {
        &self.addr
    }

    async fn connect(&self, addr: &PeerAddr) -> Result<(), TransportError> {
        let Ok(mut inner) = self.network.lock() else {
            return Err(TransportError::Closed);
        };

        if !inner.peers.contains_key(addr) {
            return Err(TransportError::Unreachable(addr.clone()));
        }

        inner
            .links
            .entry(self.addr.clone())
            .or_default()
            .insert(addr.clone());
        inner
            .links
            .entry(addr.clone())
            .or_default()
            .insert(self.addr.clone());

        inner.push(
            addr,
            TransportEvent::PeerConnected {
                addr: self.addr.clone(),
            },
        );
        inner.push(
            &self.addr,
            TransportEvent::PeerConnected { addr: addr.clone() },
        );

        Ok(())
    }

    fn send(&self, addr: &PeerAddr, bytes: Vec<u8>) {
        let Ok(inner) = self.network.lock() else {
            return;
        };
        if inner.linked(&self.addr, addr) {
            inner.push(
                addr,
                TransportEvent::Message {
                    from: self.addr.clone(),
                    bytes,
                },
            );
        } else {
            log::debug!("dropping send from {} to unlinked peer {}", self.addr, addr);
        }
    }

    fn broadcast(&self, bytes: Vec<u8>) {
        let Ok(inner) = self.network.lock() else {
            return;
        };
        if let Some(linked) = inner.links.get(&self.addr) {
            for peer in linked {
                inner.push(
                    peer,
                    TransportEvent::Message {
                        from: self.addr.clone(),
                        bytes: bytes.clone(),
                    },
                );
            }
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}
