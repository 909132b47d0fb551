//! Datagram-backed [`Transport`] implementation used by the binaries.
//!
//! A thin handshake rides on top of UDP so the adapter can expose the
//! connect/accept contract: `Connect` and `Accept` frames establish a peer
//! link, `Payload` frames carry opaque game bytes, and `Close` announces a
//! graceful shutdown. Silent peer death is not detected here; that is the
//! job of the protocol-level heartbeats.
//!
//! Peer addresses are `ip:port` strings, so the host's bound address is also
//! the code players enter to join.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::transport::{PeerAddr, Transport, TransportError, TransportEvent};

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Serialize, Deserialize)]
enum Frame {
    Connect,
    Accept,
    Payload(Vec<u8>),
    Close,
}

/// A UDP endpoint implementing the transport contract.
pub struct UdpTransport {
    addr: PeerAddr,
    events: mpsc::UnboundedReceiver<TransportEvent>,
    outbound: mpsc::UnboundedSender<(SocketAddr, Frame)>,
    peers: Arc<Mutex<HashSet<SocketAddr>>>,
    pending: Arc<Mutex<HashMap<SocketAddr, oneshot::Sender<()>>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl UdpTransport {
    /// Binds a socket and spawns the receiver/sender tasks.
    pub async fn bind(bind_addr: &str) -> Result<Self, std::io::Error> {
        let socket = Arc::new(UdpSocket::bind(bind_addr).await?);
        let local = socket.local_addr()?;
        log::info!("transport listening on {}", local);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let peers = Arc::new(Mutex::new(HashSet::new()));
        let pending = Arc::new(Mutex::new(HashMap::new()));

        let receiver = tokio::spawn(Self::run_receiver(
            Arc::clone(&socket),
            event_tx,
            outbound_tx.clone(),
            Arc::clone(&peers),
            Arc::clone(&pending),
        ));
        let sender = tokio::spawn(Self::run_sender(socket, outbound_rx));

        Ok(UdpTransport {
            addr: local.to_string(),
            events: event_rx,
            outbound: outbound_tx,
            peers,
            pending,
            tasks: vec![receiver, sender],
        })
    }

    /// Continuously decodes inbound datagrams into transport events.
    async fn run_receiver(
        socket: Arc<UdpSocket>,
        events: mpsc::UnboundedSender<TransportEvent>,
        outbound: mpsc::UnboundedSender<(SocketAddr, Frame)>,
        peers: Arc<Mutex<HashSet<SocketAddr>>>,
        pending: Arc<Mutex<HashMap<SocketAddr, oneshot::Sender<()>>>>,
    ) {
        let mut buffer = [0u8; 65536];

        loop {
            let (len, from) = match socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    log::error!("error receiving datagram: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let frame = match bincode::deserialize::<Frame>(&buffer[..len]) {
                Ok(frame) => frame,
                Err(_) => {
                    log::warn!("dropping malformed datagram from {}", from);
                    continue;
                }
            };

            match frame {
                Frame::Connect => {
                    let newly_linked = match peers.lock() {
                        Ok(mut set) => set.insert(from),
                        Err(_) => return,
                    };
                    let _ = outbound.send((from, Frame::Accept));
                    if newly_linked {
                        let _ = events.send(TransportEvent::PeerConnected {
                            addr: from.to_string(),
                        });
                    }
                }
                Frame::Accept => {
                    let waiter = match pending.lock() {
                        Ok(mut map) => map.remove(&from),
                        Err(_) => return,
                    };
                    if let Some(waiter) = waiter {
                        if let Ok(mut set) = peers.lock() {
                            set.insert(from);
                        }
                        let _ = waiter.send(());
                        let _ = events.send(TransportEvent::PeerConnected {
                            addr: from.to_string(),
                        });
                    }
                }
                Frame::Payload(bytes) => {
                    let known = peers.lock().map(|set| set.contains(&from)).unwrap_or(false);
                    if known {
                        let _ = events.send(TransportEvent::Message {
                            from: from.to_string(),
                            bytes,
                        });
                    } else {
                        log::debug!("dropping payload from unknown peer {}", from);
                    }
                }
                Frame::Close => {
                    let was_known = peers
                        .lock()
                        .map(|mut set| set.remove(&from))
                        .unwrap_or(false);
                    if was_known {
                        let _ = events.send(TransportEvent::PeerDisconnected {
                            addr: from.to_string(),
                        });
                    }
                }
            }
        }
    }

    /// Drains the outbound queue onto the socket.
    async fn run_sender(
        socket: Arc<UdpSocket>,
        mut outbound: mpsc::UnboundedReceiver<(SocketAddr, Frame)>,
    ) {
        while let Some((to, frame)) = outbound.recv().await {
            match bincode::serialize(&frame) {
                Ok(bytes) => {
                    if let Err(e) = socket.send_to(&bytes, to).await {
                        log::error!("failed to send to {}: {}", to, e);
                    }
                }
                Err(e) => log::error!("failed to encode frame: {}", e),
            }
        }
    }

    fn queue(&self, to: SocketAddr, frame: Frame) {
        let _ = self.outbound.send((to, frame));
    }
}

impl Drop for UdpTransport {
    fn drop(&mut self) {
        if let Ok(peers) = self.peers.lock() {
            for peer in peers.iter() {
                let _ = self.outbound.send((*peer, Frame::Close));
            }
        }
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl Transport for UdpTransport {
    fn local_addr(&self) -> &PeerAddr {
        &self.addr
    }

    async fn connect(&self, addr: &PeerAddr) -> Result<(), TransportError> {
        let target: SocketAddr = addr
            .parse()
            .map_err(|_| TransportError::Unreachable(addr.clone()))?;

        let (tx, rx) = oneshot::channel();
        match self.pending.lock() {
            Ok(mut map) => {
                map.insert(target, tx);
            }
            Err(_) => return Err(TransportError::Closed),
        }

        self.queue(target, Frame::Connect);

        match tokio::time::timeout(HANDSHAKE_TIMEOUT, rx).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                if let Ok(mut map) = self.pending.lock() {
                    map.remove(&target);
                }
                Err(TransportError::Unreachable(addr.clone()))
            }
        }
    }

    fn send(&self, addr: &PeerAddr, bytes: Vec<u8>) {
        if let Ok(target) = addr.parse::<SocketAddr>() {
            self.queue(target, Frame::Payload(bytes));
        } else {
            log::debug!("dropping send to unparseable address {}", addr);
        }
    }

    fn broadcast(&self, bytes: Vec<u8>) {
        let targets: Vec<SocketAddr> = match self.peers.lock() {
            Ok(set) => set.iter().copied().collect(),
            Err(_) => return,
        };
        for target in targets {
            self.queue(target, Frame::Payload(bytes.clone()));
        }
    }

    async fn recv(&mut self) -> Option<TransportEvent> {
        self.events.recv().await
    }
}
