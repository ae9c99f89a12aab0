//! Registered peers with an active SWAP session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use alloy_primitives::Address;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use vertex_swarm_net_swap::{ConnectionClosed, SwapMessage};
use vertex_swarm_primitives::OverlayAddress;

/// Lifecycle of a peer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    /// Waiting for the remote handshake.
    AwaitingHandshake,
    /// Handshake verified; cheques are exchanged.
    Active,
    /// Terminal.
    Closed,
}

/// What the handshake established about a remote peer.
#[derive(Debug, Clone)]
pub struct SwapPeer {
    overlay: OverlayAddress,
    contract: Address,
    beneficiary: Address,
    sender: mpsc::UnboundedSender<SwapMessage>,
}

impl SwapPeer {
    pub fn new(
        overlay: OverlayAddress,
        contract: Address,
        beneficiary: Address,
        sender: mpsc::UnboundedSender<SwapMessage>,
    ) -> Self {
        Self {
            overlay,
            contract,
            beneficiary,
            sender,
        }
    }

    /// Peer identity.
    pub fn overlay(&self) -> OverlayAddress {
        self.overlay
    }

    /// Settlement contract the peer pays from.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Owner of the peer's contract: signs its cheques and receives ours.
    pub fn beneficiary(&self) -> Address {
        self.beneficiary
    }

    /// Queue a message on the peer's connection.
    pub fn send(&self, msg: impl Into<SwapMessage>) -> Result<(), ConnectionClosed> {
        self.sender.send(msg.into()).map_err(|_| ConnectionClosed)
    }
}

/// Peers with an active session, keyed by overlay.
///
/// Each registration gets a session id so that a stale session ending after
/// a reconnect does not remove the newer one.
#[derive(Debug, Default)]
pub struct PeerRegistry {
    next_session: AtomicU64,
    peers: RwLock<HashMap<OverlayAddress, (u64, SwapPeer)>>,
}

impl PeerRegistry {
    /// Register a peer, replacing any previous session. Returns the session id.
    pub fn register(&self, peer: SwapPeer) -> u64 {
        let session = self.next_session.fetch_add(1, Ordering::Relaxed);
        self.peers.write().insert(peer.overlay, (session, peer));
        session
    }

    /// Remove the peer if `session` is still the registered one.
    pub fn deregister(&self, overlay: &OverlayAddress, session: u64) -> bool {
        let mut peers = self.peers.write();
        if peers.get(overlay).is_some_and(|(id, _)| *id == session) {
            peers.remove(overlay);
            return true;
        }
        false
    }

    /// The registered peer for `overlay`.
    pub fn get(&self, overlay: &OverlayAddress) -> Option<SwapPeer> {
        self.peers.read().get(overlay).map(|(_, peer)| peer.clone())
    }

    /// Whether `overlay` has an active session.
    pub fn contains(&self, overlay: &OverlayAddress) -> bool {
        self.peers.read().contains_key(overlay)
    }

    /// Overlays of all registered peers.
    pub fn overlays(&self) -> Vec<OverlayAddress> {
        self.peers.read().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
