//! Per-connection SWAP protocol state machine.
//!
//! ```text
//! AwaitingHandshake --handshake verified--> Active --disconnect--> Closed
//!         |                                    |
//!         +------------failure-----------------+---------> Closed
//! ```
//!
//! Both sides send their handshake immediately. The remote contract must host
//! the settlement bytecode and its owner becomes the peer's beneficiary, the
//! only key whose cheques are accepted on this session.

use std::sync::Arc;

use alloy_primitives::Address;
use tracing::{debug, info, warn};
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_net_swap::{ErrorMessage, Handshake, SwapConnection, SwapMessage};
use vertex_swarm_primitives::OverlayAddress;

use crate::{SessionState, Swap, SwapError, SwapPeer, cashout};

/// One SWAP session with a connected peer.
#[derive(Debug)]
pub struct PeerSession {
    overlay: OverlayAddress,
    state: SessionState,
    peer: Option<SwapPeer>,
}

impl PeerSession {
    pub fn new(overlay: OverlayAddress) -> Self {
        Self {
            overlay,
            state: SessionState::AwaitingHandshake,
            peer: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The peer established by the handshake.
    pub fn peer(&self) -> Option<&SwapPeer> {
        self.peer.as_ref()
    }

    /// Drive the session until the connection closes, the service shuts down
    /// or the peer violates the protocol.
    pub async fn run(&mut self, swap: &Arc<Swap>, mut conn: SwapConnection) -> Result<(), SwapError> {
        let overlay = self.overlay;

        let peer = match self.handshake(swap, &mut conn).await {
            Ok(peer) => peer,
            Err(e) => {
                swap.metrics.handshakes_failed_total.increment(1);
                warn!(%overlay, error = %e, "Swap handshake failed");
                if e.is_peer_fault() {
                    let _ = conn.send(ErrorMessage::new(e.to_string()));
                }
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        let session = swap.peers().register(peer.clone());
        swap.metrics.active_peers.increment(1.0);
        let _registration = scopeguard::guard((), |()| {
            swap.peers().deregister(&overlay, session);
            swap.metrics.active_peers.decrement(1.0);
            debug!(%overlay, "Swap peer deregistered");
        });

        self.peer = Some(peer.clone());
        self.state = SessionState::Active;
        // Debt accrued while the peer was away is paid as soon as it is reachable
        let balance = swap.settle(&overlay)?;
        info!(
            %overlay,
            contract = %peer.contract(),
            beneficiary = %peer.beneficiary(),
            balance,
            "Swap session active"
        );

        let result = self.serve(swap, &peer, &mut conn).await;
        self.state = SessionState::Closed;
        result
    }

    async fn handshake(
        &self,
        swap: &Swap,
        conn: &mut SwapConnection,
    ) -> Result<SwapPeer, SwapError> {
        conn.send(Handshake::new(swap.owner().contract()))
            .map_err(|_| SwapError::ConnectionClosed)?;

        let cancel = swap.cancellation_token();
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            msg = tokio::time::timeout(swap.config().handshake_timeout(), conn.recv()) => {
                msg.map_err(|_| SwapError::HandshakeTimeout)?
            }
        };

        let contract = match received {
            None => return Err(SwapError::ConnectionClosed),
            Some(SwapMessage::Handshake(Handshake { contract })) => contract,
            Some(other) => return Err(SwapError::UnexpectedMessage(other.kind())),
        };
        if contract == Address::ZERO {
            return Err(SwapError::EmptyContractAddress);
        }

        swap.verifier()
            .verify(&**swap.backend(), contract, &cancel)
            .await?;

        let beneficiary = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(SwapError::Cancelled),
            owner = swap.backend().contract_owner(contract) => owner?,
        };

        debug!(overlay = %self.overlay, %contract, %beneficiary, "Swap handshake verified");
        Ok(SwapPeer::new(self.overlay, contract, beneficiary, conn.sender()))
    }

    async fn serve(
        &mut self,
        swap: &Arc<Swap>,
        peer: &SwapPeer,
        conn: &mut SwapConnection,
    ) -> Result<(), SwapError> {
        let overlay = self.overlay;
        let cancel = swap.cancellation_token();

        loop {
            let msg = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SwapError::Cancelled),
                msg = conn.recv() => msg,
            };

            let result = match msg {
                None => {
                    debug!(%overlay, "Swap connection closed");
                    return Ok(());
                }
                Some(SwapMessage::Error(ErrorMessage { message })) => {
                    warn!(%overlay, %message, "Peer reported swap error");
                    continue;
                }
                Some(SwapMessage::Handshake(_)) => Err(SwapError::UnexpectedMessage("handshake")),
                Some(SwapMessage::EmitCheque(emit)) => {
                    receive_cheque(swap, peer, emit.cheque).map(|_| ()).inspect_err(|e| {
                        if e.is_peer_fault() {
                            swap.metrics.cheques_rejected_total.increment(1);
                        }
                    })
                }
            };

            if let Err(e) = result {
                if e.is_peer_fault() {
                    warn!(%overlay, error = %e, "Rejected swap message, closing session");
                    let _ = peer.send(ErrorMessage::new(e.to_string()));
                }
                return Err(e);
            }
        }
    }
}

/// Validate a cheque from `peer` and credit it against our balance.
///
/// Checks run in order: contract, beneficiary, signature, then serial and
/// amount against the last accepted cheque. Nothing is recorded unless every
/// check passes. Returns the new balance.
pub(crate) fn receive_cheque(
    swap: &Arc<Swap>,
    peer: &SwapPeer,
    cheque: Cheque,
) -> Result<i64, SwapError> {
    let overlay = peer.overlay();

    if cheque.contract() != peer.contract() {
        return Err(SwapError::ContractMismatch {
            expected: peer.contract(),
            actual: cheque.contract(),
        });
    }
    let own = swap.owner().address();
    if cheque.beneficiary() != own {
        return Err(SwapError::BeneficiaryMismatch {
            expected: own,
            actual: cheque.beneficiary(),
        });
    }
    cheque
        .verify(peer.beneficiary())
        .map_err(SwapError::InvalidSignature)?;

    let mut ledger = swap.ledger().lock();
    let last = ledger.last_received(&overlay, &peer.contract())?;
    let (last_serial, last_amount) = last.as_ref().map_or((0, 0), |c| (c.serial(), c.amount()));
    if cheque.serial() <= last_serial || cheque.amount() < last_amount {
        return Err(SwapError::SerialOrAmountRegression {
            serial: cheque.serial(),
            amount: cheque.amount(),
            last_serial,
            last_amount,
        });
    }

    let balance = ledger.get(&overlay)?.unwrap_or(0);
    let delta = cheque.amount() - last_amount;
    let overflow = SwapError::BalanceOverflow {
        peer: overlay,
        balance,
        amount: i64::MIN,
    };
    let new_balance = i64::try_from(delta)
        .ok()
        .and_then(|delta| balance.checked_sub(delta))
        .ok_or(overflow)?;

    ledger.record_received(&overlay, cheque.clone(), new_balance)?;
    drop(ledger);

    swap.metrics.cheques_received_total.increment(1);
    info!(
        %overlay,
        serial = cheque.serial(),
        amount = cheque.amount(),
        paid = delta,
        balance = new_balance,
        "Received cheque"
    );

    if swap.config().auto_cashout() && delta > 0 {
        tokio::spawn(cashout::cash_out(Arc::clone(swap), cheque));
    }
    Ok(new_balance)
}
