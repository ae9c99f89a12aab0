//! The swap service.
//!
//! [`Swap`] owns the local identity, configuration, ledger and peer registry,
//! and is shared (behind an [`Arc`]) by every peer session. Accounting events
//! enter through [`Swap::add`]; when the debt to a peer reaches the payment
//! threshold a cheque is signed and emitted on that peer's session.
//!
//! # Lock Order
//!
//! The ledger lock is always taken before the peer registry lock. The
//! registry never calls back into the ledger.

use std::sync::Arc;

use alloy_primitives::U256;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vertex_storage::StateStore;
use vertex_swarm_bandwidth_chequebook::{ChainBackend, ChainError, ChequeParams, ContractVerifier, TxHash};
use vertex_swarm_net_swap::{EmitCheque, SwapConnection};
use vertex_swarm_primitives::OverlayAddress;

use crate::{
    Ledger, LedgerGuard, Owner, PeerRegistry, PeerSession, SwapConfig, SwapError, SwapPeer,
    metrics::SwapMetrics,
};

/// SWAP accounting engine.
pub struct Swap {
    owner: Owner,
    config: SwapConfig,
    ledger: Ledger,
    peers: PeerRegistry,
    backend: Arc<dyn ChainBackend>,
    verifier: ContractVerifier,
    cancel: CancellationToken,
    pub(crate) metrics: SwapMetrics,
}

impl Swap {
    /// Create the service over `store` and `backend`.
    pub fn new(
        owner: Owner,
        config: SwapConfig,
        store: Arc<dyn StateStore>,
        backend: Arc<dyn ChainBackend>,
    ) -> Self {
        let ledger = Ledger::new(store, config.disconnect_threshold());
        let verifier = ContractVerifier::new(config.contract_bytecode().clone());
        Self {
            owner,
            config,
            ledger,
            peers: PeerRegistry::default(),
            backend,
            verifier,
            cancel: CancellationToken::new(),
            metrics: SwapMetrics::default(),
        }
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn config(&self) -> &SwapConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn peers(&self) -> &PeerRegistry {
        &self.peers
    }

    pub fn backend(&self) -> &Arc<dyn ChainBackend> {
        &self.backend
    }

    pub fn verifier(&self) -> &ContractVerifier {
        &self.verifier
    }

    /// Token cancelled on [`shutdown`](Self::shutdown); sessions and
    /// background tasks stop when it fires.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Record an accounting event with `peer`, returning the resulting balance.
    ///
    /// Positive amounts mean the peer owes us more, negative amounts that we
    /// owe the peer more. When our debt reaches the payment threshold and the
    /// peer has an active session, a cheque for the whole debt is issued and
    /// the balance returns to zero.
    ///
    /// A debit refused at the disconnect threshold is retried once after
    /// paying the outstanding debt, if the peer has a session to pay on.
    pub fn add(&self, peer: &OverlayAddress, amount: i64) -> Result<i64, SwapError> {
        let mut ledger = self.ledger.lock();
        let balance = match ledger.add(peer, amount) {
            Ok(balance) => balance,
            Err(SwapError::DisconnectThreshold { .. }) if self.peers.contains(peer) => {
                self.settle_locked(&mut ledger, peer)?;
                ledger.add(peer, amount)?
            }
            Err(e) => return Err(e),
        };
        if balance >= 0 || balance.unsigned_abs() < self.config.payment_threshold() {
            return Ok(balance);
        }
        self.settle_locked(&mut ledger, peer)
    }

    /// Pay any debt to `peer` at or past the payment threshold.
    ///
    /// Called when a session becomes active so debt accrued while the peer
    /// was offline does not stay stuck at the disconnect threshold.
    pub(crate) fn settle(&self, peer: &OverlayAddress) -> Result<i64, SwapError> {
        let mut ledger = self.ledger.lock();
        self.settle_locked(&mut ledger, peer)
    }

    fn settle_locked(
        &self,
        ledger: &mut LedgerGuard<'_>,
        peer: &OverlayAddress,
    ) -> Result<i64, SwapError> {
        let balance = ledger.get(peer)?.unwrap_or(0);
        if balance >= 0 || balance.unsigned_abs() < self.config.payment_threshold() {
            return Ok(balance);
        }

        let Some(remote) = self.peers.get(peer) else {
            warn!(%peer, balance, "Payment threshold reached without an active session");
            return Ok(balance);
        };
        self.issue_cheque(ledger, &remote, balance)
    }

    /// Sign a cheque covering `balance` (negative) and send it to `remote`.
    fn issue_cheque(
        &self,
        ledger: &mut LedgerGuard<'_>,
        remote: &SwapPeer,
        balance: i64,
    ) -> Result<i64, SwapError> {
        let peer = remote.overlay();
        let debt = balance.unsigned_abs();
        let overflow = || SwapError::BalanceOverflow {
            peer,
            balance,
            amount: balance,
        };

        let (serial, amount) = match ledger.last_sent(&peer, &self.owner.contract())? {
            Some(last) => (
                last.serial().checked_add(1).ok_or_else(overflow)?,
                last.amount().checked_add(debt).ok_or_else(overflow)?,
            ),
            None => (1, debt),
        };

        let cheque = self.owner.sign(ChequeParams {
            contract: self.owner.contract(),
            serial,
            amount,
            timeout: self.config.cash_in_delay(),
            beneficiary: remote.beneficiary(),
        })?;

        ledger.record_sent(&peer, cheque.clone(), 0)?;
        self.metrics.cheques_issued_total.increment(1);
        info!(%peer, serial, amount, paid = debt, "Issued cheque");

        if remote.send(EmitCheque::new(cheque)).is_err() {
            // The next cheque carries the cumulative amount
            warn!(%peer, serial, "Session closed before cheque was delivered");
        }
        Ok(0)
    }

    /// Run the SWAP protocol with a connected peer until it disconnects.
    ///
    /// The peer is registered for the duration of the session and removed on
    /// every exit path.
    pub async fn run_peer(self: &Arc<Self>, conn: SwapConnection) -> Result<(), SwapError> {
        PeerSession::new(conn.peer).run(self, conn).await
    }

    /// Top up the local settlement contract to the configured initial deposit.
    pub async fn ensure_deposit(&self) -> Result<Option<TxHash>, SwapError> {
        let target = U256::from(self.config.initial_deposit());
        let contract = self.owner.contract();

        let current = self.backend.contract_balance(contract).await?;
        if current >= target {
            debug!(%contract, %current, "Settlement contract sufficiently funded");
            return Ok(None);
        }

        let amount = target - current;
        let tx = self.backend.deposit(contract, amount).await?;
        let receipt = self.backend.receipt(tx).await?;
        if !receipt.success {
            return Err(ChainError::Reverted(format!("deposit {tx} failed")).into());
        }
        info!(%contract, %amount, "Deposited into settlement contract");
        Ok(Some(tx))
    }

    /// Stop all sessions and close the store.
    pub fn shutdown(&self) -> Result<(), SwapError> {
        self.cancel.cancel();
        self.ledger.close()?;
        info!("Swap service stopped");
        Ok(())
    }
}
