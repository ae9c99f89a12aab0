//! Per-peer balance ledger.
//!
//! # Balance Semantics
//!
//! - **Positive balance**: Peer owes us
//! - **Negative balance**: We owe peer
//!
//! Alongside the balance the ledger keeps the last cheque sent to and the last
//! cheque received from every peer, per settlement contract, so serials and
//! cumulative amounts survive restarts and a peer's new contract starts its
//! own series.
//!
//! # Persistence
//!
//! Every mutation is written to the [`StateStore`] before the in-memory copy
//! is updated; a failed write leaves the ledger unchanged. Entries are loaded
//! lazily on first access. Persisted records always win over the implicit
//! zero balance of an unknown peer.
//!
//! # Locking
//!
//! A single mutex serializes all mutations. [`Ledger::lock`] hands out a
//! [`LedgerGuard`] so multi-step updates (issue a cheque and zero the debt)
//! are applied atomically with respect to other peers' sessions.

use std::collections::HashMap;
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};
use vertex_storage::{StateStore, StateStoreExt, decode_value, encode_value};
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_primitives::{OverlayAddress, overlay_key};

use crate::{
    SwapError,
    constants::{BALANCE_PREFIX, RECEIVED_CHEQUE_PREFIX, SENT_CHEQUE_PREFIX},
};

pub(crate) fn balance_key(peer: &OverlayAddress) -> String {
    format!("{BALANCE_PREFIX}{}", overlay_key(peer))
}

pub(crate) fn sent_cheque_key(peer: &OverlayAddress, contract: &Address) -> String {
    format!("{SENT_CHEQUE_PREFIX}{}_{contract:x}", overlay_key(peer))
}

pub(crate) fn received_cheque_key(peer: &OverlayAddress, contract: &Address) -> String {
    format!("{RECEIVED_CHEQUE_PREFIX}{}_{contract:x}", overlay_key(peer))
}

/// Cheque series are scoped to a peer and the contract they draw on.
type ChequeSeries = (OverlayAddress, Address);

#[derive(Default)]
struct LedgerState {
    balances: HashMap<OverlayAddress, i64>,
    sent: HashMap<ChequeSeries, Cheque>,
    received: HashMap<ChequeSeries, Cheque>,
}

/// Durable per-peer balances and cheque history.
pub struct Ledger {
    store: Arc<dyn StateStore>,
    disconnect_threshold: u64,
    state: Mutex<LedgerState>,
}

impl Ledger {
    /// Create a ledger over `store`. Nothing is loaded until first access.
    pub fn new(store: Arc<dyn StateStore>, disconnect_threshold: u64) -> Self {
        Self {
            store,
            disconnect_threshold,
            state: Mutex::new(LedgerState::default()),
        }
    }

    /// Debt owed to a peer beyond which further debits are refused.
    pub fn disconnect_threshold(&self) -> u64 {
        self.disconnect_threshold
    }

    /// Acquire the ledger lock.
    pub fn lock(&self) -> LedgerGuard<'_> {
        LedgerGuard {
            ledger: self,
            state: self.state.lock(),
        }
    }

    /// Current balance of `peer`; [`SwapError::NotFound`] before the first booking.
    pub fn balance(&self, peer: &OverlayAddress) -> Result<i64, SwapError> {
        self.lock().balance(peer)
    }

    /// Apply a signed adjustment, returning the new balance.
    pub fn add(&self, peer: &OverlayAddress, amount: i64) -> Result<i64, SwapError> {
        self.lock().add(peer, amount)
    }

    /// Snapshot of every known balance, persisted or in memory.
    pub fn balances(&self) -> Result<HashMap<OverlayAddress, i64>, SwapError> {
        let state = self.state.lock();

        let mut balances = HashMap::new();
        for (key, value) in self.store.iter_prefix(BALANCE_PREFIX)? {
            let Some(peer) = key
                .strip_prefix(BALANCE_PREFIX)
                .and_then(|hex| hex.parse::<B256>().ok())
            else {
                warn!(%key, "Skipping malformed balance key");
                continue;
            };
            balances.insert(peer, decode_value::<i64>(&key, &value)?);
        }
        balances.extend(state.balances.iter().map(|(peer, balance)| (*peer, *balance)));
        Ok(balances)
    }

    /// Last cheque sent to `peer` drawn on `contract`.
    pub fn last_sent_cheque(
        &self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError> {
        self.lock().last_sent(peer, contract)
    }

    /// Last cheque received from `peer` drawn on `contract`.
    pub fn last_received_cheque(
        &self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError> {
        self.lock().last_received(peer, contract)
    }

    /// Close the underlying store.
    pub fn close(&self) -> Result<(), SwapError> {
        let _state = self.state.lock();
        self.store.close()?;
        Ok(())
    }
}

/// Exclusive access to the ledger.
pub struct LedgerGuard<'a> {
    ledger: &'a Ledger,
    state: MutexGuard<'a, LedgerState>,
}

impl LedgerGuard<'_> {
    /// Current balance of `peer`; [`SwapError::NotFound`] before the first booking.
    pub fn balance(&mut self, peer: &OverlayAddress) -> Result<i64, SwapError> {
        self.get(peer)?.ok_or(SwapError::NotFound(*peer))
    }

    /// Current balance of `peer`, `None` before the first booking.
    pub fn get(&mut self, peer: &OverlayAddress) -> Result<Option<i64>, SwapError> {
        if let Some(balance) = self.state.balances.get(peer) {
            return Ok(Some(*balance));
        }

        let stored: Option<i64> = self.ledger.store.get_value(&balance_key(peer))?;
        if let Some(balance) = stored {
            debug!(%peer, balance, "Loaded balance");
            self.state.balances.insert(*peer, balance);
        }
        Ok(stored)
    }

    /// Apply a signed adjustment, returning the new balance.
    ///
    /// Debits are refused with [`SwapError::DisconnectThreshold`] once the
    /// balance is at or below `-disconnect_threshold`; credits always apply.
    pub fn add(&mut self, peer: &OverlayAddress, amount: i64) -> Result<i64, SwapError> {
        let balance = self.get(peer)?.unwrap_or(0);

        let threshold = self.ledger.disconnect_threshold;
        if amount < 0 && balance <= threshold_floor(threshold) {
            warn!(%peer, balance, amount, threshold, "Disconnect threshold reached, debit refused");
            return Err(SwapError::DisconnectThreshold {
                peer: *peer,
                balance,
                threshold,
            });
        }

        let new_balance = balance.checked_add(amount).ok_or(SwapError::BalanceOverflow {
            peer: *peer,
            balance,
            amount,
        })?;

        self.ledger.store.put_value(&balance_key(peer), &new_balance)?;
        self.state.balances.insert(*peer, new_balance);
        debug!(%peer, amount, balance = new_balance, "Balance updated");
        Ok(new_balance)
    }

    /// Last cheque sent to `peer` drawn on `contract`.
    pub fn last_sent(
        &mut self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError> {
        let series = (*peer, *contract);
        if let Some(cheque) = self.state.sent.get(&series) {
            return Ok(Some(cheque.clone()));
        }
        let stored: Option<Cheque> =
            self.ledger.store.get_value(&sent_cheque_key(peer, contract))?;
        if let Some(cheque) = &stored {
            self.state.sent.insert(series, cheque.clone());
        }
        Ok(stored)
    }

    /// Last cheque received from `peer` drawn on `contract`.
    pub fn last_received(
        &mut self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError> {
        let series = (*peer, *contract);
        if let Some(cheque) = self.state.received.get(&series) {
            return Ok(Some(cheque.clone()));
        }
        let stored: Option<Cheque> =
            self.ledger.store.get_value(&received_cheque_key(peer, contract))?;
        if let Some(cheque) = &stored {
            self.state.received.insert(series, cheque.clone());
        }
        Ok(stored)
    }

    /// Persist a cheque sent to `peer` together with the resulting balance.
    pub fn record_sent(
        &mut self,
        peer: &OverlayAddress,
        cheque: Cheque,
        balance: i64,
    ) -> Result<(), SwapError> {
        let key = sent_cheque_key(peer, &cheque.contract());
        self.persist(peer, (key, &cheque), balance)?;
        self.state.sent.insert((*peer, cheque.contract()), cheque);
        Ok(())
    }

    /// Persist a cheque received from `peer` together with the resulting balance.
    pub fn record_received(
        &mut self,
        peer: &OverlayAddress,
        cheque: Cheque,
        balance: i64,
    ) -> Result<(), SwapError> {
        let key = received_cheque_key(peer, &cheque.contract());
        self.persist(peer, (key, &cheque), balance)?;
        self.state.received.insert((*peer, cheque.contract()), cheque);
        Ok(())
    }

    fn persist(
        &mut self,
        peer: &OverlayAddress,
        (cheque_key, cheque): (String, &Cheque),
        balance: i64,
    ) -> Result<(), SwapError> {
        let balance_key = balance_key(peer);
        let batch = [
            (cheque_key.clone(), encode_value(&cheque_key, cheque)?),
            (balance_key.clone(), encode_value(&balance_key, &balance)?),
        ];
        self.ledger.store.put_batch(&batch)?;
        self.state.balances.insert(*peer, balance);
        Ok(())
    }
}

/// Lowest balance at which debits are still accepted.
fn threshold_floor(disconnect_threshold: u64) -> i64 {
    i64::try_from(disconnect_threshold).map_or(i64::MIN, |t| -t)
}
