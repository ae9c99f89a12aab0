//! Read access to SWAP accounting state.

use std::collections::HashMap;

use alloy_primitives::Address;
use vertex_swarm_bandwidth_chequebook::Cheque;
use vertex_swarm_primitives::OverlayAddress;

use crate::{Swap, SwapError};

/// Query surface for balances and cheque history.
#[auto_impl::auto_impl(&, Arc)]
pub trait SwapApi: Send + Sync {
    /// Balance with `peer`; positive when the peer owes us.
    fn balance(&self, peer: &OverlayAddress) -> Result<i64, SwapError>;

    /// Every known balance.
    fn balances(&self) -> Result<HashMap<OverlayAddress, i64>, SwapError>;

    /// Last cheque we issued to `peer` from our own contract.
    fn last_sent_cheque(&self, peer: &OverlayAddress) -> Result<Option<Cheque>, SwapError>;

    /// Last cheque accepted from `peer` drawn on `contract`.
    fn last_received_cheque(
        &self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError>;
}

impl SwapApi for Swap {
    fn balance(&self, peer: &OverlayAddress) -> Result<i64, SwapError> {
        self.ledger().balance(peer)
    }

    fn balances(&self) -> Result<HashMap<OverlayAddress, i64>, SwapError> {
        self.ledger().balances()
    }

    fn last_sent_cheque(&self, peer: &OverlayAddress) -> Result<Option<Cheque>, SwapError> {
        self.ledger().last_sent_cheque(peer, &self.owner().contract())
    }

    fn last_received_cheque(
        &self,
        peer: &OverlayAddress,
        contract: &Address,
    ) -> Result<Option<Cheque>, SwapError> {
        self.ledger().last_received_cheque(peer, contract)
    }
}
