//! Local node identity for settlement.

use alloy_primitives::Address;
use alloy_signer_local::PrivateKeySigner;
use vertex_swarm_bandwidth_chequebook::{Cheque, ChequeParams};

use crate::SwapError;

/// Signing key, derived address and settlement contract of the local node.
///
/// The address is the owner of `contract` and the beneficiary of cheques
/// that peers send us.
#[derive(Debug, Clone)]
pub struct Owner {
    signer: PrivateKeySigner,
    contract: Address,
}

impl Owner {
    pub fn new(signer: PrivateKeySigner, contract: Address) -> Self {
        Self { signer, contract }
    }

    /// On-chain address derived from the signing key.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Local settlement contract.
    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Sign cheque parameters with the local key.
    pub fn sign(&self, params: ChequeParams) -> Result<Cheque, SwapError> {
        params.sign(&self.signer).map_err(SwapError::Cheque)
    }
}
