//! SWAP accounting errors.

use alloy_primitives::Address;
use vertex_storage::StoreError;
use vertex_swarm_bandwidth_chequebook::{ChainError, ChequeError, VerifyError};
use vertex_swarm_primitives::OverlayAddress;

/// Errors that can occur during swap operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwapError {
    /// No balance has been recorded for the peer.
    #[error("no balance for peer {0}")]
    NotFound(OverlayAddress),

    /// Peer is at or past the disconnect threshold; the debit was not applied.
    #[error("peer {peer} balance {balance} reached disconnect threshold {threshold}")]
    DisconnectThreshold {
        peer: OverlayAddress,
        balance: i64,
        threshold: u64,
    },

    /// The adjustment would overflow the balance.
    #[error("balance overflow for peer {peer}: {balance} + {amount}")]
    BalanceOverflow {
        peer: OverlayAddress,
        balance: i64,
        amount: i64,
    },

    /// Peer declared the zero address as its settlement contract.
    #[error("empty contract address in handshake")]
    EmptyContractAddress,

    /// The declared address does not host the settlement contract.
    #[error("{0} is not a settlement contract")]
    NotASettlementContract(Address),

    /// Cheque signature is malformed or was not made by the contract owner.
    #[error("invalid cheque signature: {0}")]
    InvalidSignature(#[source] ChequeError),

    /// Cheque does not advance serial and cumulative amount.
    #[error(
        "cheque regression: serial {serial} amount {amount} after serial {last_serial} amount {last_amount}"
    )]
    SerialOrAmountRegression {
        serial: u64,
        amount: u64,
        last_serial: u64,
        last_amount: u64,
    },

    /// Cheque draws on a different contract than the peer announced.
    #[error("cheque contract {actual} does not match peer contract {expected}")]
    ContractMismatch { expected: Address, actual: Address },

    /// Cheque is not payable to this node.
    #[error("cheque beneficiary {actual} is not {expected}")]
    BeneficiaryMismatch { expected: Address, actual: Address },

    /// Peer did not send its handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,

    /// Peer sent a message that is not valid in the current state.
    #[error("unexpected {0} message")]
    UnexpectedMessage(&'static str),

    /// The connection closed before the exchange completed.
    #[error("connection closed")]
    ConnectionClosed,

    /// The service is shutting down.
    #[error("cancelled")]
    Cancelled,

    /// Cheque signing failed.
    #[error("cheque signing failed: {0}")]
    Cheque(#[source] ChequeError),

    /// Durable store failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Chain backend failure.
    #[error("chain error: {0}")]
    Chain(#[from] ChainError),

    /// Rejected configuration.
    #[error("invalid swap config: {0}")]
    InvalidConfig(String),
}

impl From<VerifyError> for SwapError {
    fn from(err: VerifyError) -> Self {
        match err {
            VerifyError::NotASettlementContract(address) => Self::NotASettlementContract(address),
            VerifyError::Chain(ChainError::Cancelled) => Self::Cancelled,
            VerifyError::Chain(e) => Self::Chain(e),
        }
    }
}

impl SwapError {
    /// Whether the error is a protocol violation by the remote peer.
    pub fn is_peer_fault(&self) -> bool {
        matches!(
            self,
            Self::EmptyContractAddress
                | Self::NotASettlementContract(_)
                | Self::InvalidSignature(_)
                | Self::SerialOrAmountRegression { .. }
                | Self::ContractMismatch { .. }
                | Self::BeneficiaryMismatch { .. }
                | Self::HandshakeTimeout
                | Self::UnexpectedMessage(_)
        )
    }
}
