//! Blockchain backend abstraction.
//!
//! The settlement logic only needs a narrow view of the chain: bytecode
//! lookups, a few contract reads, transaction submission and receipts, and
//! the current block time. [`ChainBackend`] captures exactly that so
//! production RPC clients and simulated chains are interchangeable.

use alloy_primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;

use crate::Cheque;

/// Transaction hash.
pub type TxHash = B256;

/// Outcome of a mined transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Receipt {
    /// Hash of the transaction.
    pub tx_hash: TxHash,
    /// Whether execution succeeded.
    pub success: bool,
    /// Timestamp of the block the transaction was included in.
    pub block_time: u64,
}

/// Errors returned by a [`ChainBackend`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// Transport or node failure.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// No contract is deployed at the address.
    #[error("no contract deployed at {0}")]
    NoContract(Address),

    /// The transaction or call reverted.
    #[error("execution reverted: {0}")]
    Reverted(String),

    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Access to the chain hosting the settlement contracts.
#[async_trait]
#[auto_impl::auto_impl(&, Arc)]
pub trait ChainBackend: Send + Sync {
    /// Runtime bytecode deployed at `address` (empty if none).
    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError>;

    /// Owner of a settlement contract, i.e. the address that signs its cheques.
    async fn contract_owner(&self, contract: Address) -> Result<Address, ChainError>;

    /// Funds held by a settlement contract.
    async fn contract_balance(&self, contract: Address) -> Result<U256, ChainError>;

    /// Deposit `amount` into a settlement contract.
    async fn deposit(&self, contract: Address, amount: U256) -> Result<TxHash, ChainError>;

    /// Submit a cheque to its contract, starting the cash-in timeout.
    async fn submit_cheque(&self, cheque: &Cheque) -> Result<TxHash, ChainError>;

    /// Pay out `amount` of submitted cheques to `beneficiary`.
    async fn cash_cheque(
        &self,
        contract: Address,
        beneficiary: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError>;

    /// Total already paid out to `beneficiary` from cheques on `contract`.
    async fn paid_out(&self, contract: Address, beneficiary: Address) -> Result<U256, ChainError>;

    /// Receipt of a mined transaction.
    async fn receipt(&self, tx: TxHash) -> Result<Receipt, ChainError>;

    /// Timestamp of the latest block, in seconds.
    async fn block_time(&self) -> Result<u64, ChainError>;
}
