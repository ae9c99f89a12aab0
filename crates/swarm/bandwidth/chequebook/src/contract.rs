//! Settlement contract verification.

use alloy_primitives::{Address, Bytes};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{ChainBackend, ChainError};

/// Errors from [`ContractVerifier::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// The address does not host the expected settlement contract bytecode.
    #[error("{0} is not a settlement contract")]
    NotASettlementContract(Address),

    /// The bytecode could not be fetched.
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Checks that an address hosts the expected settlement contract.
///
/// The runtime bytecode is compared byte for byte; an empty account never
/// matches.
#[derive(Debug, Clone)]
pub struct ContractVerifier {
    expected: Bytes,
}

impl ContractVerifier {
    /// Create a verifier for the given runtime bytecode.
    pub fn new(expected: impl Into<Bytes>) -> Self {
        Self {
            expected: expected.into(),
        }
    }

    /// Expected runtime bytecode.
    pub fn expected(&self) -> &Bytes {
        &self.expected
    }

    /// Verify `address`, aborting with [`ChainError::Cancelled`] when `cancel` fires.
    pub async fn verify<B>(
        &self,
        backend: &B,
        address: Address,
        cancel: &CancellationToken,
    ) -> Result<(), VerifyError>
    where
        B: ChainBackend + ?Sized,
    {
        let code = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ChainError::Cancelled.into()),
            code = backend.code_at(address) => code?,
        };

        if code.is_empty() || code != self.expected {
            debug!(%address, code_len = code.len(), "Bytecode mismatch");
            return Err(VerifyError::NotASettlementContract(address));
        }
        Ok(())
    }
}
