//! Cheques and settlement-contract access for SWAP.
//!
//! This crate provides the building blocks the SWAP accounting engine uses to
//! pay and get paid:
//!
//! - [`ChequeParams`] / [`Cheque`] - canonical encoding, signing and
//!   signature verification of cheques
//! - [`ChainBackend`] - the narrow view of the chain the engine depends on
//! - [`ContractVerifier`] - checks that an address hosts the expected
//!   settlement contract before its cheques are trusted
//!
//! # Signing a Cheque
//!
//! ```ignore
//! let params = ChequeParams { contract, serial: 1, amount: 42, timeout: 3600, beneficiary };
//! let cheque = params.sign(&signer)?;
//! cheque.verify(signer.address())?;
//! ```
//!
//! # Wire Format
//!
//! Cheques serialize with camelCase field names; the signature is a
//! `0x`-prefixed hex string in human-readable formats.

pub mod backend;
pub mod cheque;
pub mod contract;

pub use backend::{ChainBackend, ChainError, Receipt, TxHash};
pub use cheque::{Cheque, ChequeParams, ENCODED_LEN, SIGNATURE_LEN};
pub use contract::{ContractVerifier, VerifyError};

// Re-export commonly used types
pub use alloy_primitives::{Address, Bytes, U256};

/// Errors that can occur during cheque operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChequeError {
    /// The signer failed to produce a signature.
    #[error("failed to sign cheque: {0}")]
    Signing(String),

    /// The signature is malformed or no signer can be recovered from it.
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Cheque was signed by an unexpected address.
    #[error("invalid signer: expected {expected}, got {actual}")]
    InvalidSigner { expected: Address, actual: Address },
}
