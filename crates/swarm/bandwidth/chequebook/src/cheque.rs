//! Cheque types for SWAP settlement.
//!
//! A cheque is a signed commitment to pay a cumulative amount from a
//! settlement contract to a beneficiary. Each new cheque supersedes the
//! previous one: the serial strictly increases and the amount never
//! decreases.
//!
//! # Encoding
//!
//! The signed payload is a fixed 136-byte layout with no length prefixes:
//!
//! ```text
//! contract (20) | beneficiary (20) | serial (32, BE) | amount (32, BE) | timeout (32, BE)
//! ```
//!
//! The signing hash is the EIP-191 personal-message hash of
//! `keccak256(encoding)`, so cheques can be checked by any standard
//! `ecrecover`-based verifier.

use alloy_primitives::{Address, B256, Bytes, Signature, U256, eip191_hash_message, keccak256};
use alloy_signer::SignerSync;
use serde::{Deserialize, Serialize};

use crate::ChequeError;

/// Length of the canonical cheque encoding.
pub const ENCODED_LEN: usize = 136;

/// Length of a serialized signature (`r || s || v`).
pub const SIGNATURE_LEN: usize = 65;

/// The signed fields of a cheque.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChequeParams {
    /// Settlement contract the cheque draws on.
    pub contract: Address,
    /// Strictly increasing per contract and beneficiary.
    pub serial: u64,
    /// Cumulative amount owed to the beneficiary.
    pub amount: u64,
    /// Seconds the beneficiary must wait on-chain before cashing.
    pub timeout: u64,
    /// Address entitled to cash the cheque.
    pub beneficiary: Address,
}

impl ChequeParams {
    /// Canonical byte encoding of the parameters.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(ENCODED_LEN);
        out.extend_from_slice(self.contract.as_slice());
        out.extend_from_slice(self.beneficiary.as_slice());
        out.extend_from_slice(&U256::from(self.serial).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.amount).to_be_bytes::<32>());
        out.extend_from_slice(&U256::from(self.timeout).to_be_bytes::<32>());
        out
    }

    /// Hash that is signed and recovered against.
    pub fn sig_hash(&self) -> B256 {
        eip191_hash_message(keccak256(self.encode()))
    }

    /// Sign the parameters, producing a [`Cheque`].
    pub fn sign<S>(self, signer: &S) -> Result<Cheque, ChequeError>
    where
        S: SignerSync + ?Sized,
    {
        let sig = signer
            .sign_hash_sync(&self.sig_hash())
            .map_err(|e| ChequeError::Signing(e.to_string()))?;
        Ok(Cheque::from_signature(self, sig))
    }
}

/// A signed cheque ready for transmission or cashing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cheque {
    /// The signed parameters.
    pub params: ChequeParams,
    /// ECDSA signature (65 bytes: r[32] + s[32] + v[1]).
    pub signature: Bytes,
}

impl Cheque {
    /// Create a cheque from parameters and raw signature bytes.
    pub fn new(params: ChequeParams, signature: Bytes) -> Self {
        Self { params, signature }
    }

    /// Create a cheque from parameters and a parsed signature.
    pub fn from_signature(params: ChequeParams, sig: Signature) -> Self {
        Self {
            params,
            signature: Bytes::copy_from_slice(&sig.as_bytes()),
        }
    }

    /// Settlement contract the cheque draws on.
    pub fn contract(&self) -> Address {
        self.params.contract
    }

    /// Beneficiary of the cheque.
    pub fn beneficiary(&self) -> Address {
        self.params.beneficiary
    }

    /// Serial number.
    pub fn serial(&self) -> u64 {
        self.params.serial
    }

    /// Cumulative amount.
    pub fn amount(&self) -> u64 {
        self.params.amount
    }

    /// Parse the signature bytes.
    ///
    /// Only the canonical recovery ids (0, 1, 27, 28) are accepted so that any
    /// change to `v` invalidates the signature.
    fn parse_signature(&self) -> Result<Signature, ChequeError> {
        let bytes: &[u8; SIGNATURE_LEN] = self
            .signature
            .as_ref()
            .try_into()
            .map_err(|_| {
                ChequeError::InvalidSignature(format!(
                    "invalid signature length: expected {SIGNATURE_LEN}, got {}",
                    self.signature.len()
                ))
            })?;
        let [rs @ .., v] = bytes;
        let (r, s) = rs.split_at(32);

        let parity = match *v {
            0 | 27 => false,
            1 | 28 => true,
            v => {
                return Err(ChequeError::InvalidSignature(format!(
                    "invalid recovery id {v}"
                )));
            }
        };

        Ok(Signature::new(
            U256::from_be_slice(r),
            U256::from_be_slice(s),
            parity,
        ))
    }

    /// Recover the signer address from the signature.
    pub fn recover_signer(&self) -> Result<Address, ChequeError> {
        let sig = self.parse_signature()?;
        sig.recover_address_from_prehash(&self.params.sig_hash())
            .map_err(|e| ChequeError::InvalidSignature(format!("recovery failed: {e}")))
    }

    /// Verify that this cheque was signed by the expected signer.
    pub fn verify(&self, signer: Address) -> Result<(), ChequeError> {
        let actual = self.recover_signer()?;
        if actual != signer {
            return Err(ChequeError::InvalidSigner {
                expected: signer,
                actual,
            });
        }
        Ok(())
    }
}
