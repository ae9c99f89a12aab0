//! CLI arguments for SWAP configuration.

use alloy_primitives::Bytes;
use clap::Args;
use serde::{Deserialize, Serialize};

use crate::constants::*;

/// SWAP CLI arguments. Thresholds and amounts are in accounting units.
#[derive(Debug, Args, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[command(next_help_heading = "SWAP Settlement")]
#[serde(default)]
pub struct SwapArgs {
    /// Debt owed to a peer at which a cheque is issued
    #[arg(long = "swap.payment-threshold", default_value_t = DEFAULT_PAYMENT_THRESHOLD)]
    pub payment_threshold: u64,

    /// Debt owed to a peer beyond which further debits are refused
    #[arg(long = "swap.disconnect-threshold", default_value_t = DEFAULT_DISCONNECT_THRESHOLD)]
    pub disconnect_threshold: u64,

    /// Amount to keep deposited in the local settlement contract
    #[arg(long = "swap.initial-deposit", default_value_t = DEFAULT_INITIAL_DEPOSIT)]
    pub initial_deposit: u64,

    /// Seconds a beneficiary must wait on-chain before cashing a cheque
    #[arg(long = "swap.cash-in-delay", default_value_t = DEFAULT_CASH_IN_DELAY)]
    pub cash_in_delay: u64,

    /// Submit and cash received cheques automatically
    #[arg(long = "swap.auto-cashout", default_value_t = false)]
    pub auto_cashout: bool,

    /// Seconds to wait for the peer's handshake
    #[arg(long = "swap.handshake-timeout", default_value_t = DEFAULT_HANDSHAKE_TIMEOUT_SECS)]
    pub handshake_timeout: u64,

    /// Runtime bytecode of the settlement contract (hex)
    #[arg(long = "swap.contract-bytecode")]
    pub contract_bytecode: Option<Bytes>,
}

impl Default for SwapArgs {
    fn default() -> Self {
        Self {
            payment_threshold: DEFAULT_PAYMENT_THRESHOLD,
            disconnect_threshold: DEFAULT_DISCONNECT_THRESHOLD,
            initial_deposit: DEFAULT_INITIAL_DEPOSIT,
            cash_in_delay: DEFAULT_CASH_IN_DELAY,
            auto_cashout: false,
            handshake_timeout: DEFAULT_HANDSHAKE_TIMEOUT_SECS,
            contract_bytecode: None,
        }
    }
}

impl SwapArgs {
    /// Validate argument combinations.
    pub fn validate(&self) -> Result<(), String> {
        if self.payment_threshold == 0 {
            return Err("swap.payment-threshold must be positive".to_string());
        }
        if self.payment_threshold >= self.disconnect_threshold {
            return Err(format!(
                "swap.payment-threshold ({}) must be below swap.disconnect-threshold ({})",
                self.payment_threshold, self.disconnect_threshold
            ));
        }
        if i64::try_from(self.disconnect_threshold).is_err() {
            return Err("swap.disconnect-threshold is out of range".to_string());
        }
        if self.handshake_timeout == 0 {
            return Err("swap.handshake-timeout must be positive".to_string());
        }
        if self.contract_bytecode.as_ref().is_none_or(|code| code.is_empty()) {
            return Err("swap.contract-bytecode is required".to_string());
        }
        Ok(())
    }
}
