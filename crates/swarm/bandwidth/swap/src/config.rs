//! Validated SWAP configuration.

use std::time::Duration;

use alloy_primitives::Bytes;

use crate::{SwapArgs, SwapError, constants::*};

/// Validated SWAP configuration.
///
/// `payment_threshold` is always positive and strictly below
/// `disconnect_threshold`, so a cheque is issued before a peer would refuse
/// further debits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapConfig {
    payment_threshold: u64,
    disconnect_threshold: u64,
    initial_deposit: u64,
    cash_in_delay: u64,
    auto_cashout: bool,
    handshake_timeout: Duration,
    contract_bytecode: Bytes,
}

impl SwapConfig {
    /// Default configuration for the given settlement contract bytecode.
    pub fn new(contract_bytecode: Bytes) -> Self {
        Self {
            payment_threshold: DEFAULT_PAYMENT_THRESHOLD,
            disconnect_threshold: DEFAULT_DISCONNECT_THRESHOLD,
            initial_deposit: DEFAULT_INITIAL_DEPOSIT,
            cash_in_delay: DEFAULT_CASH_IN_DELAY,
            auto_cashout: false,
            handshake_timeout: Duration::from_secs(DEFAULT_HANDSHAKE_TIMEOUT_SECS),
            contract_bytecode,
        }
    }

    /// Replace both thresholds, validating their relationship.
    pub fn with_thresholds(
        mut self,
        payment_threshold: u64,
        disconnect_threshold: u64,
    ) -> Result<Self, SwapError> {
        validate_thresholds(payment_threshold, disconnect_threshold)?;
        self.payment_threshold = payment_threshold;
        self.disconnect_threshold = disconnect_threshold;
        Ok(self)
    }

    pub fn with_initial_deposit(mut self, amount: u64) -> Self {
        self.initial_deposit = amount;
        self
    }

    pub fn with_cash_in_delay(mut self, secs: u64) -> Self {
        self.cash_in_delay = secs;
        self
    }

    pub fn with_auto_cashout(mut self, enabled: bool) -> Self {
        self.auto_cashout = enabled;
        self
    }

    pub fn with_handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Debt owed to a peer at which a cheque is issued.
    pub fn payment_threshold(&self) -> u64 {
        self.payment_threshold
    }

    /// Debt owed to a peer beyond which further debits are refused.
    pub fn disconnect_threshold(&self) -> u64 {
        self.disconnect_threshold
    }

    /// Amount to keep deposited in the local settlement contract.
    pub fn initial_deposit(&self) -> u64 {
        self.initial_deposit
    }

    /// Timeout written into issued cheques.
    pub fn cash_in_delay(&self) -> u64 {
        self.cash_in_delay
    }

    /// Whether received cheques are cashed automatically.
    pub fn auto_cashout(&self) -> bool {
        self.auto_cashout
    }

    /// How long to wait for a peer's handshake.
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    /// Expected runtime bytecode of settlement contracts.
    pub fn contract_bytecode(&self) -> &Bytes {
        &self.contract_bytecode
    }
}

impl TryFrom<&SwapArgs> for SwapConfig {
    type Error = SwapError;

    fn try_from(args: &SwapArgs) -> Result<Self, Self::Error> {
        args.validate().map_err(SwapError::InvalidConfig)?;
        let bytecode = args.contract_bytecode.clone().unwrap_or_default();

        Ok(Self::new(bytecode)
            .with_thresholds(args.payment_threshold, args.disconnect_threshold)?
            .with_initial_deposit(args.initial_deposit)
            .with_cash_in_delay(args.cash_in_delay)
            .with_auto_cashout(args.auto_cashout)
            .with_handshake_timeout(Duration::from_secs(args.handshake_timeout)))
    }
}

fn validate_thresholds(payment: u64, disconnect: u64) -> Result<(), SwapError> {
    if payment == 0 {
        return Err(SwapError::InvalidConfig(
            "payment threshold must be positive".into(),
        ));
    }
    if payment >= disconnect {
        return Err(SwapError::InvalidConfig(format!(
            "payment threshold {payment} must be below disconnect threshold {disconnect}"
        )));
    }
    if i64::try_from(disconnect).is_err() {
        return Err(SwapError::InvalidConfig(format!(
            "disconnect threshold {disconnect} out of range"
        )));
    }
    Ok(())
}
