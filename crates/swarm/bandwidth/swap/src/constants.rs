//! Default constants for SWAP accounting.

use std::time::Duration;

/// Default payment threshold.
pub(crate) const DEFAULT_PAYMENT_THRESHOLD: u64 = 13_500_000;

/// Default payment tolerance as a percentage.
pub(crate) const DEFAULT_PAYMENT_TOLERANCE_PERCENT: u64 = 25;

/// Default disconnect threshold (payment threshold plus tolerance).
pub(crate) const DEFAULT_DISCONNECT_THRESHOLD: u64 =
    DEFAULT_PAYMENT_THRESHOLD * (100 + DEFAULT_PAYMENT_TOLERANCE_PERCENT) / 100;

/// Default initial deposit into the local settlement contract.
pub(crate) const DEFAULT_INITIAL_DEPOSIT: u64 = 0;

/// Default cheque cash-in delay in seconds.
pub(crate) const DEFAULT_CASH_IN_DELAY: u64 = 3600;

/// Default handshake timeout in seconds.
pub(crate) const DEFAULT_HANDSHAKE_TIMEOUT_SECS: u64 = 15;

/// Store key prefix for peer balances.
pub(crate) const BALANCE_PREFIX: &str = "balance_";

/// Store key prefix for the last cheque sent to a peer.
pub(crate) const SENT_CHEQUE_PREFIX: &str = "sent_cheque_";

/// Store key prefix for the last cheque received from a peer.
pub(crate) const RECEIVED_CHEQUE_PREFIX: &str = "received_cheque_";

/// Upper bound between block time polls while waiting to cash a cheque.
pub(crate) const CASHOUT_POLL_INTERVAL: Duration = Duration::from_secs(5);
