//! SWAP metrics.

use metrics::{Counter, Gauge};

/// SWAP accounting metrics.
#[derive(Clone, Debug)]
pub(crate) struct SwapMetrics {
    /// Cheques signed and sent to peers
    pub(crate) cheques_issued_total: Counter,
    /// Cheques accepted from peers
    pub(crate) cheques_received_total: Counter,
    /// Cheques rejected during validation
    pub(crate) cheques_rejected_total: Counter,
    /// Sessions that failed to complete the handshake
    pub(crate) handshakes_failed_total: Counter,
    /// Sessions currently active
    pub(crate) active_peers: Gauge,
}

impl Default for SwapMetrics {
    fn default() -> Self {
        Self {
            cheques_issued_total: metrics::counter!("swap.cheques_issued_total"),
            cheques_received_total: metrics::counter!("swap.cheques_received_total"),
            cheques_rejected_total: metrics::counter!("swap.cheques_rejected_total"),
            handshakes_failed_total: metrics::counter!("swap.handshakes_failed_total"),
            active_peers: metrics::gauge!("swap.active_peers"),
        }
    }
}
