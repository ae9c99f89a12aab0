//! SWAP - cheque-based settlement of bandwidth debt.
//!
//! Peers keep a signed balance for each other. When the debt we owe a peer
//! reaches the payment threshold we sign a cheque drawn on our settlement
//! contract and send it over the peer's SWAP session; the peer validates it
//! and credits the newly covered amount.
//!
//! # Components
//!
//! - [`Ledger`] - durable per-peer balances and last sent/received cheques
//! - [`PeerSession`] - handshake and message loop for one connection
//! - [`Swap`] - the shared service tying identity, ledger and sessions together
//! - [`SwapApi`] - read access for external callers
//!
//! # Cheques
//!
//! Cheques are cumulative: each carries the total ever paid to the
//! beneficiary and a strictly increasing serial. A peer only accepts a cheque
//! that advances both, so replays and reordering never pay twice.
//!
//! With auto-cashout enabled, accepted cheques are submitted to the issuer's
//! contract and cashed once its cash-in delay has passed.

mod api;
mod args;
mod cashout;
mod config;
mod constants;
mod error;
mod ledger;
mod metrics;
mod owner;
mod peer;
mod protocol;
mod service;

pub use api::SwapApi;
pub use args::SwapArgs;
pub use config::SwapConfig;
pub use error::SwapError;
pub use ledger::{Ledger, LedgerGuard};
pub use owner::Owner;
pub use peer::{PeerRegistry, SessionState, SwapPeer};
pub use protocol::PeerSession;
pub use service::Swap;
