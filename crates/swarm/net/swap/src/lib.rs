//! SWAP protocol for Swarm bandwidth accounting with cheque settlement.
//!
//! This crate provides the wire protocol for exchanging signed cheques between
//! peers. It is **pure protocol plumbing** - it does NOT make business decisions
//! about settlements or cheque validation.
//!
//! # Protocol
//!
//! - Name: `swap`, version 1
//! - Messages: [`SwapMessage`] - `Handshake { contract }`, `EmitCheque { cheque }`
//!   and `Error { message }`
//! - Framing: 4-byte big-endian length prefix followed by a JSON payload, at
//!   most [`MAX_MESSAGE_SIZE`] bytes
//!
//! # Usage
//!
//! ```ignore
//! use vertex_swarm_net_swap::{SwapConnection, SwapMessage, Handshake};
//!
//! let conn = SwapConnection::framed(peer, io);
//! conn.send(SwapMessage::Handshake(Handshake::new(our_contract)))?;
//! let reply = conn.inbound.recv().await;
//! ```
//!
//! # Business Logic (NOT in this crate)
//!
//! - Handshake verification against the chain
//! - Cheque validation (signature, serial, cumulative amount)
//! - Balance updates

mod codec;
mod connection;
mod message;

pub use codec::{CodecError, SwapCodec};
pub use connection::{ConnectionClosed, SwapConnection};
pub use message::{EmitCheque, ErrorMessage, Handshake, SwapMessage};

// Re-export Cheque for convenience
pub use vertex_swarm_bandwidth_chequebook::Cheque;

/// Protocol name for SWAP.
pub const PROTOCOL_NAME: &str = "swap";

/// Protocol version for SWAP.
pub const PROTOCOL_VERSION: u32 = 1;

/// Maximum encoded message size (10 MiB).
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;
