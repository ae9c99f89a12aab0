//! SWAP protocol messages.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use vertex_swarm_bandwidth_chequebook::Cheque;

/// Announces the sender's settlement contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub contract: Address,
}

impl Handshake {
    pub fn new(contract: Address) -> Self {
        Self { contract }
    }
}

/// Carries a signed cheque to its beneficiary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitCheque {
    pub cheque: Cheque,
}

impl EmitCheque {
    pub fn new(cheque: Cheque) -> Self {
        Self { cheque }
    }
}

/// Error reported by the remote peer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A SWAP protocol message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr)]
#[serde(tag = "type", rename_all = "camelCase")]
#[strum(serialize_all = "snake_case")]
pub enum SwapMessage {
    Handshake(Handshake),
    EmitCheque(EmitCheque),
    Error(ErrorMessage),
}

impl SwapMessage {
    /// Message kind for logging.
    pub fn kind(&self) -> &'static str {
        self.into()
    }
}

impl From<Handshake> for SwapMessage {
    fn from(msg: Handshake) -> Self {
        Self::Handshake(msg)
    }
}

impl From<EmitCheque> for SwapMessage {
    fn from(msg: EmitCheque) -> Self {
        Self::EmitCheque(msg)
    }
}

impl From<ErrorMessage> for SwapMessage {
    fn from(msg: ErrorMessage) -> Self {
        Self::Error(msg)
    }
}
