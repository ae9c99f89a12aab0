//! Core primitive types for Ethereum Swarm nodes.
//!
//! This crate provides fundamental types used across the Swarm stack,
//! kept separate to avoid circular dependencies.

use alloy_primitives::{Address, B256, Keccak256};

/// 32-byte overlay address identifying a peer in the Swarm network.
pub type OverlayAddress = B256;

/// Computes overlay address: `keccak256(ethereum_address || network_id || nonce)`.
pub fn compute_overlay(ethereum_address: &Address, network_id: u64, nonce: &B256) -> OverlayAddress {
    let mut hasher = Keccak256::new();
    hasher.update(ethereum_address);
    hasher.update(network_id.to_le_bytes());
    hasher.update(nonce);
    hasher.finalize()
}

/// Lowercase hex rendering of an overlay address without the `0x` prefix.
///
/// Used wherever an overlay is turned into a storage key.
pub fn overlay_key(overlay: &OverlayAddress) -> String {
    alloy_primitives::hex::encode(overlay)
}
