//! Fixed keys, addresses and cheques.

use alloy_primitives::{Address, B256, Bytes, address, b256};
use alloy_signer_local::PrivateKeySigner;
use vertex_swarm_bandwidth_chequebook::{Cheque, ChequeParams};
use vertex_swarm_primitives::OverlayAddress;

/// Key of the settlement contract owner that signs [`test_cheque`].
pub const OWNER_KEY: B256 =
    b256!("634fb5a872396d9693e5c9f9d7233cfa93f395c093371017ff44aa9ae6564cdd");

/// Key of the beneficiary of [`test_cheque`].
pub const BENEFICIARY_KEY: B256 =
    b256!("6f05b0a29723ca69b1fc65d11752cee22c200cf3d2938e670547f7ae525be112");

/// Settlement contract address of [`test_cheque`].
pub const TEST_CONTRACT: Address = address!("4405415b2B8c9F9aA83E151637B8378dD3bcfEDD");

/// Stand-in runtime bytecode for the settlement contract.
pub const SETTLEMENT_BYTECODE: &[u8] = &[
    0x60, 0x80, 0x60, 0x40, 0x52, 0x34, 0x80, 0x15, 0x61, 0x00, 0x10, 0x57, 0x60, 0x00, 0x80,
    0xfd, 0x5b, 0x50, 0x60, 0x04, 0x36, 0x10, 0x61, 0x01, 0x0b, 0x57,
];

/// Stand-in runtime bytecode for an unrelated library contract.
pub const LIBRARY_BYTECODE: &[u8] = &[
    0x73, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x30, 0x14, 0x60, 0x80,
    0x60, 0x40, 0x52, 0x60, 0x04, 0x36, 0x10, 0x60, 0x28, 0x57,
];

/// Signer for [`OWNER_KEY`].
pub fn owner_signer() -> PrivateKeySigner {
    signer_from(OWNER_KEY)
}

/// Signer for [`BENEFICIARY_KEY`].
pub fn beneficiary_signer() -> PrivateKeySigner {
    signer_from(BENEFICIARY_KEY)
}

fn signer_from(key: B256) -> PrivateKeySigner {
    match PrivateKeySigner::from_bytes(&key) {
        Ok(signer) => signer,
        Err(e) => panic!("fixed test key is valid: {e}"),
    }
}

/// Settlement contract bytecode as [`Bytes`].
pub fn settlement_bytecode() -> Bytes {
    Bytes::from_static(SETTLEMENT_BYTECODE)
}

/// Parameters of the reference cheque: serial 1, amount 42, timeout 10.
pub fn test_cheque_params() -> ChequeParams {
    ChequeParams {
        contract: TEST_CONTRACT,
        serial: 1,
        amount: 42,
        timeout: 10,
        beneficiary: beneficiary_signer().address(),
    }
}

/// The reference cheque signed by [`owner_signer`].
pub fn test_cheque() -> Cheque {
    match test_cheque_params().sign(&owner_signer()) {
        Ok(cheque) => cheque,
        Err(e) => panic!("signing with a local key cannot fail: {e}"),
    }
}

/// Deterministic overlay address from a single byte.
pub fn test_overlay(n: u8) -> OverlayAddress {
    OverlayAddress::repeat_byte(n)
}

/// Random overlay address.
pub fn random_overlay() -> OverlayAddress {
    OverlayAddress::from(rand::random::<[u8; 32]>())
}
