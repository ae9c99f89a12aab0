//! Two nodes settling over in-process SWAP sessions on a simulated chain.

use std::{sync::Arc, time::Duration};

use alloy_primitives::{Address, U256};
use alloy_signer_local::PrivateKeySigner;
use assert_matches::assert_matches;
use tokio::task::JoinHandle;
use vertex_storage::{MemoryStateStore, StateStore};
use vertex_storage_redb::RedbStateStore;
use vertex_swarm_bandwidth_chequebook::{Cheque, ChequeParams};
use vertex_swarm_bandwidth_swap::{Owner, Swap, SwapApi, SwapConfig, SwapError};
use vertex_swarm_net_swap::{EmitCheque, ErrorMessage, Handshake, SwapConnection, SwapMessage};
use vertex_swarm_primitives::OverlayAddress;
use vertex_swarm_test_utils::{
    LIBRARY_BYTECODE, SimulatedBackend, TEST_CONTRACT, beneficiary_signer, owner_signer,
    settlement_bytecode, test_overlay,
};

const PAYMENT_THRESHOLD: u64 = 100;
const DISCONNECT_THRESHOLD: u64 = 150;

/// Contract of the second node, owned by the beneficiary key.
const OTHER_CONTRACT: Address = Address::repeat_byte(0xbb);

/// A replacement contract for the second node, also owned by the beneficiary key.
const NEW_CONTRACT: Address = Address::repeat_byte(0xdd);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

fn config() -> SwapConfig {
    SwapConfig::new(settlement_bytecode())
        .with_thresholds(PAYMENT_THRESHOLD, DISCONNECT_THRESHOLD)
        .unwrap()
}

fn chain() -> Arc<SimulatedBackend> {
    let chain = Arc::new(SimulatedBackend::new());
    chain.deploy(TEST_CONTRACT, owner_signer().address(), settlement_bytecode());
    chain.deploy(OTHER_CONTRACT, beneficiary_signer().address(), settlement_bytecode());
    chain.deploy(NEW_CONTRACT, beneficiary_signer().address(), settlement_bytecode());
    chain
}

struct Node {
    overlay: OverlayAddress,
    swap: Arc<Swap>,
}

impl Node {
    fn new(
        n: u8,
        signer: PrivateKeySigner,
        contract: Address,
        config: SwapConfig,
        store: Arc<dyn StateStore>,
        chain: &Arc<SimulatedBackend>,
    ) -> Self {
        let swap = Swap::new(Owner::new(signer, contract), config, store, chain.clone());
        Self {
            overlay: test_overlay(n),
            swap: Arc::new(swap),
        }
    }

    /// Node paying from `TEST_CONTRACT`.
    fn payer(chain: &Arc<SimulatedBackend>, config: SwapConfig) -> Self {
        Self::new(1, owner_signer(), TEST_CONTRACT, config, Arc::new(MemoryStateStore::new()), chain)
    }

    /// Node paying from `OTHER_CONTRACT`.
    fn payee(chain: &Arc<SimulatedBackend>, config: SwapConfig) -> Self {
        Self::new(
            2,
            beneficiary_signer(),
            OTHER_CONTRACT,
            config,
            Arc::new(MemoryStateStore::new()),
            chain,
        )
    }

    /// Run a session with a peer speaking over `conn`.
    fn serve(&self, conn: SwapConnection) -> JoinHandle<Result<(), SwapError>> {
        let swap = self.swap.clone();
        tokio::spawn(async move { swap.run_peer(conn).await })
    }
}

type Sessions = (
    JoinHandle<Result<(), SwapError>>,
    JoinHandle<Result<(), SwapError>>,
);

async fn connect(a: &Node, b: &Node) -> Sessions {
    let (conn_a, conn_b) = SwapConnection::pair(a.overlay, b.overlay);
    let sessions = (a.serve(conn_a), b.serve(conn_b));
    wait_until(|| a.swap.peers().contains(&b.overlay) && b.swap.peers().contains(&a.overlay))
        .await;
    sessions
}

async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

/// A raw connection to `node`, with the node's handshake already consumed.
async fn raw_peer(
    node: &Node,
    overlay: OverlayAddress,
    contract: Address,
) -> (SwapConnection, JoinHandle<Result<(), SwapError>>) {
    let (conn, mut raw) = SwapConnection::pair(node.overlay, overlay);
    let session = node.serve(conn);

    assert_matches!(raw.recv().await, Some(SwapMessage::Handshake(_)));
    raw.send(Handshake::new(contract)).unwrap();
    wait_until(|| node.swap.peers().contains(&overlay)).await;
    (raw, session)
}

/// Cheque from the payee key to the payer node.
fn cheque_to_payer(serial: u64, amount: u64) -> Cheque {
    cheque_to_payer_on(OTHER_CONTRACT, serial, amount)
}

fn cheque_to_payer_on(contract: Address, serial: u64, amount: u64) -> Cheque {
    ChequeParams {
        contract,
        serial,
        amount,
        timeout: 0,
        beneficiary: owner_signer().address(),
    }
    .sign(&beneficiary_signer())
    .unwrap()
}

#[tokio::test]
async fn handshake_registers_both_peers() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());

    let _sessions = connect(&a, &b).await;

    let peer = a.swap.peers().get(&b.overlay).unwrap();
    assert_eq!(peer.contract(), OTHER_CONTRACT);
    assert_eq!(peer.beneficiary(), beneficiary_signer().address());

    let peer = b.swap.peers().get(&a.overlay).unwrap();
    assert_eq!(peer.contract(), TEST_CONTRACT);
    assert_eq!(peer.beneficiary(), owner_signer().address());
}

#[tokio::test]
async fn cheque_settles_debt_on_both_sides() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());
    let _sessions = connect(&a, &b).await;

    // b served 60 + 50 units to a
    b.swap.add(&a.overlay, 60).unwrap();
    a.swap.add(&b.overlay, -60).unwrap();
    b.swap.add(&a.overlay, 50).unwrap();
    assert_eq!(a.swap.add(&b.overlay, -50).unwrap(), 0);

    wait_until(|| b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().is_some()).await;

    let sent = a.swap.last_sent_cheque(&b.overlay).unwrap().unwrap();
    let received = b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().unwrap();
    assert_eq!(sent, received);
    assert_eq!(received.serial(), 1);
    assert_eq!(received.amount(), 110);

    assert_eq!(a.swap.balance(&b.overlay).unwrap(), 0);
    assert_eq!(b.swap.balance(&a.overlay).unwrap(), 0);
}

#[tokio::test]
async fn second_cheque_is_cumulative() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());
    let _sessions = connect(&a, &b).await;

    for (debt, serial) in [(100, 1), (120, 2)] {
        b.swap.add(&a.overlay, debt).unwrap();
        a.swap.add(&b.overlay, -debt).unwrap();
        wait_until(|| {
            b.swap
                .last_received_cheque(&a.overlay, &TEST_CONTRACT)
                .unwrap()
                .is_some_and(|c| c.serial() == serial)
        })
        .await;
    }

    let received = b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().unwrap();
    assert_eq!(received.amount(), 220);
    assert_eq!(b.swap.balance(&a.overlay).unwrap(), 0);
}

#[tokio::test]
async fn handshake_rejects_library_contract() {
    init_tracing();
    let chain = chain();
    chain.set_code(OTHER_CONTRACT, LIBRARY_BYTECODE.into());
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());

    let (conn_a, conn_b) = SwapConnection::pair(a.overlay, b.overlay);
    let (sa, sb) = (a.serve(conn_a), b.serve(conn_b));

    assert_matches!(
        sa.await.unwrap(),
        Err(SwapError::NotASettlementContract(addr)) if addr == OTHER_CONTRACT
    );
    // b reads a's error report, then the closed connection
    assert_matches!(sb.await.unwrap(), Ok(()));
    assert!(!a.swap.peers().contains(&b.overlay));
    assert!(!b.swap.peers().contains(&a.overlay));
}

#[tokio::test]
async fn handshake_rejects_zero_contract() {
    init_tracing();
    let a = Node::payer(&chain(), config());

    let (conn, mut raw) = SwapConnection::pair(a.overlay, test_overlay(9));
    let session = a.serve(conn);
    raw.send(Handshake::new(Address::ZERO)).unwrap();

    assert_matches!(session.await.unwrap(), Err(SwapError::EmptyContractAddress));
    assert_matches!(raw.recv().await, Some(SwapMessage::Handshake(_)));
    assert_matches!(raw.recv().await, Some(SwapMessage::Error(_)));
    assert_eq!(raw.recv().await, None);
}

#[tokio::test]
async fn handshake_times_out() {
    init_tracing();
    let config = config().with_handshake_timeout(Duration::from_millis(50));
    let a = Node::payer(&chain(), config);

    let (conn, _raw) = SwapConnection::pair(a.overlay, test_overlay(9));
    assert_matches!(a.serve(conn).await.unwrap(), Err(SwapError::HandshakeTimeout));
    assert!(a.swap.peers().is_empty());
}

#[tokio::test]
async fn handshake_rejects_unexpected_message() {
    init_tracing();
    let a = Node::payer(&chain(), config());

    let (conn, raw) = SwapConnection::pair(a.overlay, test_overlay(9));
    let session = a.serve(conn);
    raw.send(EmitCheque::new(cheque_to_payer(1, 10))).unwrap();

    assert_matches!(
        session.await.unwrap(),
        Err(SwapError::UnexpectedMessage("emit_cheque"))
    );
}

#[tokio::test]
async fn replayed_cheque_closes_session() {
    init_tracing();
    let a = Node::payer(&chain(), config());
    let peer = test_overlay(9);
    let (mut raw, session) = raw_peer(&a, peer, OTHER_CONTRACT).await;

    let cheque = cheque_to_payer(1, 40);
    raw.send(EmitCheque::new(cheque.clone())).unwrap();
    wait_until(|| a.swap.last_received_cheque(&peer, &OTHER_CONTRACT).unwrap().is_some()).await;
    assert_eq!(a.swap.balance(&peer).unwrap(), -40);

    raw.send(EmitCheque::new(cheque)).unwrap();
    assert_matches!(
        session.await.unwrap(),
        Err(SwapError::SerialOrAmountRegression { serial: 1, last_serial: 1, .. })
    );
    assert_matches!(raw.recv().await, Some(SwapMessage::Error(_)));
    assert_eq!(a.swap.balance(&peer).unwrap(), -40);
    assert!(!a.swap.peers().contains(&peer));
}

#[tokio::test]
async fn forged_cheque_closes_session() {
    init_tracing();
    let a = Node::payer(&chain(), config());
    let peer = test_overlay(9);
    let (raw, session) = raw_peer(&a, peer, OTHER_CONTRACT).await;

    // Signed by a key that does not own the peer's contract
    let forged = cheque_to_payer(1, 40).params.sign(&owner_signer()).unwrap();
    raw.send(EmitCheque::new(forged)).unwrap();

    assert_matches!(session.await.unwrap(), Err(SwapError::InvalidSignature(_)));
    assert_eq!(a.swap.last_received_cheque(&peer, &OTHER_CONTRACT).unwrap(), None);
}

#[tokio::test]
async fn error_message_keeps_session_open() {
    init_tracing();
    let a = Node::payer(&chain(), config());
    let peer = test_overlay(9);
    let (raw, session) = raw_peer(&a, peer, OTHER_CONTRACT).await;

    raw.send(ErrorMessage::new("insufficient funds")).unwrap();
    raw.send(EmitCheque::new(cheque_to_payer(1, 25))).unwrap();
    wait_until(|| a.swap.last_received_cheque(&peer, &OTHER_CONTRACT).unwrap().is_some()).await;

    drop(raw);
    assert_matches!(session.await.unwrap(), Ok(()));
    assert!(a.swap.peers().is_empty());
}

#[tokio::test]
async fn shutdown_ends_sessions() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());
    let (sa, sb) = connect(&a, &b).await;

    a.swap.shutdown().unwrap();
    assert_matches!(sa.await.unwrap(), Err(SwapError::Cancelled));
    assert_matches!(sb.await.unwrap(), Ok(()));
    assert!(b.swap.peers().is_empty());
}

#[tokio::test]
async fn restart_keeps_balance_and_serial() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.redb");
    let chain = chain();
    let b = Node::payee(&chain, config());

    let open = |path: &std::path::Path| -> Arc<dyn StateStore> {
        Arc::new(RedbStateStore::open(path).unwrap())
    };

    {
        let a = Node::new(1, owner_signer(), TEST_CONTRACT, config(), open(&path), &chain);
        let (sa, sb) = connect(&a, &b).await;

        a.swap.add(&b.overlay, -100).unwrap();
        a.swap.add(&b.overlay, -30).unwrap();
        wait_until(|| b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().is_some()).await;

        a.swap.shutdown().unwrap();
        let _ = sa.await.unwrap();
        sb.await.unwrap().unwrap();
    }

    let a = Node::new(1, owner_signer(), TEST_CONTRACT, config(), open(&path), &chain);
    assert_eq!(a.swap.balance(&b.overlay).unwrap(), -30);
    let last = a.swap.last_sent_cheque(&b.overlay).unwrap().unwrap();
    assert_eq!((last.serial(), last.amount()), (1, 100));

    let _sessions = connect(&a, &b).await;
    a.swap.add(&b.overlay, -80).unwrap();
    wait_until(|| {
        b.swap
            .last_received_cheque(&a.overlay, &TEST_CONTRACT)
            .unwrap()
            .is_some_and(|c| c.serial() == 2)
    })
    .await;
    let received = b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().unwrap();
    assert_eq!(received.amount(), 210);
}

#[tokio::test]
async fn auto_cashout_pays_beneficiary() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(
        &chain,
        config().with_initial_deposit(1_000).with_cash_in_delay(0),
    );
    let b = Node::payee(&chain, config().with_auto_cashout(true));
    a.swap.ensure_deposit().await.unwrap();
    let _sessions = connect(&a, &b).await;

    a.swap.add(&b.overlay, -120).unwrap();

    wait_until(|| {
        chain
            .submitted(TEST_CONTRACT, beneficiary_signer().address())
            .is_some_and(|c| c.paid_out == 120)
    })
    .await;
    assert_eq!(chain.balance_of(TEST_CONTRACT), U256::from(880));
}

#[tokio::test]
async fn cashout_waits_for_cash_in_delay() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(
        &chain,
        config().with_initial_deposit(1_000).with_cash_in_delay(1),
    );
    let b = Node::payee(&chain, config().with_auto_cashout(true));
    a.swap.ensure_deposit().await.unwrap();
    let _sessions = connect(&a, &b).await;

    a.swap.add(&b.overlay, -100).unwrap();
    wait_until(|| chain.submitted(TEST_CONTRACT, beneficiary_signer().address()).is_some()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(chain.balance_of(TEST_CONTRACT), U256::from(1_000));

    chain.advance(1);
    wait_until(|| chain.balance_of(TEST_CONTRACT) == U256::from(900)).await;
}

#[tokio::test]
async fn debt_accrued_offline_is_paid_on_connect() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(&chain, config());
    let b = Node::payee(&chain, config());

    assert_eq!(a.swap.add(&b.overlay, -160).unwrap(), -160);
    b.swap.add(&a.overlay, 160).unwrap();
    assert_matches!(
        a.swap.add(&b.overlay, -1),
        Err(SwapError::DisconnectThreshold { .. })
    );

    let _sessions = connect(&a, &b).await;
    wait_until(|| {
        b.swap
            .last_received_cheque(&a.overlay, &TEST_CONTRACT)
            .unwrap()
            .is_some()
    })
    .await;

    let received = b.swap.last_received_cheque(&a.overlay, &TEST_CONTRACT).unwrap().unwrap();
    assert_eq!((received.serial(), received.amount()), (1, 160));
    assert_eq!(b.swap.balance(&a.overlay).unwrap(), 0);
    assert_eq!(a.swap.add(&b.overlay, -1).unwrap(), -1);
}

#[tokio::test]
async fn new_contract_starts_new_cheque_series() {
    init_tracing();
    let a = Node::payer(&chain(), config());
    let peer = test_overlay(9);

    let (raw, session) = raw_peer(&a, peer, OTHER_CONTRACT).await;
    raw.send(EmitCheque::new(cheque_to_payer(5, 50))).unwrap();
    wait_until(|| a.swap.last_received_cheque(&peer, &OTHER_CONTRACT).unwrap().is_some()).await;
    drop(raw);
    session.await.unwrap().unwrap();

    // Same peer, redeployed contract
    let (raw, _session) = raw_peer(&a, peer, NEW_CONTRACT).await;
    raw.send(EmitCheque::new(cheque_to_payer_on(NEW_CONTRACT, 1, 10))).unwrap();
    wait_until(|| a.swap.last_received_cheque(&peer, &NEW_CONTRACT).unwrap().is_some()).await;

    assert_eq!(a.swap.balance(&peer).unwrap(), -60);
    let old = a.swap.last_received_cheque(&peer, &OTHER_CONTRACT).unwrap().unwrap();
    assert_eq!((old.serial(), old.amount()), (5, 50));
    assert!(a.swap.peers().contains(&peer));
}

#[tokio::test]
async fn failed_cashout_is_recovered_by_next_cheque() {
    init_tracing();
    let chain = chain();
    let a = Node::payer(
        &chain,
        config().with_initial_deposit(1_000).with_cash_in_delay(0),
    );
    let b = Node::payee(&chain, config().with_auto_cashout(true));
    a.swap.ensure_deposit().await.unwrap();
    let _sessions = connect(&a, &b).await;

    chain.set_unavailable(true);
    a.swap.add(&b.overlay, -100).unwrap();
    wait_until(|| {
        b.swap
            .last_received_cheque(&a.overlay, &TEST_CONTRACT)
            .unwrap()
            .is_some()
    })
    .await;
    // Let the first cash-out fail against the unavailable chain
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(chain.submitted(TEST_CONTRACT, beneficiary_signer().address()).is_none());

    chain.set_unavailable(false);
    a.swap.add(&b.overlay, -100).unwrap();
    wait_until(|| {
        chain
            .submitted(TEST_CONTRACT, beneficiary_signer().address())
            .is_some_and(|c| c.paid_out == 200)
    })
    .await;
    assert_eq!(chain.balance_of(TEST_CONTRACT), U256::from(800));
}

#[tokio::test]
async fn shutdown_during_contract_lookup_cancels_handshake() {
    init_tracing();
    let chain = chain();
    chain.set_stalled(true);
    let a = Node::payer(&chain, config());
    let peer = test_overlay(9);

    let (conn, raw) = SwapConnection::pair(a.overlay, peer);
    let session = a.serve(conn);
    raw.send(Handshake::new(OTHER_CONTRACT)).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!session.is_finished());

    a.swap.cancellation_token().cancel();
    assert_matches!(session.await.unwrap(), Err(SwapError::Cancelled));
    assert!(a.swap.peers().is_empty());
    assert_matches!(a.swap.balance(&peer), Err(SwapError::NotFound(_)));
}
