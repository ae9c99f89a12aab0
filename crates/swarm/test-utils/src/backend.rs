//! In-memory chain backend.

use std::collections::HashMap;

use alloy_primitives::{Address, Bytes, U256, keccak256};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::debug;
use vertex_swarm_bandwidth_chequebook::{ChainBackend, ChainError, Cheque, Receipt, TxHash};

/// The latest cheque a beneficiary submitted to a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedCheque {
    pub serial: u64,
    pub amount: u64,
    pub timeout: u64,
    /// Block time of submission; cashing opens at `submitted_at + timeout`.
    pub submitted_at: u64,
    /// Amount already cashed out.
    pub paid_out: u64,
}

#[derive(Debug, Default)]
struct ContractState {
    owner: Address,
    balance: U256,
    cheques: HashMap<Address, SubmittedCheque>,
}

#[derive(Debug, Default)]
struct ChainState {
    now: u64,
    nonce: u64,
    code: HashMap<Address, Bytes>,
    contracts: HashMap<Address, ContractState>,
    receipts: HashMap<TxHash, Receipt>,
    unavailable: bool,
    stalled: bool,
}

impl ChainState {
    fn mine(&mut self, success: bool) -> TxHash {
        self.nonce += 1;
        let tx_hash = keccak256(self.nonce.to_be_bytes());
        self.receipts.insert(
            tx_hash,
            Receipt {
                tx_hash,
                success,
                block_time: self.now,
            },
        );
        tx_hash
    }

    fn check_available(&self) -> Result<(), ChainError> {
        if self.unavailable {
            return Err(ChainError::Rpc("backend unavailable".into()));
        }
        Ok(())
    }

    fn contract_mut(&mut self, contract: Address) -> Result<&mut ContractState, ChainError> {
        self.contracts
            .get_mut(&contract)
            .ok_or(ChainError::NoContract(contract))
    }
}

/// Simulated chain hosting settlement contracts.
///
/// Transactions are mined instantly at the current simulated time, which only
/// moves when [`advance`](Self::advance) or [`set_time`](Self::set_time) is
/// called.
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    state: Mutex<ChainState>,
}

impl SimulatedBackend {
    /// Create an empty chain at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deploy a settlement contract owned by `owner` with the given runtime code.
    pub fn deploy(&self, contract: Address, owner: Address, code: Bytes) {
        let mut state = self.state.lock();
        state.code.insert(contract, code);
        state.contracts.insert(
            contract,
            ContractState {
                owner,
                ..Default::default()
            },
        );
    }

    /// Place arbitrary code at `address` without settlement semantics.
    pub fn set_code(&self, address: Address, code: Bytes) {
        self.state.lock().code.insert(address, code);
    }

    /// Current block time.
    pub fn now(&self) -> u64 {
        self.state.lock().now
    }

    /// Set the block time.
    pub fn set_time(&self, now: u64) {
        self.state.lock().now = now;
    }

    /// Move the block time forward.
    pub fn advance(&self, secs: u64) {
        let mut state = self.state.lock();
        state.now = state.now.saturating_add(secs);
    }

    /// Make every call fail with [`ChainError::Rpc`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Make bytecode lookups hang until the flag is cleared.
    pub fn set_stalled(&self, stalled: bool) {
        self.state.lock().stalled = stalled;
    }

    /// Funds held by `contract`.
    pub fn balance_of(&self, contract: Address) -> U256 {
        self.state
            .lock()
            .contracts
            .get(&contract)
            .map(|c| c.balance)
            .unwrap_or_default()
    }

    /// The latest cheque `beneficiary` submitted to `contract`.
    pub fn submitted(&self, contract: Address, beneficiary: Address) -> Option<SubmittedCheque> {
        self.state
            .lock()
            .contracts
            .get(&contract)
            .and_then(|c| c.cheques.get(&beneficiary).copied())
    }
}

#[async_trait]
impl ChainBackend for SimulatedBackend {
    async fn code_at(&self, address: Address) -> Result<Bytes, ChainError> {
        let stalled = self.state.lock().stalled;
        if stalled {
            std::future::pending::<()>().await;
        }
        let state = self.state.lock();
        state.check_available()?;
        Ok(state.code.get(&address).cloned().unwrap_or_default())
    }

    async fn contract_owner(&self, contract: Address) -> Result<Address, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        Ok(state.contract_mut(contract)?.owner)
    }

    async fn contract_balance(&self, contract: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        Ok(state.contract_mut(contract)?.balance)
    }

    async fn deposit(&self, contract: Address, amount: U256) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let target = state.contract_mut(contract)?;
        target.balance = target.balance.saturating_add(amount);
        debug!(%contract, %amount, "Simulated deposit");
        Ok(state.mine(true))
    }

    async fn submit_cheque(&self, cheque: &Cheque) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let now = state.now;
        let contract = state.contract_mut(cheque.contract())?;

        cheque
            .verify(contract.owner)
            .map_err(|e| ChainError::Reverted(e.to_string()))?;

        let previous = contract.cheques.get(&cheque.beneficiary()).copied();
        if let Some(prev) = previous {
            if cheque.serial() <= prev.serial || cheque.amount() < prev.amount {
                return Err(ChainError::Reverted("stale cheque".into()));
            }
        }

        contract.cheques.insert(
            cheque.beneficiary(),
            SubmittedCheque {
                serial: cheque.serial(),
                amount: cheque.amount(),
                timeout: cheque.params.timeout,
                submitted_at: now,
                paid_out: previous.map_or(0, |p| p.paid_out),
            },
        );
        Ok(state.mine(true))
    }

    async fn cash_cheque(
        &self,
        contract: Address,
        beneficiary: Address,
        amount: U256,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let now = state.now;
        let target = state.contract_mut(contract)?;

        let submitted = target
            .cheques
            .get_mut(&beneficiary)
            .ok_or_else(|| ChainError::Reverted("no cheque submitted".into()))?;
        if now < submitted.submitted_at.saturating_add(submitted.timeout) {
            return Err(ChainError::Reverted("cash-in timeout not reached".into()));
        }

        let amount = u64::try_from(amount)
            .map_err(|_| ChainError::Reverted("amount out of range".into()))?;
        let cashable = submitted.amount.saturating_sub(submitted.paid_out);
        if amount > cashable {
            return Err(ChainError::Reverted("amount exceeds cheque".into()));
        }
        if U256::from(amount) > target.balance {
            return Err(ChainError::Reverted("insufficient funds".into()));
        }

        submitted.paid_out += amount;
        target.balance -= U256::from(amount);
        debug!(%contract, %beneficiary, amount, "Simulated cash-out");
        Ok(state.mine(true))
    }

    async fn paid_out(&self, contract: Address, beneficiary: Address) -> Result<U256, ChainError> {
        let mut state = self.state.lock();
        state.check_available()?;
        let target = state.contract_mut(contract)?;
        Ok(U256::from(target.cheques.get(&beneficiary).map_or(0, |c| c.paid_out)))
    }

    async fn receipt(&self, tx: TxHash) -> Result<Receipt, ChainError> {
        let state = self.state.lock();
        state.check_available()?;
        state
            .receipts
            .get(&tx)
            .copied()
            .ok_or_else(|| ChainError::Rpc(format!("unknown transaction {tx}")))
    }

    async fn block_time(&self) -> Result<u64, ChainError> {
        let state = self.state.lock();
        state.check_available()?;
        Ok(state.now)
    }
}
