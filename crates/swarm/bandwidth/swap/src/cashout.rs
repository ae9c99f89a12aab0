//! Cashing received cheques on chain.
//!
//! A cheque is first submitted to the issuer's contract, which starts its
//! cash-in delay. Once the chain's block time has passed the delay, whatever
//! the cheque covers beyond the contract's paid-out total is cashed to the
//! local beneficiary. Amounts left behind by an earlier failed cash-out are
//! picked up by the next one.

use std::{sync::Arc, time::Duration};

use alloy_primitives::U256;
use tracing::{debug, info, warn};
use vertex_swarm_bandwidth_chequebook::{ChainError, Cheque, Receipt, TxHash};

use crate::{Swap, SwapError, constants::CASHOUT_POLL_INTERVAL};

/// Submit `cheque` and cash its outstanding amount once the delay has passed.
///
/// Failures are logged; the cheque stays recorded in the ledger and a later
/// cheque from the same peer covers the cumulative amount.
pub(crate) async fn cash_out(swap: Arc<Swap>, cheque: Cheque) {
    let contract = cheque.contract();
    let serial = cheque.serial();
    match try_cash_out(&swap, &cheque).await {
        Ok(Some((tx, amount))) => info!(%contract, serial, %amount, %tx, "Cashed cheque"),
        Ok(None) => debug!(%contract, serial, "Cheque already cashed"),
        Err(SwapError::Cancelled) => debug!(%contract, serial, "Cash-out cancelled"),
        Err(e) => warn!(%contract, serial, error = %e, "Cash-out failed"),
    }
}

async fn try_cash_out(
    swap: &Swap,
    cheque: &Cheque,
) -> Result<Option<(TxHash, U256)>, SwapError> {
    let backend = swap.backend();

    let submitted = cancellable(swap, backend.submit_cheque(cheque)).await?;
    let receipt = confirmed(swap, submitted).await?;
    debug!(contract = %cheque.contract(), serial = cheque.serial(), "Cheque submitted");

    let ready_at = receipt.block_time.saturating_add(cheque.params.timeout);
    loop {
        let now = cancellable(swap, backend.block_time()).await?;
        if now >= ready_at {
            break;
        }
        let wait = Duration::from_secs(ready_at - now).min(CASHOUT_POLL_INTERVAL);
        cancellable(swap, async {
            tokio::time::sleep(wait).await;
            Ok(())
        })
        .await?;
    }

    let beneficiary = swap.owner().address();
    let paid = cancellable(swap, backend.paid_out(cheque.contract(), beneficiary)).await?;
    let amount = U256::from(cheque.amount()).saturating_sub(paid);
    if amount.is_zero() {
        return Ok(None);
    }

    let tx = cancellable(swap, backend.cash_cheque(cheque.contract(), beneficiary, amount)).await?;
    confirmed(swap, tx).await?;
    Ok(Some((tx, amount)))
}

async fn confirmed(swap: &Swap, tx: TxHash) -> Result<Receipt, SwapError> {
    let receipt = cancellable(swap, swap.backend().receipt(tx)).await?;
    if !receipt.success {
        return Err(ChainError::Reverted(format!("transaction {tx} failed")).into());
    }
    Ok(receipt)
}

async fn cancellable<T>(
    swap: &Swap,
    fut: impl Future<Output = Result<T, ChainError>>,
) -> Result<T, SwapError> {
    let cancel = swap.cancellation_token();
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SwapError::Cancelled),
        res = fut => Ok(res?),
    }
}
