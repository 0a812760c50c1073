//! Terminal-outcome processing: one outcome, one refresh, one chained step.

use std::collections::HashMap;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use stakeflow_ledger::LedgerError;
use stakeflow_types::{Account, Field, FieldSet, TokenAmount, Transaction, TxHandle, TxKind, TxReceipt, TxStatus};

use crate::flow::FlowKind;
use crate::processed::ProcessedSet;
use crate::synchronizer::StateSynchronizer;
use crate::CoreError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// What the user is told about one transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationOutcome {
    pub kind: OutcomeKind,
    pub tx_kind: TxKind,
    pub message: String,
    /// `None` when the write was refused before a handle existed.
    pub tx: Option<TxHandle>,
    pub error: Option<CoreError>,
}

impl OperationOutcome {
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    /// Whether starting the same flow again may succeed.
    pub fn retryable(&self) -> bool {
        self.error.as_ref().is_some_and(CoreError::is_retryable)
    }
}

/// Follow-up the owning flow must perform next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainedAction {
    StakeAfterApproval { amount: TokenAmount },
    ClaimAfterUnstake,
}

/// The terminal state of one submitted transaction, as observed by a flow.
#[derive(Clone, Debug)]
pub struct TerminalNotice {
    pub flow: FlowKind,
    pub account: Account,
    pub tx: TxHandle,
    pub tx_kind: TxKind,
    pub amount: Option<TokenAmount>,
    pub result: Result<TxReceipt, LedgerError>,
}

impl TerminalNotice {
    pub fn status(&self) -> TxStatus {
        match &self.result {
            Ok(receipt) => receipt.status,
            Err(_) => TxStatus::Failed,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Processed {
    pub outcome: OperationOutcome,
    pub invalidated: FieldSet,
    pub chained: Option<ChainedAction>,
}

/// Fields a confirmed transaction of `kind` can have changed.
pub fn invalidation_set(kind: TxKind) -> FieldSet {
    use Field::*;
    match kind {
        TxKind::Approve => FieldSet::EMPTY.with(Allowance),
        TxKind::Stake => FieldSet::EMPTY
            .with(WalletBalance)
            .with(StakePosition)
            .with(Allowance)
            .with(PendingRewards),
        TxKind::Unstake => FieldSet::EMPTY
            .with(WalletBalance)
            .with(StakePosition)
            .with(PendingRewards),
        TxKind::Claim => FieldSet::EMPTY.with(WalletBalance).with(PendingRewards),
        TxKind::FaucetClaim => FieldSet::EMPTY.with(WalletBalance).with(Faucet),
    }
}

/// Pure mapping from a terminal notice to its outcome, refresh set and chain.
pub fn evaluate(notice: &TerminalNotice) -> Processed {
    let error = match &notice.result {
        Ok(receipt) if receipt.status == TxStatus::Confirmed => None,
        Ok(receipt) => Some(CoreError::TransactionReverted(
            receipt
                .detail
                .clone()
                .unwrap_or_else(|| "execution reverted".into()),
        )),
        Err(e) => Some(CoreError::from(e.clone())),
    };

    let Some(error) = error else {
        let chained = match (notice.flow, notice.tx_kind, notice.amount) {
            (FlowKind::Stake, TxKind::Approve, Some(amount)) => {
                Some(ChainedAction::StakeAfterApproval { amount })
            }
            (FlowKind::Unstake, TxKind::Unstake, _) => Some(ChainedAction::ClaimAfterUnstake),
            _ => None,
        };
        return Processed {
            outcome: OperationOutcome {
                kind: OutcomeKind::Success,
                tx_kind: notice.tx_kind,
                message: success_message(notice.tx_kind, notice.amount),
                tx: Some(notice.tx.clone()),
                error: None,
            },
            invalidated: invalidation_set(notice.tx_kind),
            chained,
        };
    };

    Processed {
        outcome: OperationOutcome {
            kind: OutcomeKind::Failure,
            tx_kind: notice.tx_kind,
            message: format!("{} failed: {error}", notice.tx_kind),
            tx: Some(notice.tx.clone()),
            error: Some(error),
        },
        invalidated: FieldSet::EMPTY,
        chained: None,
    }
}

fn success_message(kind: TxKind, amount: Option<TokenAmount>) -> String {
    let amount = amount.map(|a| a.to_string()).unwrap_or_default();
    match kind {
        TxKind::Approve => format!("Approved the staking contract to spend {amount} tokens"),
        TxKind::Stake => format!("Staked {amount} tokens"),
        TxKind::Unstake => format!("Unstaked {amount} tokens"),
        TxKind::Claim => "Rewards claimed".to_string(),
        TxKind::FaucetClaim => "Faucet tokens claimed".to_string(),
    }
}

struct HandlerState {
    in_flight: HashMap<TxHandle, Transaction>,
    processed: ProcessedSet,
}

/// Turns terminal transaction states into outcomes exactly once.
pub struct OperationResultHandler {
    sync: StateSynchronizer,
    state: Mutex<HandlerState>,
    outcomes: broadcast::Sender<OperationOutcome>,
}

impl OperationResultHandler {
    pub fn new(sync: StateSynchronizer, processed_capacity: usize, outcome_capacity: usize) -> Self {
        let (outcomes, _) = broadcast::channel(outcome_capacity);
        Self {
            sync,
            state: Mutex::new(HandlerState {
                in_flight: HashMap::new(),
                processed: ProcessedSet::new(processed_capacity),
            }),
            outcomes,
        }
    }

    /// Notification stream of every outcome, in processing order.
    pub fn subscribe_outcomes(&self) -> broadcast::Receiver<OperationOutcome> {
        self.outcomes.subscribe()
    }

    /// Register a freshly submitted transaction.
    pub async fn track(&self, tx: Transaction) {
        debug!(tx = %tx.handle(), kind = %tx.kind(), "tracking transaction");
        self.state
            .lock()
            .await
            .in_flight
            .insert(tx.handle().clone(), tx);
    }

    /// Process a terminal notice. Returns `None` if this handle was already
    /// processed, in which case nothing is reported or refreshed.
    pub async fn handle(&self, notice: TerminalNotice) -> Option<Processed> {
        {
            let mut state = self.state.lock().await;
            if !state.processed.insert(notice.tx.clone()) {
                debug!(tx = %notice.tx, "duplicate terminal notice ignored");
                return None;
            }
            let mut tx = state
                .in_flight
                .remove(&notice.tx)
                .unwrap_or_else(|| Transaction::new(notice.tx.clone(), notice.tx_kind));
            if let Err(e) = tx.settle(notice.status()) {
                warn!(tx = %notice.tx, error = %e, "could not settle transaction");
            }
        }

        let processed = evaluate(&notice);
        match processed.outcome.kind {
            OutcomeKind::Success => info!(
                flow = %notice.flow,
                tx = %notice.tx,
                kind = %notice.tx_kind,
                "transaction confirmed"
            ),
            OutcomeKind::Failure => warn!(
                flow = %notice.flow,
                tx = %notice.tx,
                kind = %notice.tx_kind,
                message = %processed.outcome.message,
                "transaction failed"
            ),
        }

        if !processed.invalidated.is_empty() {
            if let Err(e) = self.sync.refresh(&notice.account, processed.invalidated).await {
                warn!(account = %notice.account, error = %e, "post-confirmation refresh skipped");
            }
        }
        let _ = self.outcomes.send(processed.outcome.clone());
        Some(processed)
    }

    /// Report a write the signer refused before any handle existed.
    pub fn report_submission_failure(
        &self,
        flow: FlowKind,
        tx_kind: TxKind,
        err: LedgerError,
    ) -> OperationOutcome {
        let error = CoreError::from(err);
        warn!(flow = %flow, kind = %tx_kind, error = %error, "submission refused");
        let outcome = OperationOutcome {
            kind: OutcomeKind::Failure,
            tx_kind,
            message: format!("{tx_kind} failed: {error}"),
            tx: None,
            error: Some(error),
        };
        let _ = self.outcomes.send(outcome.clone());
        outcome
    }

    /// Transactions submitted but not yet processed.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }
}
