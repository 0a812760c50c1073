//! Per-flow state machines sequencing dependent ledger writes.
//!
//! Each flow kind owns one slot; at most one instance of a kind is
//! outstanding at a time. A flow runs as its own task and reports every state
//! change through one dispatch point, which feeds both the per-kind state
//! watchers and the transition broadcast.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tracing::{debug, info, warn};

use stakeflow_ledger::{LedgerClient, LedgerError};
use stakeflow_types::{Account, Clock, Field, FieldSet, TokenAmount, Transaction, TxHandle, TxKind};

use crate::eligibility;
use crate::flow::{FlowHandle, FlowKind, FlowReport, FlowState, FlowTransition};
use crate::result_handler::{self, ChainedAction, OperationOutcome, OperationResultHandler, Processed, TerminalNotice};
use crate::snapshot::Snapshot;
use crate::synchronizer::StateSynchronizer;
use crate::CoreError;

/// A single ledger write.
#[derive(Clone, Copy, Debug)]
enum WriteOp {
    Approve(TokenAmount),
    Stake(TokenAmount),
    Unstake(TokenAmount),
    Claim,
    FaucetClaim,
}

impl WriteOp {
    fn kind(&self) -> TxKind {
        match self {
            Self::Approve(_) => TxKind::Approve,
            Self::Stake(_) => TxKind::Stake,
            Self::Unstake(_) => TxKind::Unstake,
            Self::Claim => TxKind::Claim,
            Self::FaucetClaim => TxKind::FaucetClaim,
        }
    }

    fn amount(&self) -> Option<TokenAmount> {
        match self {
            Self::Approve(a) | Self::Stake(a) | Self::Unstake(a) => Some(*a),
            Self::Claim | Self::FaucetClaim => None,
        }
    }
}

/// What a flow was asked to do.
#[derive(Clone, Copy, Debug)]
enum FlowPlan {
    Stake(TokenAmount),
    Unstake(TokenAmount),
    Claim,
    Faucet,
}

impl FlowPlan {
    fn kind(&self) -> FlowKind {
        match self {
            Self::Stake(_) => FlowKind::Stake,
            Self::Unstake(_) => FlowKind::Unstake,
            Self::Claim => FlowKind::Claim,
            Self::Faucet => FlowKind::Faucet,
        }
    }

    fn first_state(&self) -> FlowState {
        match self {
            Self::Stake(_) => FlowState::CheckingAllowance,
            Self::Unstake(_) => FlowState::Unstaking,
            Self::Claim | Self::Faucet => FlowState::Claiming,
        }
    }
}

struct OrchInner {
    ledger: Arc<dyn LedgerClient>,
    sync: StateSynchronizer,
    handler: Arc<OperationResultHandler>,
    clock: Arc<dyn Clock>,
    spender: Account,
    /// Occupied slots, each with its abandonment flag.
    slots: Mutex<HashMap<FlowKind, Arc<AtomicBool>>>,
    states: HashMap<FlowKind, watch::Sender<FlowState>>,
    transitions: broadcast::Sender<FlowTransition>,
}

impl OrchInner {
    /// The single dispatch point for flow state changes. Repeating the
    /// current state is a no-op.
    fn transition(&self, kind: FlowKind, state: FlowState) {
        let Some(sender) = self.states.get(&kind) else {
            return;
        };
        let changed = sender.send_if_modified(|current| {
            if *current == state {
                return false;
            }
            *current = state;
            true
        });
        if changed {
            debug!(flow = %kind, ?state, "flow transition");
            let _ = self.transitions.send(FlowTransition { kind, state });
        }
    }

    fn state(&self, kind: FlowKind) -> FlowState {
        self.states
            .get(&kind)
            .map(|s| *s.borrow())
            .unwrap_or(FlowState::Idle)
    }
}

/// Sequences writes for the subscribed account.
#[derive(Clone)]
pub struct TransactionOrchestrator {
    inner: Arc<OrchInner>,
}

impl TransactionOrchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        sync: StateSynchronizer,
        handler: Arc<OperationResultHandler>,
        clock: Arc<dyn Clock>,
        spender: Account,
        event_capacity: usize,
    ) -> Self {
        let (transitions, _) = broadcast::channel(event_capacity);
        let states = FlowKind::ALL
            .into_iter()
            .map(|kind| (kind, watch::channel(FlowState::Idle).0))
            .collect();
        Self {
            inner: Arc::new(OrchInner {
                ledger,
                sync,
                handler,
                clock,
                spender,
                slots: Mutex::new(HashMap::new()),
                states,
                transitions,
            }),
        }
    }

    // ── Submission ──────────────────────────────────────────────────────

    /// Stake `amount` tokens, approving the staking contract first if needed.
    pub async fn submit_stake(&self, amount: &str) -> Result<FlowHandle, CoreError> {
        let amount = TokenAmount::parse_positive(amount)?;
        let account = self.subscribed_account()?;
        self.launch(FlowPlan::Stake(amount), account).await
    }

    /// Unstake `amount` tokens, then claim accrued rewards.
    pub async fn submit_unstake(&self, amount: &str) -> Result<FlowHandle, CoreError> {
        let amount = TokenAmount::parse_positive(amount)?;
        let account = self.subscribed_account()?;
        self.launch(FlowPlan::Unstake(amount), account).await
    }

    pub async fn submit_claim(&self) -> Result<FlowHandle, CoreError> {
        let account = self.subscribed_account()?;
        self.launch(FlowPlan::Claim, account).await
    }

    /// Claim the faucet allotment. Refused without contacting the ledger
    /// while the cooldown is running or before the faucet state is known.
    pub async fn submit_faucet_claim(&self) -> Result<FlowHandle, CoreError> {
        let snapshot = self
            .inner
            .sync
            .current_snapshot()
            .ok_or(CoreError::NotSubscribed)?;
        let faucet = snapshot
            .faucet()
            .ok_or(CoreError::FieldUnavailable(Field::Faucet))?;
        let remaining_secs = eligibility::faucet_remaining(&faucet, self.inner.clock.now());
        if remaining_secs > 0 {
            return Err(CoreError::CooldownActive { remaining_secs });
        }
        self.launch(FlowPlan::Faucet, snapshot.account().clone())
            .await
    }

    // ── Observation ─────────────────────────────────────────────────────

    pub fn flow_state(&self, kind: FlowKind) -> FlowState {
        self.inner.state(kind)
    }

    /// A receiver tracking the latest state of one flow kind.
    pub fn observe(&self, kind: FlowKind) -> watch::Receiver<FlowState> {
        match self.inner.states.get(&kind) {
            Some(sender) => sender.subscribe(),
            None => watch::channel(FlowState::Idle).1,
        }
    }

    /// Every transition of every flow, in dispatch order.
    pub fn transitions(&self) -> broadcast::Receiver<FlowTransition> {
        self.inner.transitions.subscribe()
    }

    /// Drop local bookkeeping for the outstanding flow of `kind`.
    ///
    /// A write already submitted still resolves and is reported; the flow
    /// then ends `Failed` without any further submission. Returns `false` if
    /// no flow of that kind is outstanding.
    pub async fn abandon(&self, kind: FlowKind) -> bool {
        match self.inner.slots.lock().await.get(&kind) {
            Some(flag) => {
                flag.store(true, Ordering::SeqCst);
                info!(flow = %kind, "flow abandoned");
                true
            }
            None => false,
        }
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn subscribed_account(&self) -> Result<Account, CoreError> {
        self.inner.sync.account().ok_or(CoreError::NotSubscribed)
    }

    async fn launch(&self, plan: FlowPlan, account: Account) -> Result<FlowHandle, CoreError> {
        let kind = plan.kind();
        let abandoned = {
            let mut slots = self.inner.slots.lock().await;
            if slots.contains_key(&kind) {
                if kind == FlowKind::Stake && self.inner.state(kind).awaiting_approval() {
                    return Err(CoreError::ApprovalPending);
                }
                return Err(CoreError::FlowBusy(kind));
            }
            let flag = Arc::new(AtomicBool::new(false));
            slots.insert(kind, Arc::clone(&flag));
            self.inner.transition(kind, plan.first_state());
            flag
        };

        info!(flow = %kind, account = %account, ?plan, "flow started");
        let run = FlowRun {
            inner: Arc::clone(&self.inner),
            kind,
            account,
            abandoned,
            outcomes: Vec::new(),
        };
        Ok(FlowHandle::new(kind, tokio::spawn(run.execute(plan))))
    }
}

/// One running flow instance.
struct FlowRun {
    inner: Arc<OrchInner>,
    kind: FlowKind,
    account: Account,
    abandoned: Arc<AtomicBool>,
    outcomes: Vec<OperationOutcome>,
}

impl FlowRun {
    async fn execute(mut self, plan: FlowPlan) -> FlowReport {
        let result = match plan {
            FlowPlan::Stake(amount) => self.stake(amount).await,
            FlowPlan::Unstake(amount) => self.unstake(amount).await,
            FlowPlan::Claim => self.single(WriteOp::Claim).await,
            FlowPlan::Faucet => self.single(WriteOp::FaucetClaim).await,
        }
        .and_then(|()| self.check_abandoned());

        let final_state = match &result {
            Ok(()) => {
                info!(flow = %self.kind, account = %self.account, "flow done");
                FlowState::Done
            }
            Err(e) => {
                warn!(flow = %self.kind, account = %self.account, error = %e, "flow failed");
                FlowState::Failed
            }
        };
        {
            // Release and final transition under one lock so a new flow of
            // this kind cannot interleave its first state between them.
            let mut slots = self.inner.slots.lock().await;
            slots.remove(&self.kind);
            self.inner.transition(self.kind, final_state);
        }

        FlowReport {
            kind: self.kind,
            outcomes: self.outcomes,
            result,
        }
    }

    async fn stake(&mut self, amount: TokenAmount) -> Result<(), CoreError> {
        let snapshot = self
            .inner
            .sync
            .refresh(
                &self.account,
                FieldSet::EMPTY
                    .with(Field::WalletBalance)
                    .with(Field::Allowance),
            )
            .await?;
        ensure_balance(&snapshot, amount)?;
        let allowance = snapshot
            .allowance()
            .ok_or(CoreError::FieldUnavailable(Field::Allowance))?;

        if allowance < amount {
            let approval = self
                .step(
                    WriteOp::Approve(amount),
                    FlowState::Approving,
                    FlowState::WaitingApproval,
                )
                .await?;
            if let Some(ChainedAction::StakeAfterApproval { amount }) = approval.chained {
                self.check_abandoned()?;
                self.revalidate(amount).await?;
            }
        }

        self.step(
            WriteOp::Stake(amount),
            FlowState::Staking,
            FlowState::WaitingStake,
        )
        .await?;
        Ok(())
    }

    async fn unstake(&mut self, amount: TokenAmount) -> Result<(), CoreError> {
        let unstaked = self
            .step(
                WriteOp::Unstake(amount),
                FlowState::Unstaking,
                FlowState::WaitingUnstake,
            )
            .await?;
        // Claim whatever the ledger says is owed, even if we observed zero.
        if let Some(ChainedAction::ClaimAfterUnstake) = unstaked.chained {
            self.step(WriteOp::Claim, FlowState::AutoClaiming, FlowState::WaitingClaim)
                .await?;
        }
        Ok(())
    }

    async fn single(&mut self, op: WriteOp) -> Result<(), CoreError> {
        self.step(op, FlowState::Claiming, FlowState::WaitingClaim)
            .await?;
        Ok(())
    }

    /// Balance and allowance must still cover `amount` right before the
    /// dependent stake goes out.
    async fn revalidate(&self, amount: TokenAmount) -> Result<(), CoreError> {
        let mut fields = FieldSet::EMPTY.with(Field::WalletBalance);
        let allowance_known_sufficient = self
            .inner
            .sync
            .current_snapshot()
            .and_then(|s| s.allowance())
            .is_some_and(|a| a >= amount);
        if !allowance_known_sufficient {
            fields.insert(Field::Allowance);
        }

        let snapshot = self.inner.sync.refresh(&self.account, fields).await?;
        ensure_balance(&snapshot, amount)?;
        let available = snapshot.allowance().unwrap_or(TokenAmount::ZERO);
        if available < amount {
            return Err(CoreError::InsufficientAllowance {
                needed: amount,
                available,
            });
        }
        Ok(())
    }

    /// Submit one write, wait for it to settle, and hand the result to the
    /// result handler.
    async fn step(
        &mut self,
        op: WriteOp,
        submitting: FlowState,
        waiting: FlowState,
    ) -> Result<Processed, CoreError> {
        self.check_abandoned()?;
        self.transition(submitting);

        let tx_kind = op.kind();
        let handle = match self.submit(op).await {
            Ok(handle) => handle,
            Err(e) => {
                let error = CoreError::from(e.clone());
                let outcome = self
                    .inner
                    .handler
                    .report_submission_failure(self.kind, tx_kind, e);
                self.outcomes.push(outcome);
                return Err(error);
            }
        };
        info!(flow = %self.kind, tx = %handle, kind = %tx_kind, "transaction submitted");
        self.inner
            .handler
            .track(Transaction::new(handle.clone(), tx_kind))
            .await;
        self.transition(waiting);

        let result = self.inner.ledger.wait_for_receipt(&handle).await;
        let notice = TerminalNotice {
            flow: self.kind,
            account: self.account.clone(),
            tx: handle,
            tx_kind,
            amount: op.amount(),
            result,
        };
        let processed = match self.inner.handler.handle(notice.clone()).await {
            Some(processed) => {
                self.outcomes.push(processed.outcome.clone());
                processed
            }
            None => result_handler::evaluate(&notice),
        };

        match &processed.outcome.error {
            Some(e) => Err(e.clone()),
            None => Ok(processed),
        }
    }

    async fn submit(&self, op: WriteOp) -> Result<TxHandle, LedgerError> {
        let ledger = &self.inner.ledger;
        match op {
            WriteOp::Approve(amount) => ledger.approve(&self.inner.spender, amount).await,
            WriteOp::Stake(amount) => ledger.stake(amount).await,
            WriteOp::Unstake(amount) => ledger.unstake(amount).await,
            WriteOp::Claim => ledger.claim_reward().await,
            WriteOp::FaucetClaim => ledger.claim_faucet().await,
        }
    }

    fn transition(&self, state: FlowState) {
        self.inner.transition(self.kind, state);
    }

    fn check_abandoned(&self) -> Result<(), CoreError> {
        if self.abandoned.load(Ordering::SeqCst) {
            return Err(CoreError::Abandoned);
        }
        Ok(())
    }
}

fn ensure_balance(snapshot: &Snapshot, amount: TokenAmount) -> Result<(), CoreError> {
    let available = snapshot
        .wallet_balance()
        .ok_or(CoreError::FieldUnavailable(Field::WalletBalance))?;
    if amount > available {
        return Err(CoreError::InsufficientBalance {
            needed: amount,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SessionConfig;
    use stakeflow_nullables::{NullClock, NullLedger};
    use stakeflow_types::{AmountError, Contracts};

    fn account(byte: u8) -> Account {
        Account::parse(&format!("0x{}", format!("{byte:02x}").repeat(20))).unwrap()
    }

    fn orchestrator() -> (Arc<NullLedger>, StateSynchronizer, TransactionOrchestrator) {
        let clock = Arc::new(NullClock::new(1_700_000_000));
        let contracts = Contracts {
            token: account(0xbb),
            staking: account(0xcc),
        };
        let ledger = Arc::new(NullLedger::new(account(0xaa), contracts.clone(), clock.clone()));
        let mut config = SessionConfig::new(contracts.clone());
        config.balance_poll_interval_ms = 3_600_000;
        config.rewards_poll_interval_ms = 3_600_000;
        let sync = StateSynchronizer::new(ledger.clone(), clock.clone(), &config);
        let handler = Arc::new(OperationResultHandler::new(sync.clone(), 16, 16));
        let orch = TransactionOrchestrator::new(
            ledger.clone(),
            sync.clone(),
            handler,
            clock,
            contracts.staking,
            16,
        );
        (ledger, sync, orch)
    }

    #[test]
    fn write_ops_carry_kind_and_amount() {
        let a = TokenAmount::from_whole(3);
        assert_eq!(WriteOp::Approve(a).kind(), TxKind::Approve);
        assert_eq!(WriteOp::Unstake(a).amount(), Some(a));
        assert_eq!(WriteOp::FaucetClaim.amount(), None);
        assert_eq!(FlowPlan::Faucet.first_state(), FlowState::Claiming);
    }

    #[tokio::test]
    async fn validation_precedes_subscription_check() {
        let (ledger, _sync, orch) = orchestrator();
        assert_eq!(
            orch.submit_stake("0").await.err(),
            Some(CoreError::Validation(AmountError::Zero))
        );
        assert_eq!(
            orch.submit_stake("5").await.err(),
            Some(CoreError::NotSubscribed)
        );
        assert!(ledger.submissions().is_empty());
    }

    #[tokio::test]
    async fn repeated_state_is_not_rebroadcast() {
        let (_ledger, _sync, orch) = orchestrator();
        let mut rx = orch.transitions();
        orch.inner.transition(FlowKind::Claim, FlowState::Claiming);
        orch.inner.transition(FlowKind::Claim, FlowState::Claiming);
        assert_eq!(rx.recv().await.unwrap().state, FlowState::Claiming);
        assert!(rx.try_recv().is_err());
        assert_eq!(orch.flow_state(FlowKind::Claim), FlowState::Claiming);
    }

    #[tokio::test]
    async fn abandon_without_flow_is_false() {
        let (_ledger, sync, orch) = orchestrator();
        sync.subscribe(account(0xaa)).await.unwrap();
        assert!(!orch.abandon(FlowKind::Stake).await);
    }
}
