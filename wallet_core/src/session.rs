//! The facade handed to the presentation layer.

use std::sync::Arc;
use tokio::sync::{broadcast, watch};

use stakeflow_ledger::LedgerClient;
use stakeflow_types::{Account, Clock, Field, TokenAmount};

use crate::eligibility::{self, Eligibility};
use crate::flow::{FlowHandle, FlowKind, FlowState, FlowTransition};
use crate::orchestrator::TransactionOrchestrator;
use crate::result_handler::{OperationOutcome, OperationResultHandler};
use crate::snapshot::Snapshot;
use crate::synchronizer::StateSynchronizer;
use crate::{CoreError, SessionConfig};

/// One wallet session: a synchronized snapshot plus the flows acting on it.
pub struct StakingSession {
    config: SessionConfig,
    clock: Arc<dyn Clock>,
    sync: StateSynchronizer,
    handler: Arc<OperationResultHandler>,
    orchestrator: TransactionOrchestrator,
}

impl StakingSession {
    pub fn new(
        ledger: Arc<dyn LedgerClient>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let sync = StateSynchronizer::new(Arc::clone(&ledger), Arc::clone(&clock), &config);
        let handler = Arc::new(OperationResultHandler::new(
            sync.clone(),
            config.processed_tx_capacity,
            config.flow_event_capacity,
        ));
        let orchestrator = TransactionOrchestrator::new(
            ledger,
            sync.clone(),
            Arc::clone(&handler),
            Arc::clone(&clock),
            config.contracts.staking.clone(),
            config.flow_event_capacity,
        );
        Ok(Self {
            config,
            clock,
            sync,
            handler,
            orchestrator,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ── Account lifecycle ───────────────────────────────────────────────

    pub async fn subscribe(&self, account: Account) -> Result<Snapshot, CoreError> {
        self.sync.subscribe(account).await
    }

    pub async fn unsubscribe(&self, account: &Account) -> bool {
        self.sync.unsubscribe(account).await
    }

    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.sync.current_snapshot()
    }

    pub fn watch_snapshot(&self) -> watch::Receiver<Option<Snapshot>> {
        self.sync.watch()
    }

    // ── Flows ───────────────────────────────────────────────────────────

    pub async fn submit_stake(&self, amount: &str) -> Result<FlowHandle, CoreError> {
        self.orchestrator.submit_stake(amount).await
    }

    pub async fn submit_unstake(&self, amount: &str) -> Result<FlowHandle, CoreError> {
        self.orchestrator.submit_unstake(amount).await
    }

    pub async fn submit_claim(&self) -> Result<FlowHandle, CoreError> {
        self.orchestrator.submit_claim().await
    }

    pub async fn submit_faucet_claim(&self) -> Result<FlowHandle, CoreError> {
        self.orchestrator.submit_faucet_claim().await
    }

    pub async fn abandon(&self, kind: FlowKind) -> bool {
        self.orchestrator.abandon(kind).await
    }

    pub fn flow_state(&self, kind: FlowKind) -> FlowState {
        self.orchestrator.flow_state(kind)
    }

    pub fn observe_flow(&self, kind: FlowKind) -> watch::Receiver<FlowState> {
        self.orchestrator.observe(kind)
    }

    pub fn flow_transitions(&self) -> broadcast::Receiver<FlowTransition> {
        self.orchestrator.transitions()
    }

    pub fn outcomes(&self) -> broadcast::Receiver<OperationOutcome> {
        self.handler.subscribe_outcomes()
    }

    // ── Derived ─────────────────────────────────────────────────────────

    /// The whole wallet balance, for staking everything.
    pub fn max_stake(&self) -> Result<TokenAmount, CoreError> {
        let snapshot = self.sync.current_snapshot().ok_or(CoreError::NotSubscribed)?;
        snapshot
            .wallet_balance()
            .ok_or(CoreError::FieldUnavailable(Field::WalletBalance))
    }

    /// The whole staked amount, for unstaking everything.
    pub fn max_unstake(&self) -> Result<TokenAmount, CoreError> {
        let snapshot = self.sync.current_snapshot().ok_or(CoreError::NotSubscribed)?;
        snapshot
            .stake_position()
            .map(|position| position.amount)
            .ok_or(CoreError::FieldUnavailable(Field::StakePosition))
    }

    /// Faucet eligibility and reward projection at the current time.
    /// `None` while no account is subscribed.
    pub fn eligibility(&self) -> Option<Eligibility> {
        let snapshot = self.sync.current_snapshot()?;
        Some(eligibility::evaluate(
            &snapshot,
            self.clock.now(),
            self.config.annual_rate_bps,
        ))
    }
}
