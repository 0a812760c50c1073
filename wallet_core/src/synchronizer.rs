//! Near-real-time, read-only mirror of ledger state for one account.
//!
//! Two field groups are polled on independent fixed intervals. Every read
//! result is folded into the published [`Snapshot`] by a single writer that
//! holds the state lock only for the fold itself, never across a ledger call.
//! Each read takes a sequence number before it goes to the ledger; a result
//! older than the last one applied for its field is dropped, so a slow read
//! can never overwrite a fresher value.

use futures_util::future::join_all;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, trace, warn};

use stakeflow_ledger::{LedgerClient, LedgerError};
use stakeflow_types::{Account, Clock, Contracts, Field, FieldSet};

use crate::periodic::PeriodicTask;
use crate::snapshot::{FieldValue, Snapshot};
use crate::{CoreError, SessionConfig};

/// Fields polled on the slow cadence.
pub const BALANCE_GROUP: FieldSet = FieldSet::EMPTY
    .with(Field::WalletBalance)
    .with(Field::StakePosition)
    .with(Field::Allowance)
    .with(Field::Faucet);

/// Fields polled on the fast cadence for live display.
pub const REWARDS_GROUP: FieldSet = FieldSet::EMPTY.with(Field::PendingRewards);

struct ReadResult {
    field: Field,
    seq: u64,
    result: Result<FieldValue, LedgerError>,
}

struct Subscription {
    id: u64,
    account: Account,
    pollers: Vec<PeriodicTask>,
}

impl Subscription {
    fn stop(self) {
        for poller in &self.pollers {
            poller.cancel();
        }
    }
}

#[derive(Default)]
struct SyncState {
    subscription: Option<Subscription>,
    next_id: u64,
    last_as_of: u64,
    next_seq: u64,
    /// Sequence of the newest read folded in, per field.
    applied: HashMap<Field, u64>,
}

impl SyncState {
    fn live_account(&self, id: u64) -> Option<&Account> {
        self.subscription
            .as_ref()
            .filter(|sub| sub.id == id)
            .map(|sub| &sub.account)
    }

    fn issue_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    /// Records `seq` for `field` unless a newer read already landed.
    fn accept(&mut self, field: Field, seq: u64) -> bool {
        let last = self.applied.entry(field).or_default();
        if seq <= *last {
            return false;
        }
        *last = seq;
        true
    }

    /// Millisecond stamp strictly after the previous one.
    fn next_as_of(&mut self, now_millis: u64) -> u64 {
        let as_of = now_millis.max(self.last_as_of + 1);
        self.last_as_of = as_of;
        as_of
    }
}

struct SyncInner {
    ledger: Arc<dyn LedgerClient>,
    clock: Arc<dyn Clock>,
    contracts: Contracts,
    balance_interval: Duration,
    rewards_interval: Duration,
    snapshot: watch::Sender<Option<Snapshot>>,
    state: Mutex<SyncState>,
}

impl SyncInner {
    async fn read_fields(&self, account: &Account, fields: FieldSet) -> Vec<ReadResult> {
        join_all(
            fields
                .iter()
                .map(|field| async move {
                    let seq = self.state.lock().await.issue_seq();
                    let result = self.read_field(account, field).await;
                    ReadResult { field, seq, result }
                }),
        )
        .await
    }

    async fn read_field(&self, account: &Account, field: Field) -> Result<FieldValue, LedgerError> {
        let contracts = &self.contracts;
        Ok(match field {
            Field::WalletBalance => {
                FieldValue::WalletBalance(self.ledger.balance(account, &contracts.token).await?)
            }
            Field::StakePosition => {
                FieldValue::StakePosition(self.ledger.stake_position(account).await?)
            }
            Field::PendingRewards => {
                FieldValue::PendingRewards(self.ledger.pending_rewards(account).await?)
            }
            Field::Allowance => FieldValue::Allowance(
                self.ledger
                    .allowance(account, &contracts.staking, &contracts.token)
                    .await?,
            ),
            Field::Faucet => FieldValue::Faucet(self.ledger.faucet_state(account).await?),
        })
    }

    /// Fold read results into the published snapshot if subscription `id` is
    /// still live. Returns the snapshot as it stands afterwards.
    async fn apply(&self, id: u64, results: Vec<ReadResult>) -> Option<Snapshot> {
        let mut state = self.state.lock().await;
        let Some(account) = state.live_account(id).cloned() else {
            trace!("discarding reads for a stale subscription");
            return None;
        };

        if self.snapshot.borrow().is_none() {
            return None;
        }

        let mut values = Vec::with_capacity(results.len());
        for ReadResult { field, seq, result } in results {
            match result {
                Ok(value) if state.accept(field, seq) => values.push(value),
                Ok(_) => trace!(account = %account, field = %field, seq, "dropping superseded read"),
                Err(e) => warn!(account = %account, field = %field, error = %e, "read failed, keeping last known value"),
            }
        }
        if values.is_empty() {
            return self.snapshot.borrow().clone();
        }

        let as_of = state.next_as_of(self.clock.now_millis());
        self.snapshot.send_modify(|current| {
            if let Some(snapshot) = current {
                for value in values {
                    snapshot.set(value);
                }
                snapshot.stamp(as_of);
            }
        });
        trace!(account = %account, as_of, "snapshot updated");
        self.snapshot.borrow().clone()
    }
}

/// Owns the one subscription and the snapshot it produces.
///
/// Cheap to clone; clones share the same subscription.
#[derive(Clone)]
pub struct StateSynchronizer {
    inner: Arc<SyncInner>,
}

impl StateSynchronizer {
    pub fn new(ledger: Arc<dyn LedgerClient>, clock: Arc<dyn Clock>, config: &SessionConfig) -> Self {
        let (snapshot, _) = watch::channel(None);
        Self {
            inner: Arc::new(SyncInner {
                ledger,
                clock,
                contracts: config.contracts.clone(),
                balance_interval: config.balance_poll_interval(),
                rewards_interval: config.rewards_poll_interval(),
                snapshot,
                state: Mutex::new(SyncState::default()),
            }),
        }
    }

    /// Start mirroring `account`, replacing any previous subscription.
    ///
    /// Performs one full read before returning. Fails only if every field
    /// fails on that first read; otherwise unknown fields stay `None` until
    /// a later poll succeeds.
    pub async fn subscribe(&self, account: Account) -> Result<Snapshot, CoreError> {
        let id = {
            let mut state = self.inner.state.lock().await;
            if let Some(previous) = state.subscription.take() {
                info!(account = %previous.account, "replacing subscription");
                previous.stop();
            }
            state.next_id += 1;
            state.applied.clear();
            let id = state.next_id;
            state.subscription = Some(Subscription {
                id,
                account: account.clone(),
                pollers: Vec::new(),
            });
            self.inner.snapshot.send_replace(None);
            id
        };

        let results = self.inner.read_fields(&account, FieldSet::ALL).await;

        let mut state = self.inner.state.lock().await;
        if state.live_account(id).is_none() {
            return Err(CoreError::NotSubscribed);
        }

        if results.iter().all(|read| read.result.is_err()) {
            let reasons = results
                .iter()
                .filter_map(|read| {
                    read.result
                        .as_ref()
                        .err()
                        .map(|e| format!("{}: {e}", read.field))
                })
                .collect::<Vec<_>>()
                .join("; ");
            state.subscription = None;
            warn!(account = %account, %reasons, "subscription failed");
            return Err(CoreError::SubscriptionFailed(reasons));
        }

        let as_of = state.next_as_of(self.inner.clock.now_millis());
        let mut snapshot = Snapshot::new(account.clone(), as_of);
        for ReadResult { field, seq, result } in results {
            match result {
                Ok(value) => {
                    state.accept(field, seq);
                    snapshot.set(value);
                }
                Err(e) => warn!(account = %account, field = %field, error = %e, "initial read failed"),
            }
        }
        self.inner.snapshot.send_replace(Some(snapshot.clone()));

        let pollers = vec![
            self.spawn_poller("balance-poll", id, &account, BALANCE_GROUP, self.inner.balance_interval),
            self.spawn_poller("rewards-poll", id, &account, REWARDS_GROUP, self.inner.rewards_interval),
        ];
        if let Some(sub) = state.subscription.as_mut() {
            sub.pollers = pollers;
        }

        info!(account = %account, known = ?snapshot.known_fields(), "subscribed");
        Ok(snapshot)
    }

    /// Stop mirroring `account`. Returns `false` if it was not subscribed.
    ///
    /// Reads already in flight for it are discarded when they land.
    pub async fn unsubscribe(&self, account: &Account) -> bool {
        let mut state = self.inner.state.lock().await;
        match state.subscription.take() {
            Some(sub) if &sub.account == account => {
                sub.stop();
                self.inner.snapshot.send_replace(None);
                info!(account = %account, "unsubscribed");
                true
            }
            other => {
                state.subscription = other;
                false
            }
        }
    }

    /// Immediately re-read `fields` for the subscribed `account`.
    pub async fn refresh(&self, account: &Account, fields: FieldSet) -> Result<Snapshot, CoreError> {
        let id = {
            let state = self.inner.state.lock().await;
            match &state.subscription {
                Some(sub) if &sub.account == account => sub.id,
                _ => return Err(CoreError::NotSubscribed),
            }
        };
        if fields.is_empty() {
            return self.current_snapshot().ok_or(CoreError::NotSubscribed);
        }

        debug!(account = %account, ?fields, "targeted refresh");
        let results = self.inner.read_fields(account, fields).await;
        self.inner
            .apply(id, results)
            .await
            .ok_or(CoreError::NotSubscribed)
    }

    pub fn current_snapshot(&self) -> Option<Snapshot> {
        self.inner.snapshot.borrow().clone()
    }

    /// A receiver notified on every published change. `None` means unsubscribed.
    pub fn watch(&self) -> watch::Receiver<Option<Snapshot>> {
        self.inner.snapshot.subscribe()
    }

    /// The account currently mirrored, once its first read has landed.
    pub fn account(&self) -> Option<Account> {
        self.inner
            .snapshot
            .borrow()
            .as_ref()
            .map(|s| s.account().clone())
    }

    fn spawn_poller(
        &self,
        name: &'static str,
        id: u64,
        account: &Account,
        fields: FieldSet,
        period: Duration,
    ) -> PeriodicTask {
        // Pollers are owned by the state they feed; a weak reference keeps
        // them from holding it alive.
        let inner: Weak<SyncInner> = Arc::downgrade(&self.inner);
        let account = account.clone();
        PeriodicTask::spawn(name, period, move || {
            let inner = inner.clone();
            let account = account.clone();
            async move {
                if let Some(inner) = inner.upgrade() {
                    let results = inner.read_fields(&account, fields).await;
                    inner.apply(id, results).await;
                }
            }
        })
    }
}
