//! In-memory token and staking ledger for tests.
//!
//! Writes are signed by a single owner account and take effect when their
//! receipt is awaited, using the shared [`NullClock`] as block time. Every
//! submission and settlement is recorded so tests can assert on ordering.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;

use stakeflow_ledger::{LedgerClient, LedgerError};
use stakeflow_types::time::DAY_SECS;
use stakeflow_types::{
    Account, Clock, Contracts, FaucetState, Field, FieldSet, StakePosition, Timestamp,
    TokenAmount, TxHandle, TxKind, TxReceipt, TxStatus,
};

use crate::NullClock;

/// Something that happened on the null ledger, in order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LedgerEvent {
    Submitted(TxKind, TxHandle),
    Confirmed(TxKind, TxHandle),
    Failed(TxKind, TxHandle),
}

#[derive(Clone, Debug)]
enum PendingOp {
    Approve { spender: Account, amount: TokenAmount },
    Stake(TokenAmount),
    Unstake(TokenAmount),
    Claim,
    Faucet,
}

impl PendingOp {
    fn kind(&self) -> TxKind {
        match self {
            Self::Approve { .. } => TxKind::Approve,
            Self::Stake(_) => TxKind::Stake,
            Self::Unstake(_) => TxKind::Unstake,
            Self::Claim => TxKind::Claim,
            Self::Faucet => TxKind::FaucetClaim,
        }
    }
}

#[derive(Clone, Debug)]
struct AccountState {
    balance: TokenAmount,
    allowances: HashMap<Account, TokenAmount>,
    stake: StakePosition,
    rewards: TokenAmount,
    faucet: FaucetState,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            balance: TokenAmount::ZERO,
            allowances: HashMap::new(),
            stake: StakePosition::default(),
            rewards: TokenAmount::ZERO,
            faucet: FaucetState {
                last_claimed_at: Timestamp::EPOCH,
                cooldown_secs: NullLedger::DEFAULT_FAUCET_COOLDOWN_SECS,
                claim_amount: TokenAmount::from_whole(100),
            },
        }
    }
}

#[derive(Default)]
struct LedgerState {
    accounts: HashMap<Account, AccountState>,
    pending: HashMap<TxHandle, PendingOp>,
    receipts: HashMap<TxHandle, TxReceipt>,
    events: Vec<LedgerEvent>,
    reads: HashMap<Field, usize>,
    failing_reads: FieldSet,
    held_reads: FieldSet,
    reject_next: HashSet<TxKind>,
    revert_next: HashSet<TxKind>,
    timeout_next: HashSet<TxKind>,
}

/// A scripted, in-memory [`LedgerClient`].
///
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullLedger {
    owner: Account,
    contracts: Contracts,
    clock: Arc<NullClock>,
    state: Mutex<LedgerState>,
    /// Confirmations proceed while this is `true`.
    gate: watch::Sender<bool>,
    /// Held reads return while this is `true`.
    read_gate: watch::Sender<bool>,
    next_id: AtomicU64,
}

impl NullLedger {
    /// One year, matching the faucet contract's default.
    pub const DEFAULT_FAUCET_COOLDOWN_SECS: u64 = 365 * DAY_SECS;

    pub fn new(owner: Account, contracts: Contracts, clock: Arc<NullClock>) -> Self {
        let (gate, _) = watch::channel(true);
        let (read_gate, _) = watch::channel(true);
        Self {
            owner,
            contracts,
            clock,
            state: Mutex::new(LedgerState::default()),
            gate,
            read_gate,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn owner(&self) -> &Account {
        &self.owner
    }

    fn with_account<T>(&self, account: &Account, f: impl FnOnce(&mut AccountState) -> T) -> T {
        let mut st = self.state.lock().unwrap();
        f(st.accounts.entry(account.clone()).or_default())
    }

    // ── Seeding ─────────────────────────────────────────────────────────

    pub fn set_balance(&self, account: &Account, amount: TokenAmount) {
        self.with_account(account, |a| a.balance = amount);
    }

    pub fn set_allowance(&self, owner: &Account, spender: &Account, amount: TokenAmount) {
        self.with_account(owner, |a| {
            a.allowances.insert(spender.clone(), amount);
        });
    }

    pub fn set_stake(&self, account: &Account, position: StakePosition) {
        self.with_account(account, |a| a.stake = position);
    }

    pub fn set_rewards(&self, account: &Account, amount: TokenAmount) {
        self.with_account(account, |a| a.rewards = amount);
    }

    pub fn set_faucet(&self, account: &Account, faucet: FaucetState) {
        self.with_account(account, |a| a.faucet = faucet);
    }

    // ── Inspection ──────────────────────────────────────────────────────

    pub fn balance_of(&self, account: &Account) -> TokenAmount {
        self.with_account(account, |a| a.balance)
    }

    pub fn stake_of(&self, account: &Account) -> StakePosition {
        self.with_account(account, |a| a.stake)
    }

    pub fn allowance_of(&self, owner: &Account, spender: &Account) -> TokenAmount {
        self.with_account(owner, |a| {
            a.allowances.get(spender).copied().unwrap_or(TokenAmount::ZERO)
        })
    }

    /// Every submission and settlement so far, in order.
    pub fn events(&self) -> Vec<LedgerEvent> {
        self.state.lock().unwrap().events.clone()
    }

    /// Kinds of all submitted transactions, in submission order.
    pub fn submissions(&self) -> Vec<TxKind> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                LedgerEvent::Submitted(kind, _) => Some(kind),
                _ => None,
            })
            .collect()
    }

    /// Number of reads issued for a field (failed reads included).
    pub fn reads(&self, field: Field) -> usize {
        self.state
            .lock()
            .unwrap()
            .reads
            .get(&field)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_reads(&self) -> usize {
        self.state.lock().unwrap().reads.values().sum()
    }

    // ── Scripting ───────────────────────────────────────────────────────

    /// Make every read of `field` fail until [`NullLedger::restore_reads`].
    pub fn fail_reads(&self, field: Field) {
        self.state.lock().unwrap().failing_reads.insert(field);
    }

    pub fn restore_reads(&self, field: Field) {
        self.state.lock().unwrap().failing_reads.remove(field);
    }

    /// The next read of `field` takes its value when issued but does not
    /// return it until [`NullLedger::release_reads`].
    pub fn hold_next_read(&self, field: Field) {
        self.state.lock().unwrap().held_reads.insert(field);
        self.read_gate.send_replace(false);
    }

    /// Let every held read return.
    pub fn release_reads(&self) {
        self.state.lock().unwrap().held_reads = FieldSet::EMPTY;
        self.read_gate.send_replace(true);
    }

    /// The next submission of `kind` is declined by the signer.
    pub fn reject_next(&self, kind: TxKind) {
        self.state.lock().unwrap().reject_next.insert(kind);
    }

    /// The next transaction of `kind` is mined but reverts.
    pub fn revert_next(&self, kind: TxKind) {
        self.state.lock().unwrap().revert_next.insert(kind);
    }

    /// The next confirmation wait for `kind` times out.
    pub fn time_out_next(&self, kind: TxKind) {
        self.state.lock().unwrap().timeout_next.insert(kind);
    }

    /// Hold every confirmation wait until [`NullLedger::resume_confirmations`].
    pub fn pause_confirmations(&self) {
        self.gate.send_replace(false);
    }

    pub fn resume_confirmations(&self) {
        self.gate.send_replace(true);
    }

    // ── Internals ───────────────────────────────────────────────────────

    async fn read<T>(
        &self,
        field: Field,
        account: &Account,
        f: impl FnOnce(&AccountState) -> T,
    ) -> Result<T, LedgerError> {
        let (value, held) = {
            let mut st = self.state.lock().unwrap();
            *st.reads.entry(field).or_default() += 1;
            if st.failing_reads.contains(field) {
                return Err(LedgerError::Network(format!("{field} read failed")));
            }
            let held = st.held_reads.contains(field);
            st.held_reads.remove(field);
            (f(st.accounts.entry(account.clone()).or_default()), held)
        };
        if held {
            self.read_gate
                .subscribe()
                .wait_for(|open| *open)
                .await
                .map_err(|_| LedgerError::Network("null ledger dropped".into()))?;
        }
        Ok(value)
    }

    fn submit(&self, op: PendingOp) -> Result<TxHandle, LedgerError> {
        let kind = op.kind();
        let mut st = self.state.lock().unwrap();
        if st.reject_next.remove(&kind) {
            return Err(LedgerError::Rejected("user denied transaction signature".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = TxHandle::new(format!("0x{id:064x}"));
        st.pending.insert(handle.clone(), op);
        st.events.push(LedgerEvent::Submitted(kind, handle.clone()));
        Ok(handle)
    }

    fn apply(&self, account: &mut AccountState, op: &PendingOp, now: Timestamp) -> Result<(), String> {
        match op {
            PendingOp::Approve { spender, amount } => {
                account.allowances.insert(spender.clone(), *amount);
            }
            PendingOp::Stake(amount) => {
                let allowance = account
                    .allowances
                    .get(&self.contracts.staking)
                    .copied()
                    .unwrap_or(TokenAmount::ZERO);
                let remaining_allowance = allowance
                    .checked_sub(*amount)
                    .ok_or("ERC20: insufficient allowance")?;
                let balance = account
                    .balance
                    .checked_sub(*amount)
                    .ok_or("ERC20: transfer amount exceeds balance")?;
                let staked = account
                    .stake
                    .amount
                    .checked_add(*amount)
                    .ok_or("stake overflow")?;
                account.balance = balance;
                account
                    .allowances
                    .insert(self.contracts.staking.clone(), remaining_allowance);
                if account.stake.amount.is_zero() {
                    account.stake.start_time = now;
                }
                account.stake.amount = staked;
            }
            PendingOp::Unstake(amount) => {
                let staked = account
                    .stake
                    .amount
                    .checked_sub(*amount)
                    .ok_or("unstake amount exceeds stake")?;
                account.balance = account
                    .balance
                    .checked_add(*amount)
                    .ok_or("balance overflow")?;
                account.stake.amount = staked;
            }
            PendingOp::Claim => {
                account.balance = account
                    .balance
                    .checked_add(account.rewards)
                    .ok_or("balance overflow")?;
                account.rewards = TokenAmount::ZERO;
            }
            PendingOp::Faucet => {
                let faucet = account.faucet;
                if !faucet.last_claimed_at.has_expired(faucet.cooldown_secs, now) {
                    return Err("faucet cooldown active".into());
                }
                account.balance = account
                    .balance
                    .checked_add(faucet.claim_amount)
                    .ok_or("balance overflow")?;
                account.faucet.last_claimed_at = now;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerClient for NullLedger {
    async fn balance(&self, account: &Account, _token: &Account) -> Result<TokenAmount, LedgerError> {
        self.read(Field::WalletBalance, account, |a| a.balance).await
    }

    async fn allowance(
        &self,
        owner: &Account,
        spender: &Account,
        _token: &Account,
    ) -> Result<TokenAmount, LedgerError> {
        self.read(Field::Allowance, owner, |a| {
            a.allowances.get(spender).copied().unwrap_or(TokenAmount::ZERO)
        })
        .await
    }

    async fn stake_position(&self, account: &Account) -> Result<StakePosition, LedgerError> {
        self.read(Field::StakePosition, account, |a| a.stake).await
    }

    async fn pending_rewards(&self, account: &Account) -> Result<TokenAmount, LedgerError> {
        self.read(Field::PendingRewards, account, |a| a.rewards).await
    }

    async fn faucet_state(&self, account: &Account) -> Result<FaucetState, LedgerError> {
        self.read(Field::Faucet, account, |a| a.faucet).await
    }

    async fn approve(&self, spender: &Account, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(PendingOp::Approve {
            spender: spender.clone(),
            amount,
        })
    }

    async fn stake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(PendingOp::Stake(amount))
    }

    async fn unstake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(PendingOp::Unstake(amount))
    }

    async fn claim_reward(&self) -> Result<TxHandle, LedgerError> {
        self.submit(PendingOp::Claim)
    }

    async fn claim_faucet(&self) -> Result<TxHandle, LedgerError> {
        self.submit(PendingOp::Faucet)
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError> {
        let mut gate = self.gate.subscribe();
        gate.wait_for(|open| *open)
            .await
            .map_err(|_| LedgerError::Network("null ledger dropped".into()))?;

        let mut st = self.state.lock().unwrap();
        if let Some(receipt) = st.receipts.get(tx) {
            return Ok(receipt.clone());
        }
        let op = st
            .pending
            .remove(tx)
            .ok_or_else(|| LedgerError::InvalidResponse(format!("unknown transaction {tx}")))?;
        let kind = op.kind();

        if st.timeout_next.remove(&kind) {
            st.pending.insert(tx.clone(), op);
            return Err(LedgerError::Timeout {
                handle: tx.clone(),
                waited_secs: 120,
            });
        }

        let now = self.clock.now();
        let outcome = if st.revert_next.remove(&kind) {
            Err("execution reverted".to_string())
        } else {
            let account = st.accounts.entry(self.owner.clone()).or_default();
            self.apply(account, &op, now)
        };

        let receipt = match outcome {
            Ok(()) => {
                st.events.push(LedgerEvent::Confirmed(kind, tx.clone()));
                TxReceipt {
                    status: TxStatus::Confirmed,
                    block_timestamp: now,
                    detail: None,
                }
            }
            Err(reason) => {
                st.events.push(LedgerEvent::Failed(kind, tx.clone()));
                TxReceipt {
                    status: TxStatus::Failed,
                    block_timestamp: now,
                    detail: Some(reason),
                }
            }
        };
        st.receipts.insert(tx.clone(), receipt.clone());
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn account(byte: u8) -> Account {
        Account::parse(&format!("0x{}", hex_byte(byte).repeat(20))).unwrap()
    }

    fn hex_byte(byte: u8) -> String {
        format!("{byte:02x}")
    }

    fn setup() -> (Arc<NullClock>, NullLedger, Contracts) {
        let clock = Arc::new(NullClock::new(1_000));
        let contracts = Contracts {
            token: account(0xbb),
            staking: account(0xcc),
        };
        let ledger = NullLedger::new(account(0xaa), contracts.clone(), Arc::clone(&clock));
        (clock, ledger, contracts)
    }

    #[tokio::test]
    async fn stake_needs_allowance() {
        let (_clock, ledger, contracts) = setup();
        let owner = ledger.owner().clone();
        ledger.set_balance(&owner, TokenAmount::from_whole(100));

        let tx = ledger.stake(TokenAmount::from_whole(40)).await.unwrap();
        let receipt = ledger.wait_for_receipt(&tx).await.unwrap();
        assert_eq!(receipt.status, TxStatus::Failed);

        let tx = ledger
            .approve(&contracts.staking, TokenAmount::from_whole(40))
            .await
            .unwrap();
        assert_eq!(ledger.wait_for_receipt(&tx).await.unwrap().status, TxStatus::Confirmed);

        let tx = ledger.stake(TokenAmount::from_whole(40)).await.unwrap();
        let receipt = ledger.wait_for_receipt(&tx).await.unwrap();
        assert_eq!(receipt.status, TxStatus::Confirmed);
        assert_eq!(receipt.block_timestamp, Timestamp::new(1_000));
        assert_eq!(ledger.balance_of(&owner), TokenAmount::from_whole(60));
        assert_eq!(ledger.stake_of(&owner).amount, TokenAmount::from_whole(40));
        assert_eq!(ledger.allowance_of(&owner, &contracts.staking), TokenAmount::ZERO);
    }

    #[tokio::test]
    async fn receipts_are_stable() {
        let (_clock, ledger, _) = setup();
        let tx = ledger.claim_reward().await.unwrap();
        let first = ledger.wait_for_receipt(&tx).await.unwrap();
        let second = ledger.wait_for_receipt(&tx).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger.events().len(), 2);
    }

    #[tokio::test]
    async fn faucet_respects_cooldown() {
        let (clock, ledger, _) = setup();
        let owner = ledger.owner().clone();
        ledger.set_faucet(
            &owner,
            FaucetState {
                last_claimed_at: Timestamp::new(1_000),
                cooldown_secs: 60,
                claim_amount: TokenAmount::from_whole(5),
            },
        );

        let tx = ledger.claim_faucet().await.unwrap();
        assert_eq!(ledger.wait_for_receipt(&tx).await.unwrap().status, TxStatus::Failed);

        clock.advance(60);
        let tx = ledger.claim_faucet().await.unwrap();
        assert_eq!(ledger.wait_for_receipt(&tx).await.unwrap().status, TxStatus::Confirmed);
        assert_eq!(ledger.balance_of(&owner), TokenAmount::from_whole(5));
    }

    #[tokio::test]
    async fn scripted_failures_fire_once() {
        let (_clock, ledger, _) = setup();
        ledger.reject_next(TxKind::Claim);
        assert!(matches!(ledger.claim_reward().await, Err(LedgerError::Rejected(_))));
        assert!(ledger.claim_reward().await.is_ok());

        ledger.time_out_next(TxKind::Unstake);
        let tx = ledger.unstake(TokenAmount::ZERO).await.unwrap();
        assert!(matches!(
            ledger.wait_for_receipt(&tx).await,
            Err(LedgerError::Timeout { .. })
        ));
        assert!(ledger.wait_for_receipt(&tx).await.is_ok());
    }

    #[tokio::test]
    async fn failing_reads_are_counted() {
        let (_clock, ledger, contracts) = setup();
        let owner = ledger.owner().clone();
        ledger.fail_reads(Field::WalletBalance);
        assert!(ledger.balance(&owner, &contracts.token).await.is_err());
        ledger.restore_reads(Field::WalletBalance);
        assert!(ledger.balance(&owner, &contracts.token).await.is_ok());
        assert_eq!(ledger.reads(Field::WalletBalance), 2);
        assert_eq!(ledger.total_reads(), 2);
    }

    #[tokio::test]
    async fn unstaking_more_than_staked_fails_without_moving_funds() {
        let (_clock, ledger, _) = setup();
        let owner = ledger.owner().clone();
        ledger.set_balance(&owner, TokenAmount::from_whole(10));
        ledger.set_stake(
            &owner,
            StakePosition {
                amount: TokenAmount::from_whole(5),
                start_time: Timestamp::new(500),
            },
        );

        let tx = ledger.unstake(TokenAmount::from_whole(6)).await.unwrap();
        let receipt = ledger.wait_for_receipt(&tx).await.unwrap();
        assert_eq!(receipt.status, TxStatus::Failed);
        assert_eq!(receipt.detail.as_deref(), Some("unstake amount exceeds stake"));
        assert_eq!(ledger.balance_of(&owner), TokenAmount::from_whole(10));
        assert_eq!(ledger.stake_of(&owner).amount, TokenAmount::from_whole(5));
    }

    #[tokio::test]
    async fn held_read_returns_the_value_from_when_it_was_issued() {
        let (_clock, ledger, contracts) = setup();
        let ledger = Arc::new(ledger);
        let owner = ledger.owner().clone();
        ledger.set_balance(&owner, TokenAmount::from_whole(100));
        ledger.hold_next_read(Field::WalletBalance);

        let held = {
            let ledger = Arc::clone(&ledger);
            let owner = owner.clone();
            let token = contracts.token.clone();
            tokio::spawn(async move { ledger.balance(&owner, &token).await })
        };
        while ledger.reads(Field::WalletBalance) == 0 {
            tokio::task::yield_now().await;
        }
        ledger.set_balance(&owner, TokenAmount::from_whole(60));

        // Only the first read is held.
        let fresh = ledger.balance(&owner, &contracts.token).await.unwrap();
        assert_eq!(fresh, TokenAmount::from_whole(60));
        assert!(!held.is_finished());

        ledger.release_reads();
        assert_eq!(held.await.unwrap().unwrap(), TokenAmount::from_whole(100));
    }

    #[tokio::test]
    async fn paused_confirmations_wait_for_resume() {
        let (_clock, ledger, _) = setup();
        let ledger = Arc::new(ledger);
        ledger.pause_confirmations();
        let tx = ledger.claim_reward().await.unwrap();

        let waiter = {
            let ledger = Arc::clone(&ledger);
            let tx = tx.clone();
            tokio::spawn(async move { ledger.wait_for_receipt(&tx).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        ledger.resume_confirmations();
        let receipt = waiter.await.unwrap().unwrap();
        assert_eq!(receipt.status, TxStatus::Confirmed);
    }
}
