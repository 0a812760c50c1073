//! The trait every ledger backend implements.

use async_trait::async_trait;

use stakeflow_types::{Account, FaucetState, StakePosition, TokenAmount, TxHandle, TxReceipt};

use crate::LedgerError;

/// Read/write access to the token + staking ledger.
///
/// Writes are signed by the backend's own account (wallet session management
/// lives outside this workspace). A write returns as soon as the transaction
/// is accepted for inclusion; [`LedgerClient::wait_for_receipt`] resolves it.
/// Implementations bound that wait with their own timeout and report
/// [`LedgerError::Timeout`] when it elapses.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Token balance of `account`.
    async fn balance(&self, account: &Account, token: &Account) -> Result<TokenAmount, LedgerError>;

    /// Amount `owner` currently lets `spender` move.
    async fn allowance(
        &self,
        owner: &Account,
        spender: &Account,
        token: &Account,
    ) -> Result<TokenAmount, LedgerError>;

    async fn stake_position(&self, account: &Account) -> Result<StakePosition, LedgerError>;

    /// Accrued, unclaimed rewards. Authoritative; never computed client-side.
    async fn pending_rewards(&self, account: &Account) -> Result<TokenAmount, LedgerError>;

    async fn faucet_state(&self, account: &Account) -> Result<FaucetState, LedgerError>;

    async fn approve(&self, spender: &Account, amount: TokenAmount) -> Result<TxHandle, LedgerError>;

    async fn stake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError>;

    async fn unstake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError>;

    async fn claim_reward(&self) -> Result<TxHandle, LedgerError>;

    async fn claim_faucet(&self) -> Result<TxHandle, LedgerError>;

    /// Wait until the transaction is mined and return its receipt.
    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError>;
}
