//! JSON-RPC ledger adapter.
//!
//! Talks to a gateway that holds the signer's session and relays calls to the
//! token and staking contracts. Every request is a JSON object carrying an
//! `action` field; replies carry either `result` or `error`. Raw amounts
//! travel as decimal strings so no precision is lost on the way.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use stakeflow_types::{
    Account, Contracts, FaucetState, StakePosition, Timestamp, TokenAmount, TxHandle, TxReceipt,
    TxStatus,
};

use crate::{LedgerClient, LedgerError};

// ── RpcConfig ───────────────────────────────────────────────────────────

/// Connection settings for [`RpcLedgerClient`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RpcConfig {
    /// Gateway endpoint, e.g. `http://127.0.0.1:8545`.
    pub url: String,

    /// Account the gateway signs for.
    pub signer: Account,

    /// Per-request timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// TCP connect timeout.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    /// How often a pending receipt is polled.
    #[serde(default = "default_receipt_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,

    /// Upper bound on a confirmation wait.
    #[serde(default = "default_receipt_timeout_secs")]
    pub receipt_timeout_secs: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_receipt_poll_interval_ms() -> u64 {
    2_000
}

fn default_receipt_timeout_secs() -> u64 {
    120
}

impl RpcConfig {
    pub fn new(url: impl Into<String>, signer: Account) -> Self {
        Self {
            url: url.into(),
            signer,
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            receipt_poll_interval_ms: default_receipt_poll_interval_ms(),
            receipt_timeout_secs: default_receipt_timeout_secs(),
        }
    }
}

// ── RpcLedgerClient ─────────────────────────────────────────────────────

/// HTTP client for a ledger JSON-RPC gateway.
///
/// Wraps `reqwest::Client` with the gateway URL, the signer account and the
/// contract addresses, and maps each [`LedgerClient`] call onto one action.
#[derive(Clone)]
pub struct RpcLedgerClient {
    http: reqwest::Client,
    config: RpcConfig,
    contracts: Contracts,
}

impl RpcLedgerClient {
    pub fn new(config: RpcConfig, contracts: Contracts) -> Result<Self, LedgerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| LedgerError::Network(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            http,
            config,
            contracts,
        })
    }

    /// The configured gateway URL.
    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn signer(&self) -> &Account {
        &self.config.signer
    }

    /// Send a JSON-RPC request and return the `result` field.
    async fn rpc_call(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, LedgerError> {
        let mut body = params;
        body.as_object_mut()
            .ok_or_else(|| LedgerError::InvalidResponse("params must be a JSON object".into()))?
            .insert("action".to_string(), serde_json::json!(action));

        let response = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LedgerError::Network(format!("{action}: request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(LedgerError::Network(format!(
                "{action}: gateway returned HTTP {}",
                response.status()
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| LedgerError::InvalidResponse(format!("{action}: {e}")))?;

        if let Some(err) = json.get("error") {
            return Err(classify_error(err));
        }

        Ok(json.get("result").cloned().unwrap_or(json))
    }

    async fn read_amount(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<TokenAmount, LedgerError> {
        let result = self.rpc_call(action, params).await?;
        let resp: AmountResult = decode(action, result)?;
        parse_raw(&resp.amount)
    }

    async fn submit(
        &self,
        action: &str,
        params: serde_json::Value,
    ) -> Result<TxHandle, LedgerError> {
        let result = self.rpc_call(action, params).await?;
        let resp: SubmitResult = decode(action, result)?;
        tracing::debug!(action, tx = %resp.tx_hash, "transaction submitted");
        Ok(TxHandle::new(resp.tx_hash))
    }

    /// One receipt lookup; `None` while the transaction is still pending.
    async fn receipt(&self, tx: &TxHandle) -> Result<Option<TxReceipt>, LedgerError> {
        let result = self
            .rpc_call(
                "transaction_receipt",
                serde_json::json!({ "tx_hash": tx.as_str() }),
            )
            .await?;
        receipt_from_value(result)
    }
}

#[async_trait]
impl LedgerClient for RpcLedgerClient {
    async fn balance(&self, account: &Account, token: &Account) -> Result<TokenAmount, LedgerError> {
        self.read_amount(
            "token_balance",
            serde_json::json!({ "account": account.as_str(), "token": token.as_str() }),
        )
        .await
    }

    async fn allowance(
        &self,
        owner: &Account,
        spender: &Account,
        token: &Account,
    ) -> Result<TokenAmount, LedgerError> {
        self.read_amount(
            "token_allowance",
            serde_json::json!({
                "owner": owner.as_str(),
                "spender": spender.as_str(),
                "token": token.as_str(),
            }),
        )
        .await
    }

    async fn stake_position(&self, account: &Account) -> Result<StakePosition, LedgerError> {
        let result = self
            .rpc_call(
                "stake_position",
                serde_json::json!({
                    "account": account.as_str(),
                    "staking": self.contracts.staking.as_str(),
                }),
            )
            .await?;
        let resp: StakePositionResult = decode("stake_position", result)?;
        Ok(StakePosition {
            amount: parse_raw(&resp.amount)?,
            start_time: Timestamp::new(resp.start_time),
        })
    }

    async fn pending_rewards(&self, account: &Account) -> Result<TokenAmount, LedgerError> {
        self.read_amount(
            "pending_rewards",
            serde_json::json!({
                "account": account.as_str(),
                "staking": self.contracts.staking.as_str(),
            }),
        )
        .await
    }

    async fn faucet_state(&self, account: &Account) -> Result<FaucetState, LedgerError> {
        let result = self
            .rpc_call(
                "faucet_state",
                serde_json::json!({
                    "account": account.as_str(),
                    "token": self.contracts.token.as_str(),
                }),
            )
            .await?;
        let resp: FaucetStateResult = decode("faucet_state", result)?;
        Ok(FaucetState {
            last_claimed_at: Timestamp::new(resp.last_claimed_at),
            cooldown_secs: resp.cooldown_secs,
            claim_amount: parse_raw(&resp.claim_amount)?,
        })
    }

    async fn approve(&self, spender: &Account, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(
            "approve",
            serde_json::json!({
                "from": self.config.signer.as_str(),
                "token": self.contracts.token.as_str(),
                "spender": spender.as_str(),
                "amount": amount.raw().to_string(),
            }),
        )
        .await
    }

    async fn stake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(
            "stake",
            serde_json::json!({
                "from": self.config.signer.as_str(),
                "staking": self.contracts.staking.as_str(),
                "amount": amount.raw().to_string(),
            }),
        )
        .await
    }

    async fn unstake(&self, amount: TokenAmount) -> Result<TxHandle, LedgerError> {
        self.submit(
            "unstake",
            serde_json::json!({
                "from": self.config.signer.as_str(),
                "staking": self.contracts.staking.as_str(),
                "amount": amount.raw().to_string(),
            }),
        )
        .await
    }

    async fn claim_reward(&self) -> Result<TxHandle, LedgerError> {
        self.submit(
            "claim_reward",
            serde_json::json!({
                "from": self.config.signer.as_str(),
                "staking": self.contracts.staking.as_str(),
            }),
        )
        .await
    }

    async fn claim_faucet(&self) -> Result<TxHandle, LedgerError> {
        self.submit(
            "claim_faucet",
            serde_json::json!({
                "from": self.config.signer.as_str(),
                "token": self.contracts.token.as_str(),
            }),
        )
        .await
    }

    async fn wait_for_receipt(&self, tx: &TxHandle) -> Result<TxReceipt, LedgerError> {
        let period = Duration::from_millis(self.config.receipt_poll_interval_ms.max(1));
        let poll = async {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                match self.receipt(tx).await {
                    Ok(Some(receipt)) => return Ok(receipt),
                    Ok(None) => {}
                    // Blips while polling are retried until the wait times out.
                    Err(e) if e.is_transient() => {
                        tracing::debug!(tx = %tx, error = %e, "receipt poll failed");
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let limit = self.config.receipt_timeout_secs;
        tokio::time::timeout(Duration::from_secs(limit), poll)
            .await
            .map_err(|_| LedgerError::Timeout {
                handle: tx.clone(),
                waited_secs: limit,
            })?
    }
}

// ── Wire shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct AmountResult {
    amount: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StakePositionResult {
    amount: String,
    #[serde(default)]
    start_time: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct FaucetStateResult {
    #[serde(default)]
    last_claimed_at: u64,
    cooldown_secs: u64,
    claim_amount: String,
}

#[derive(Debug, Clone, Deserialize)]
struct SubmitResult {
    tx_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ReceiptResult {
    status: String,
    #[serde(default)]
    block_timestamp: u64,
    #[serde(default)]
    detail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ErrorObject {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

fn decode<T: serde::de::DeserializeOwned>(
    action: &str,
    value: serde_json::Value,
) -> Result<T, LedgerError> {
    serde_json::from_value(value)
        .map_err(|e| LedgerError::InvalidResponse(format!("{action}: {e}")))
}

fn parse_raw(raw: &str) -> Result<TokenAmount, LedgerError> {
    raw.trim()
        .parse::<u128>()
        .map(TokenAmount::new)
        .map_err(|e| LedgerError::InvalidResponse(format!("bad raw amount {raw:?}: {e}")))
}

/// Map a gateway `error` member onto the ledger error taxonomy.
fn classify_error(err: &serde_json::Value) -> LedgerError {
    if let Some(message) = err.as_str() {
        return LedgerError::Network(message.to_string());
    }
    match serde_json::from_value::<ErrorObject>(err.clone()) {
        Ok(obj) => match obj.code.as_str() {
            "rejected" | "user_rejected" => LedgerError::Rejected(obj.message),
            "reverted" => LedgerError::Reverted(obj.message),
            _ => LedgerError::Network(format!("{}: {}", obj.code, obj.message)),
        },
        Err(_) => LedgerError::InvalidResponse(format!("unrecognised error member: {err}")),
    }
}

fn receipt_from_value(value: serde_json::Value) -> Result<Option<TxReceipt>, LedgerError> {
    if value.is_null() {
        return Ok(None);
    }
    let resp: ReceiptResult = decode("transaction_receipt", value)?;
    let status = match resp.status.as_str() {
        "pending" => return Ok(None),
        "confirmed" | "success" => TxStatus::Confirmed,
        "failed" | "reverted" => TxStatus::Failed,
        other => {
            return Err(LedgerError::InvalidResponse(format!(
                "unknown receipt status {other:?}"
            )))
        }
    };
    Ok(Some(TxReceipt {
        status,
        block_timestamp: Timestamp::new(resp.block_timestamp),
        detail: resp.detail,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn config_defaults_fill_missing_keys() {
        let cfg: RpcConfig = serde_json::from_value(json!({
            "url": "http://127.0.0.1:8545",
            "signer": "0x00000000000000000000000000000000000000aa",
        }))
        .unwrap();
        assert_eq!(cfg.request_timeout_secs, 30);
        assert_eq!(cfg.connect_timeout_secs, 10);
        assert_eq!(cfg.receipt_poll_interval_ms, 2_000);
        assert_eq!(cfg.receipt_timeout_secs, 120);
    }

    #[test]
    fn config_rejects_malformed_signer() {
        let parsed: Result<RpcConfig, _> = serde_json::from_value(json!({
            "url": "http://127.0.0.1:8545",
            "signer": "not-an-address",
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn raw_amounts_parse_exactly() {
        assert_eq!(
            parse_raw("40000000000000000000").unwrap(),
            TokenAmount::from_whole(40)
        );
        assert!(matches!(parse_raw("1.5"), Err(LedgerError::InvalidResponse(_))));
        assert!(matches!(parse_raw("-1"), Err(LedgerError::InvalidResponse(_))));
    }

    #[test]
    fn error_codes_map_to_taxonomy() {
        assert_eq!(
            classify_error(&json!({ "code": "user_rejected", "message": "denied" })),
            LedgerError::Rejected("denied".into())
        );
        assert_eq!(
            classify_error(&json!({ "code": "reverted", "message": "insufficient balance" })),
            LedgerError::Reverted("insufficient balance".into())
        );
        assert!(matches!(
            classify_error(&json!("upstream down")),
            LedgerError::Network(_)
        ));
        assert!(matches!(classify_error(&json!(42)), LedgerError::InvalidResponse(_)));
    }

    #[test]
    fn null_or_pending_receipt_is_not_terminal() {
        assert_eq!(receipt_from_value(serde_json::Value::Null).unwrap(), None);
        assert_eq!(
            receipt_from_value(json!({ "status": "pending" })).unwrap(),
            None
        );
    }

    #[test]
    fn mined_receipts_carry_status_and_time() {
        let ok = receipt_from_value(json!({ "status": "confirmed", "block_timestamp": 1_700 }))
            .unwrap()
            .unwrap();
        assert_eq!(ok.status, TxStatus::Confirmed);
        assert_eq!(ok.block_timestamp, Timestamp::new(1_700));

        let failed = receipt_from_value(json!({
            "status": "reverted",
            "block_timestamp": 1_701,
            "detail": "allowance too low",
        }))
        .unwrap()
        .unwrap();
        assert_eq!(failed.status, TxStatus::Failed);
        assert_eq!(failed.detail.as_deref(), Some("allowance too low"));
    }

    #[test]
    fn unknown_receipt_status_is_invalid() {
        assert!(matches!(
            receipt_from_value(json!({ "status": "mystery" })),
            Err(LedgerError::InvalidResponse(_))
        ));
    }

    #[test]
    fn client_builds_from_config() {
        let signer = Account::parse("0x00000000000000000000000000000000000000aa").unwrap();
        let contracts = Contracts {
            token: Account::parse("0x00000000000000000000000000000000000000bb").unwrap(),
            staking: Account::parse("0x00000000000000000000000000000000000000cc").unwrap(),
        };
        let client =
            RpcLedgerClient::new(RpcConfig::new("http://127.0.0.1:8545", signer.clone()), contracts)
                .unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:8545");
        assert_eq!(client.signer(), &signer);
    }
}
