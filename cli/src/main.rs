//! stakeflow: inspect a staking account and run flows against a ledger gateway.

mod amount;
mod config;
mod render;

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use stakeflow_ledger::RpcLedgerClient;
use stakeflow_types::{Account, Clock, SystemClock};
use stakeflow_utils::{init_logging, LogFormat};
use stakeflow_wallet_core::{FlowHandle, FlowKind, StakingSession};

use amount::AmountArg;
use config::{FileConfig, Overrides, Resolved};

#[derive(Parser)]
#[command(name = "stakeflow", about = "Staking account inspector and flow runner")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "STAKEFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Ledger gateway JSON-RPC endpoint.
    #[arg(long, env = "STAKEFLOW_RPC_URL")]
    rpc_url: Option<String>,

    /// Account to inspect and sign for.
    #[arg(long, env = "STAKEFLOW_ACCOUNT")]
    account: Option<Account>,

    /// Token contract address.
    #[arg(long, env = "STAKEFLOW_TOKEN")]
    token: Option<Account>,

    /// Staking contract address (the approved spender).
    #[arg(long, env = "STAKEFLOW_STAKING")]
    staking: Option<Account>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "STAKEFLOW_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format: "human" or "json".
    #[arg(long, env = "STAKEFLOW_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Show balances, stake, rewards and faucet eligibility.
    Status,
    /// Stake tokens, approving the staking contract first if needed.
    /// `max` stakes the whole wallet balance.
    Stake { amount: AmountArg },
    /// Unstake tokens and claim accrued rewards. `max` unstakes everything.
    Unstake { amount: AmountArg },
    /// Claim accrued rewards.
    Claim,
    /// Claim the faucet allotment if the cooldown has passed.
    Faucet,
    /// Print every snapshot update until interrupted.
    Watch {
        /// Stop after this many seconds.
        #[arg(long)]
        seconds: Option<u64>,
    },
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            rpc_url: self.rpc_url.clone(),
            account: self.account.clone(),
            token: self.token.clone(),
            staking: self.staking.clone(),
            log_level: self.log_level.clone(),
            log_format: self.log_format,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let file = cli.config.as_deref().map(FileConfig::load).transpose()?;
    let resolved = Resolved::merge(cli.overrides(), file)?;
    init_logging(resolved.log_format, &resolved.log_level);
    if let Some(path) = &cli.config {
        tracing::info!(path = %path.display(), "loaded config");
    }

    let account = resolved.rpc.signer.clone();
    tracing::info!(url = %resolved.rpc.url, account = %account, "connecting to ledger gateway");
    let ledger = RpcLedgerClient::new(resolved.rpc, resolved.session.contracts.clone())?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let session = StakingSession::new(Arc::new(ledger), Arc::clone(&clock), resolved.session)?;

    let snapshot = session
        .subscribe(account.clone())
        .await
        .context("reading account state")?;

    let result = match cli.command {
        Command::Status => {
            let eligibility = session.eligibility();
            println!(
                "{}",
                render::status(&snapshot, eligibility.as_ref(), clock.now())
            );
            Ok(())
        }
        Command::Stake { amount } => {
            let amount = amount.resolve(&session, FlowKind::Stake)?;
            run_flow(session.submit_stake(&amount).await?).await
        }
        Command::Unstake { amount } => {
            let amount = amount.resolve(&session, FlowKind::Unstake)?;
            run_flow(session.submit_unstake(&amount).await?).await
        }
        Command::Claim => run_flow(session.submit_claim().await?).await,
        Command::Faucet => run_flow(session.submit_faucet_claim().await?).await,
        Command::Watch { seconds } => watch(&session, seconds).await,
    };

    session.unsubscribe(&account).await;
    result
}

async fn run_flow(flow: FlowHandle) -> anyhow::Result<()> {
    let kind = flow.kind();
    let report = flow.wait().await?;
    for outcome in &report.outcomes {
        println!("{}", render::outcome(outcome));
    }
    report
        .result
        .with_context(|| format!("{kind} flow failed"))
}

async fn watch(session: &StakingSession, seconds: Option<u64>) -> anyhow::Result<()> {
    let mut snapshots = session.watch_snapshot();
    let deadline = seconds.map(|s| Instant::now() + Duration::from_secs(s));

    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
            _ = until(deadline) => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = snapshots.borrow_and_update().clone();
                match current {
                    Some(snapshot) => println!("{}", render::ticker(&snapshot)),
                    None => break,
                }
            }
        }
    }
    Ok(())
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
