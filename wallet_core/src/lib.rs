//! Wallet-side staking orchestration.
//!
//! A [`StakingSession`] mirrors one account's ledger state into a
//! [`Snapshot`], runs stake / unstake / claim / faucet flows as explicit
//! state machines, and turns every settled transaction into exactly one
//! [`OperationOutcome`] plus a targeted refresh.
//!
//! Ledger access goes through [`stakeflow_ledger::LedgerClient`]; tests use
//! the in-memory ledger from `stakeflow-nullables`.

pub mod config;
pub mod eligibility;
pub mod error;
pub mod flow;
pub mod orchestrator;
pub mod periodic;
pub mod processed;
pub mod result_handler;
pub mod session;
pub mod snapshot;
pub mod synchronizer;

pub use config::SessionConfig;
pub use eligibility::{Eligibility, FaucetEligibility};
pub use error::CoreError;
pub use flow::{FlowHandle, FlowKind, FlowReport, FlowState, FlowTransition};
pub use orchestrator::TransactionOrchestrator;
pub use periodic::PeriodicTask;
pub use result_handler::{ChainedAction, OperationOutcome, OperationResultHandler, OutcomeKind};
pub use session::StakingSession;
pub use snapshot::{FieldValue, Snapshot};
pub use synchronizer::StateSynchronizer;
