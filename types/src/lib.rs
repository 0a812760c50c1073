//! Fundamental types for stakeflow.
//!
//! This crate defines the types shared across every other crate in the workspace:
//! accounts, fixed-point token amounts, timestamps and clocks, transaction
//! bookkeeping, ledger positions, and the snapshot field vocabulary.

pub mod address;
pub mod amount;
pub mod error;
pub mod field;
pub mod position;
pub mod time;
pub mod tx;

pub use address::{Account, Contracts};
pub use amount::TokenAmount;
pub use error::{AmountError, TypesError};
pub use field::{Field, FieldSet};
pub use position::{FaucetState, StakePosition};
pub use time::{Clock, SystemClock, Timestamp};
pub use tx::{Transaction, TxHandle, TxKind, TxReceipt, TxStatus};
