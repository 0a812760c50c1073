//! Deterministic stand-ins for the orchestration core's outside world.
//!
//! The core reaches the wall clock and the ledger only through traits.
//! [`NullClock`] is a clock tests move by hand; [`NullLedger`] is a scripted
//! in-memory token and staking ledger that records every submission and can
//! be told to fail reads, reject, revert, time out, or hold confirmations.

pub mod clock;
pub mod ledger;

pub use clock::NullClock;
pub use ledger::{LedgerEvent, NullLedger};
