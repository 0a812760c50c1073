//! Ledger collaborator boundary.
//!
//! The orchestration core never talks to a chain directly. Everything it
//! reads or writes goes through [`LedgerClient`]; this crate defines that
//! trait and ships [`RpcLedgerClient`], an adapter for a JSON-RPC gateway
//! that signs and relays on behalf of a configured account.

pub mod client;
pub mod error;
pub mod rpc;

pub use client::LedgerClient;
pub use error::LedgerError;
pub use rpc::{RpcConfig, RpcLedgerClient};
