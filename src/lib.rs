#![warn(missing_docs)]
//! Nodewatch tracks the health of a blockchain network's public endpoints:
//! bootstrap peers, gRPC servers, JSON-RPC servers, and crawler-discovered
//! reachable peers. It probes each roster daily, records per-day
//! reachability, computes rolling 30-day scores, and serves the aggregated
//! state over a JSON-RPC API.

pub mod cmd;
pub mod config;
pub mod context;
pub mod geo;
pub mod models;
pub mod monitor;
pub mod persistence;
pub mod probes;
pub mod registration;
pub mod rpc;
pub mod scheduler;
pub mod stats;
pub mod supervisor;
#[cfg(feature = "test-helpers")]
pub mod test_helpers;
