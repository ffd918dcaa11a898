//! Protocol-specific reachability probes.
//!
//! A probe performs a single-shot check of one endpoint: up to `max_retries`
//! attempts with a fixed one-second pause in between, each attempt bounded by
//! a per-attempt timeout, stopping on the first success. Probes never fail
//! the batch they run in; every outcome, including timeouts and network
//! errors, is returned as a [`CheckResult`].

pub mod grpc;
pub mod jsonrpc;
pub mod multiaddr;
pub mod proto;
pub mod tcp;

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tokio_util::sync::CancellationToken;

pub use grpc::GrpcProbe;
pub use jsonrpc::JsonRpcProbe;
pub use tcp::TcpProbe;

/// Pause between attempts of the same probe.
pub const RETRY_DELAY: Duration = Duration::from_secs(1);

/// The outcome of probing one endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckResult {
    /// Whether any attempt succeeded.
    pub success: bool,
    /// Attempts executed; 0 when the address could not be parsed.
    pub attempts: i64,
    /// Round-trip time of the successful attempt.
    pub response_time_ms: Option<i64>,
    /// Error from the last failing attempt.
    pub error_msg: Option<String>,
    /// Chain height reported by the endpoint, JSON-RPC probes only.
    pub block_height: Option<i64>,
}

impl CheckResult {
    /// A failure before any attempt ran (unparseable address).
    pub fn parse_failure(message: impl Into<String>) -> Self {
        Self { error_msg: Some(message.into()), ..Self::default() }
    }

    /// A failure recorded when cancellation interrupted the retry loop.
    pub fn cancelled(attempts: i64) -> Self {
        Self { attempts, error_msg: Some("probe cancelled".into()), ..Self::default() }
    }
}

/// A single-shot reachability check of one endpoint.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Probe: Send + Sync {
    /// Checks `address`, returning as soon as an attempt succeeds, every
    /// attempt has failed, or `cancel` fires between attempts.
    async fn check(&self, cancel: &CancellationToken, address: &str) -> CheckResult;
}
