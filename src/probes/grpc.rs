//! gRPC reachability probe for public gRPC servers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tonic::transport::Endpoint;

use super::{
    proto::pactus::{network_client::NetworkClient, GetNetworkInfoRequest},
    CheckResult, Probe, RETRY_DELAY,
};

/// Probes a `host:port` endpoint by dialing an insecure channel and issuing
/// one `GetNetworkInfo` call. A reply without an error status is success.
#[derive(Debug, Clone)]
pub struct GrpcProbe {
    timeout: Duration,
    max_retries: i64,
}

impl GrpcProbe {
    /// Creates a probe with the given per-attempt timeout and retry bound.
    pub fn new(timeout: Duration, max_retries: i64) -> Self {
        Self { timeout, max_retries }
    }

    async fn attempt_ping(&self, address: &str) -> Result<(), String> {
        let endpoint = Endpoint::from_shared(format!("http://{address}"))
            .map_err(|e| format!("invalid endpoint: {e}"))?
            .connect_timeout(self.timeout)
            .timeout(self.timeout);
        let channel =
            endpoint.connect().await.map_err(|e| format!("failed to connect: {e}"))?;

        let mut client = NetworkClient::new(channel);
        client
            .get_network_info(GetNetworkInfoRequest::default())
            .await
            .map_err(|status| format!("ping failed: {status}"))?;
        Ok(())
    }
}

#[async_trait]
impl Probe for GrpcProbe {
    async fn check(&self, cancel: &CancellationToken, address: &str) -> CheckResult {
        let mut result = CheckResult::default();
        for attempt in 1..=self.max_retries {
            result.attempts = attempt;
            let started = Instant::now();
            match self.attempt_ping(address).await {
                Ok(()) => {
                    result.success = true;
                    result.response_time_ms = Some(started.elapsed().as_millis() as i64);
                    result.error_msg = None;
                    tracing::info!(address, attempt, "grpc server ping successful");
                    return result;
                }
                Err(e) => result.error_msg = Some(e),
            }

            if attempt < self.max_retries {
                tokio::select! {
                    _ = cancel.cancelled() => return CheckResult::cancelled(attempt),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }

        tracing::warn!(
            address,
            attempts = result.attempts,
            error = result.error_msg.as_deref().unwrap_or(""),
            "grpc server ping failed",
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn refused_connection_exhausts_retries() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = GrpcProbe::new(Duration::from_millis(200), 2);
        let result =
            probe.check(&CancellationToken::new(), &format!("127.0.0.1:{port}")).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert!(result.error_msg.is_some());
    }

    #[tokio::test]
    async fn malformed_endpoint_fails_without_connecting() {
        let probe = GrpcProbe::new(Duration::from_millis(200), 1);
        let result = probe.check(&CancellationToken::new(), "not a host").await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.error_msg.unwrap().contains("invalid endpoint"));
    }
}
