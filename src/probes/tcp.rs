//! TCP reachability probe for bootstrap nodes.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use super::{multiaddr, CheckResult, Probe, RETRY_DELAY};

/// Probes a multiaddress by opening (and immediately closing) a TCP
/// connection to its host and port.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    timeout: Duration,
    max_retries: i64,
}

impl TcpProbe {
    /// Creates a probe with the given per-attempt timeout and retry bound.
    pub fn new(timeout: Duration, max_retries: i64) -> Self {
        Self { timeout, max_retries }
    }

    async fn attempt_connection(&self, host: &str, port: u16) -> Result<(), String> {
        match tokio::time::timeout(self.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                Ok(())
            }
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!("connect timed out after {:?}", self.timeout)),
        }
    }
}

#[async_trait]
impl Probe for TcpProbe {
    async fn check(&self, cancel: &CancellationToken, address: &str) -> CheckResult {
        let (host, port) = match multiaddr::parse_host_port(address) {
            Ok(parsed) => parsed,
            Err(e) => {
                return CheckResult::parse_failure(format!("failed to parse address: {e}"));
            }
        };

        let mut result = CheckResult::default();
        for attempt in 1..=self.max_retries {
            result.attempts = attempt;
            let started = Instant::now();
            match self.attempt_connection(&host, port).await {
                Ok(()) => {
                    result.success = true;
                    result.response_time_ms = Some(started.elapsed().as_millis() as i64);
                    result.error_msg = None;
                    tracing::info!(address, attempt, "node connection successful");
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
            "node connection failed",
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connects_to_listening_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = listener.accept().await;
        });

        let probe = TcpProbe::new(Duration::from_secs(1), 3);
        let address = format!("/ip4/127.0.0.1/tcp/{port}/p2p/QmTest");
        let result = probe.check(&CancellationToken::new(), &address).await;

        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert!(result.response_time_ms.is_some());
        assert!(result.error_msg.is_none());
    }

    #[tokio::test]
    async fn unparseable_address_records_zero_attempts() {
        let probe = TcpProbe::new(Duration::from_secs(1), 3);
        let result = probe.check(&CancellationToken::new(), "invalid").await;

        assert!(!result.success);
        assert_eq!(result.attempts, 0);
        assert!(result.error_msg.unwrap().contains("failed to parse address"));
    }

    #[tokio::test]
    async fn refused_connection_exhausts_retries() {
        // Bind then drop to get a port nothing listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let probe = TcpProbe::new(Duration::from_millis(200), 2);
        let address = format!("/ip4/127.0.0.1/tcp/{port}/p2p/QmTest");
        let result = probe.check(&CancellationToken::new(), &address).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        assert!(result.error_msg.is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_retry_loop() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let probe = TcpProbe::new(Duration::from_millis(200), 5);
        let address = format!("/ip4/127.0.0.1/tcp/{port}/p2p/QmTest");
        let result = probe.check(&cancel, &address).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 1);
    }
}
