//! JSON-RPC reachability probe for public JSON-RPC servers.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use super::{CheckResult, Probe, RETRY_DELAY};

/// Probes an HTTP(S) endpoint by POSTing a JSON-RPC 2.0 envelope for the
/// chain-info method. An HTTP 200 is success; on success the reported block
/// height is extracted when the body parses.
pub struct JsonRpcProbe {
    client: reqwest::Client,
    max_retries: i64,
}

impl JsonRpcProbe {
    /// Creates a probe with the given per-attempt timeout and retry bound.
    pub fn new(timeout: Duration, max_retries: i64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, max_retries })
    }

    async fn attempt_call(&self, address: &str) -> Result<Option<i64>, String> {
        let envelope = json!({
            "jsonrpc": "2.0",
            "method": "pactus.blockchain.get_blockchain_info",
            "params": {},
            "id": 1,
        });

        let response = self
            .client
            .post(address)
            .json(&envelope)
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(format!("HTTP {}: {}", status.as_u16(), body));
        }

        let height = serde_json::from_str::<serde_json::Value>(&body)
            .ok()
            .and_then(|v| v["result"]["last_block_height"].as_i64());
        Ok(height)
    }
}

#[async_trait]
impl Probe for JsonRpcProbe {
    async fn check(&self, cancel: &CancellationToken, address: &str) -> CheckResult {
        let mut result = CheckResult::default();
        for attempt in 1..=self.max_retries {
            result.attempts = attempt;
            let started = Instant::now();
            match self.attempt_call(address).await {
                Ok(height) => {
                    result.success = true;
                    result.response_time_ms = Some(started.elapsed().as_millis() as i64);
                    result.block_height = height;
                    result.error_msg = None;
                    tracing::info!(address, attempt, "jsonrpc endpoint responded");
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
            "jsonrpc endpoint check failed",
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn successful_call_extracts_block_height() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_header("content-type", "application/json")
            .with_status(200)
            .with_body(r#"{"jsonrpc":"2.0","result":{"last_block_height":123456},"id":1}"#)
            .create_async()
            .await;

        let probe = JsonRpcProbe::new(Duration::from_secs(1), 3).unwrap();
        let result = probe.check(&CancellationToken::new(), &server.url()).await;

        mock.assert_async().await;
        assert!(result.success);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.block_height, Some(123456));
    }

    #[tokio::test]
    async fn success_without_parseable_height_is_still_success() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let probe = JsonRpcProbe::new(Duration::from_secs(1), 3).unwrap();
        let result = probe.check(&CancellationToken::new(), &server.url()).await;

        assert!(result.success);
        assert_eq!(result.block_height, None);
    }

    #[tokio::test]
    async fn http_error_records_status_and_body() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(503)
            .with_body("maintenance")
            .expect(2)
            .create_async()
            .await;

        let probe = JsonRpcProbe::new(Duration::from_secs(1), 2).unwrap();
        let result = probe.check(&CancellationToken::new(), &server.url()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 2);
        let msg = result.error_msg.unwrap();
        assert!(msg.contains("HTTP 503"));
        assert!(msg.contains("maintenance"));
    }
}
