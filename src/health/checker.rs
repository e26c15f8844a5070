//! # 健康探针实现

use std::time::{Duration, Instant};

use reqwest::Client;
use tokio::time::timeout;

use super::types::CheckOutcome;

/// HTTP健康探针
///
/// 每次探测有独立超时，超时按失败记录，绝不无限挂起。
pub struct ProbeClient {
    client: Client,
    timeout: Duration,
}

impl ProbeClient {
    /// 创建探针客户端
    pub fn new(probe_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(probe_timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            timeout: probe_timeout,
        }
    }

    /// 对探针地址执行一次轻量 GET 检查
    pub async fn probe(&self, url: &str) -> CheckOutcome {
        let start_time = Instant::now();

        let result = timeout(self.timeout, self.client.get(url).send()).await;
        let elapsed_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(Ok(response)) => {
                let status = response.status();
                if status.is_success() {
                    CheckOutcome::success(elapsed_ms)
                } else {
                    CheckOutcome::failure(
                        elapsed_ms,
                        format!("unexpected status code: {status}"),
                    )
                }
            }
            Ok(Err(e)) => CheckOutcome::failure(elapsed_ms, format!("probe request failed: {e}")),
            Err(_) => CheckOutcome::failure(
                u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX),
                "probe request timeout",
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_probe_healthy_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let probe = ProbeClient::new(Duration::from_secs(2));
        let outcome = probe.probe(&format!("{}/health", server.uri())).await;
        assert!(outcome.is_healthy);
        assert!(outcome.error_message.is_none());
    }

    #[tokio::test]
    async fn test_probe_unexpected_status_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let probe = ProbeClient::new(Duration::from_secs(2));
        let outcome = probe.probe(&format!("{}/health", server.uri())).await;
        assert!(!outcome.is_healthy);
        assert!(
            outcome
                .error_message
                .as_deref()
                .unwrap()
                .contains("unexpected status")
        );
    }

    #[tokio::test]
    async fn test_probe_timeout_is_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let probe = ProbeClient::new(Duration::from_millis(200));
        let outcome = probe.probe(&format!("{}/health", server.uri())).await;
        assert!(!outcome.is_healthy);
        assert!(
            outcome
                .error_message
                .as_deref()
                .unwrap()
                .contains("timeout")
        );
    }

    #[tokio::test]
    async fn test_probe_connection_refused_is_failure() {
        let probe = ProbeClient::new(Duration::from_millis(500));
        let outcome = probe.probe("http://127.0.0.1:1/health").await;
        assert!(!outcome.is_healthy);
    }
}
