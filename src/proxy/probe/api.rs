//! Probe that delegates the check to a remote checking service

use super::Probe;
use crate::proxy::models::{ProbeResult, ProxyCandidate};
use crate::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// Default checking service endpoint
pub const DEFAULT_API_URL: &str = "https://check.mazlana.biz.id/api/v1";

/// Default timeout for a checking service request in seconds
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Asks the checking service to test `ip:port` and reports what it returns
pub struct ApiProbe {
    client: Client,
    api_url: String,
}

impl ApiProbe {
    pub fn new(api_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, api_url })
    }
}

#[async_trait]
impl Probe for ApiProbe {
    async fn probe(&self, candidate: &ProxyCandidate) -> ProbeResult {
        let port = candidate.port.to_string();
        let request = self
            .client
            .get(&self.api_url)
            .query(&[("ip", candidate.host.as_str()), ("port", port.as_str())]);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => return ProbeResult::failed(e.to_string()),
        };

        if response.status() != StatusCode::OK {
            return ProbeResult::failed(format!("HTTP {}", response.status().as_u16()));
        }

        let text = match response.text().await {
            Ok(text) => text,
            Err(e) => return ProbeResult::failed(e.to_string()),
        };

        match serde_json::from_str::<Value>(&text) {
            Ok(body) => ProbeResult::from_body(&body, None),
            Err(e) => {
                debug!(proxy = %candidate, body = %text, "checking service sent invalid JSON");
                ProbeResult::failed(format!("invalid JSON: {}", e))
            }
        }
    }

    fn name(&self) -> &'static str {
        "api"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned HTTP response and hand back the request line
    async fn serve_once(status: &str, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/v1", listener.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        );

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            let request = String::from_utf8_lossy(&request).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });

        (url, handle)
    }

    fn candidate() -> ProxyCandidate {
        ProxyCandidate::new("1.1.1.1".to_string(), 443, Some("US"), Some("Cloudflare"))
    }

    #[tokio::test]
    async fn test_api_probe_success() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"delay":120,"asn":"AS123","asOrganization":"Example","colo":"SIN","latitude":"1.3","longitude":"103.8"}"#,
        )
        .await;
        let probe = ApiProbe::new(url, Duration::from_secs(5)).unwrap();

        let result = probe.probe(&candidate()).await;
        assert!(result.success);
        assert_eq!(result.delay_ms, 120);
        assert_eq!(result.asn, "AS123");
        assert_eq!(result.as_organization, "Example");

        let request_line = server.await.unwrap();
        assert!(request_line.starts_with("GET /api/v1?ip=1.1.1.1&port=443 "));
    }

    #[tokio::test]
    async fn test_api_probe_reports_error_field() {
        let (url, _server) = serve_once("200 OK", r#"{"error":"timeout"}"#).await;
        let probe = ApiProbe::new(url, Duration::from_secs(5)).unwrap();

        let result = probe.probe(&candidate()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("timeout"));
    }

    #[tokio::test]
    async fn test_api_probe_non_200() {
        let (url, _server) = serve_once("503 Service Unavailable", "{}").await;
        let probe = ApiProbe::new(url, Duration::from_secs(5)).unwrap();

        let result = probe.probe(&candidate()).await;
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("HTTP 503"));
        assert_eq!(result.delay_ms, 0);
    }

    #[tokio::test]
    async fn test_api_probe_invalid_json() {
        let (url, _server) = serve_once("200 OK", "<html>oops</html>").await;
        let probe = ApiProbe::new(url, Duration::from_secs(5)).unwrap();

        let result = probe.probe(&candidate()).await;
        assert!(!result.success);
        assert!(result.error.unwrap().starts_with("invalid JSON"));
    }

    #[tokio::test]
    async fn test_api_probe_unreachable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/api/v1", listener.local_addr().unwrap());
        drop(listener);

        let probe = ApiProbe::new(url, Duration::from_secs(2)).unwrap();
        let result = probe.probe(&candidate()).await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}
