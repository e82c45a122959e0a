//! Probe that tunnels a TLS request through the candidate itself
//!
//! The candidate is dialled as if it were the reference host. If it forwards
//! the connection, the reference host sees the candidate's address as the
//! client and reports it back in `clientIp`.

use super::Probe;
use crate::proxy::models::{ProbeResult, ProxyCandidate};
use crate::Result;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::Value;
use std::io::ErrorKind;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_native_tls::TlsConnector;
use tracing::debug;

/// Default reference host answering the metadata request
pub const DEFAULT_REFERENCE_HOST: &str = "speed.cloudflare.com";

/// Default metadata path on the reference host
pub const DEFAULT_REFERENCE_PATH: &str = "/meta";

/// Default timeout for each network step in seconds
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Error text for a response whose body is not JSON
pub const PARSE_FAILED: &str = "parse failed";

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

/// Port the reference host is measured on when computing our own identity
const REFERENCE_PORT: u16 = 443;

/// Dials candidates directly and asks the reference host who is calling
pub struct DirectProbe {
    connector: TlsConnector,
    reference_host: String,
    reference_path: String,
    reference_port: u16,
    timeout: Duration,
}

impl DirectProbe {
    pub fn new(reference_host: String, reference_path: String, timeout: Duration) -> Result<Self> {
        let connector = native_tls::TlsConnector::builder()
            .build()
            .context("Failed to build TLS connector")?;

        Ok(Self {
            connector: TlsConnector::from(connector),
            reference_host,
            reference_path,
            reference_port: REFERENCE_PORT,
            timeout,
        })
    }

    pub fn with_reference_port(mut self, port: u16) -> Self {
        self.reference_port = port;
        self
    }

    pub fn reference_host(&self) -> &str {
        &self.reference_host
    }

    /// Measure our own public address by asking the reference host directly.
    ///
    /// Without it no candidate can be judged, so a missing `clientIp` is an
    /// error.
    pub async fn reference_identity(&self) -> Result<String> {
        let reference = ProxyCandidate::new(
            self.reference_host.clone(),
            self.reference_port,
            None,
            None,
        );
        let result = self.probe(&reference).await;

        result.client_ip.ok_or_else(|| {
            anyhow!(
                "Reference probe of {} returned no clientIp ({})",
                reference,
                result.error.as_deref().unwrap_or("unknown")
            )
        })
    }

    fn request(&self) -> String {
        format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nUser-Agent: {}\r\nConnection: close\r\n\r\n",
            self.reference_path, self.reference_host, USER_AGENT
        )
    }

    /// Connect, handshake, send the request and read until the peer closes
    async fn exchange(&self, host: &str, port: u16) -> Result<Vec<u8>> {
        let tcp = timeout(self.timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| anyhow!("connect timed out"))?
            .context("connect failed")?;

        let mut stream = timeout(self.timeout, self.connector.connect(&self.reference_host, tcp))
            .await
            .map_err(|_| anyhow!("TLS handshake timed out"))?
            .context("TLS handshake failed")?;

        stream
            .write_all(self.request().as_bytes())
            .await
            .context("write failed")?;

        let mut response = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            match timeout(self.timeout, stream.read(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => response.extend_from_slice(&buf[..n]),
                // Peers that drop the socket without close_notify still sent a full response.
                Ok(Err(e)) if e.kind() == ErrorKind::UnexpectedEof => break,
                Ok(Err(e)) => return Err(anyhow!("read failed: {}", e)),
                Err(_) => return Err(anyhow!("read timed out")),
            }
        }

        Ok(response)
    }
}

#[async_trait]
impl Probe for DirectProbe {
    async fn probe(&self, candidate: &ProxyCandidate) -> ProbeResult {
        let start = Instant::now();

        let response = match self.exchange(&candidate.host, candidate.port).await {
            Ok(response) => response,
            Err(e) => return ProbeResult::failed(format!("{:#}", e)),
        };
        let elapsed = start.elapsed().as_millis() as u64;

        let result = result_from_response(&response, elapsed);
        if result.error.as_deref() == Some(PARSE_FAILED) {
            debug!(proxy = %candidate, elapsed_ms = elapsed, bytes = response.len(), "unparseable response");
        }
        result
    }

    fn name(&self) -> &'static str {
        "direct"
    }
}

/// Turn a completed exchange into a result.
///
/// `elapsed` becomes the delay only when the body parses; parse failures
/// report zero delay.
pub fn result_from_response(raw: &[u8], elapsed: u64) -> ProbeResult {
    match parse_response(raw) {
        Some(body) => ProbeResult::from_body(&body, Some(elapsed)),
        None => ProbeResult::failed(PARSE_FAILED),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Split a raw HTTP response at the first blank line and decode the body as JSON
pub fn parse_response(raw: &[u8]) -> Option<Value> {
    let split = find(raw, b"\r\n\r\n")?;
    let head = String::from_utf8_lossy(&raw[..split]).to_lowercase();
    let body = &raw[split + 4..];

    let chunked = head
        .lines()
        .any(|line| line.starts_with("transfer-encoding:") && line.contains("chunked"));

    if chunked {
        serde_json::from_slice(&dechunk(body)?).ok()
    } else {
        serde_json::from_slice(body).ok()
    }
}

/// Reassemble a `Transfer-Encoding: chunked` body
fn dechunk(mut body: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();
    loop {
        let line_end = find(body, b"\r\n")?;
        let size_line = std::str::from_utf8(&body[..line_end]).ok()?;
        let size = usize::from_str_radix(size_line.split(';').next()?.trim(), 16).ok()?;
        body = &body[line_end + 2..];

        if size == 0 {
            return Some(out);
        }
        if body.len() < size {
            return None;
        }

        out.extend_from_slice(&body[..size]);
        body = &body[size..];
        if body.starts_with(b"\r\n") {
            body = &body[2..];
        }
    }
}
