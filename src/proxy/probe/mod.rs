//! Probe strategies for checking a single candidate
//!
//! Two interchangeable strategies sit behind the [`Probe`] trait:
//! - [`ApiProbe`] asks a third-party checking service about the candidate
//! - [`DirectProbe`] tunnels a TLS request through the candidate itself

mod api;
mod direct;

pub use api::{ApiProbe, DEFAULT_API_TIMEOUT_SECS, DEFAULT_API_URL};
pub use direct::{
    DirectProbe, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REFERENCE_HOST, DEFAULT_REFERENCE_PATH,
    PARSE_FAILED,
};

use crate::proxy::models::{ProbeResult, ProxyCandidate};
use anyhow::anyhow;
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;

/// A single network round-trip that measures one candidate.
///
/// Implementations never fail: transport and decode problems are folded
/// into an unsuccessful [`ProbeResult`].
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, candidate: &ProxyCandidate) -> ProbeResult;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Which probe strategy to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProbeMode {
    #[default]
    Api,
    Direct,
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Api => write!(f, "api"),
            ProbeMode::Direct => write!(f, "direct"),
        }
    }
}

impl FromStr for ProbeMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "api" => Ok(ProbeMode::Api),
            "direct" => Ok(ProbeMode::Direct),
            _ => Err(anyhow!("Invalid probe mode: {}. Use: api, direct", s)),
        }
    }
}
