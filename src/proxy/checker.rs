//! Proxy checker driving the load, probe, classify and save pipeline

use crate::proxy::classifier::Classifier;
use crate::proxy::models::{CheckOutcome, OutputRecord, ProxyCandidate};
use crate::proxy::parser::ProxyParser;
use crate::proxy::probe::{
    ApiProbe, DirectProbe, Probe, ProbeMode, DEFAULT_API_TIMEOUT_SECS, DEFAULT_API_URL,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REFERENCE_HOST, DEFAULT_REFERENCE_PATH,
};
use crate::Result;
use anyhow::Context;
use futures::stream::{self, StreamExt};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default number of probes in flight; one keeps the run strictly sequential
const DEFAULT_CONCURRENCY: usize = 1;

/// Configuration for proxy checker
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Which probe strategy to use
    pub mode: ProbeMode,
    /// Checking service endpoint for [`ProbeMode::Api`]
    pub api_url: String,
    /// Timeout for each checking service request
    pub api_timeout: Duration,
    /// Timeout for each network step of a direct probe
    pub connect_timeout: Duration,
    /// Host the direct probe asks for its metadata
    pub reference_host: String,
    /// Metadata path on the reference host
    pub reference_path: String,
    /// Number of concurrent probes
    pub concurrency: usize,
    /// Skip repeated host:port entries
    pub dedupe: bool,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            mode: ProbeMode::default(),
            api_url: DEFAULT_API_URL.to_string(),
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            reference_host: DEFAULT_REFERENCE_HOST.to_string(),
            reference_path: DEFAULT_REFERENCE_PATH.to_string(),
            concurrency: DEFAULT_CONCURRENCY,
            dedupe: false,
        }
    }
}

impl CheckerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: ProbeMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_api_url(mut self, url: String) -> Self {
        self.api_url = url;
        self
    }

    pub fn with_api_timeout(mut self, timeout: Duration) -> Self {
        self.api_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reference(mut self, host: String, path: String) -> Self {
        self.reference_host = host;
        self.reference_path = path;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }
}

/// Totals reported once a run has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub alive: usize,
    pub output_path: PathBuf,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Done! Total active proxies: {} saved to {}",
            self.alive,
            self.output_path.display()
        )
    }
}

/// Proxy checker pairing a probe strategy with its liveness rule
pub struct ProxyChecker {
    probe: Arc<dyn Probe>,
    classifier: Classifier,
    concurrency: usize,
    dedupe: bool,
}

impl ProxyChecker {
    /// Create a checker from an explicit probe and classifier
    pub fn new(probe: Arc<dyn Probe>, classifier: Classifier) -> Self {
        Self {
            probe,
            classifier,
            concurrency: DEFAULT_CONCURRENCY,
            dedupe: false,
        }
    }

    /// Build the probe and classifier described by `config`.
    ///
    /// In direct mode this measures the reference identity first and fails
    /// if it cannot be obtained.
    pub async fn with_config(config: &CheckerConfig) -> Result<Self> {
        let checker = match config.mode {
            ProbeMode::Api => {
                let probe = ApiProbe::new(config.api_url.clone(), config.api_timeout)?;
                Self::new(Arc::new(probe), Classifier::DelayReported)
            }
            ProbeMode::Direct => {
                let probe = DirectProbe::new(
                    config.reference_host.clone(),
                    config.reference_path.clone(),
                    config.connect_timeout,
                )?;
                let reference_ip = probe
                    .reference_identity()
                    .await
                    .context("Cannot judge candidates without a reference identity")?;
                info!(reference_ip = %reference_ip, host = probe.reference_host(), "measured reference identity");
                println!("Reference identity: {}", reference_ip);
                Self::new(Arc::new(probe), Classifier::ForwardingDetected { reference_ip })
            }
        };

        Ok(checker
            .with_concurrency(config.concurrency)
            .with_dedupe(config.dedupe))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_dedupe(mut self, dedupe: bool) -> Self {
        self.dedupe = dedupe;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Probe and classify a single candidate
    pub async fn check_proxy(&self, index: usize, candidate: ProxyCandidate) -> CheckOutcome {
        let result = self.probe.probe(&candidate).await;
        let verdict = self.classifier.classify(&result);
        debug!(
            probe = self.probe.name(),
            proxy = %candidate,
            %verdict,
            delay_ms = result.delay_ms,
            error = result.error.as_deref().unwrap_or(""),
            "checked proxy"
        );

        CheckOutcome {
            index,
            candidate,
            result,
            verdict,
        }
    }

    /// Check every candidate, printing one progress line each.
    ///
    /// Outcomes come back in input order whatever the concurrency.
    pub async fn check_proxies(&self, candidates: Vec<ProxyCandidate>) -> Vec<CheckOutcome> {
        let total = candidates.len();

        stream::iter(candidates.into_iter().enumerate())
            .map(|(index, candidate)| self.check_proxy(index, candidate))
            .buffered(self.concurrency)
            .inspect(|outcome| println!("{}", outcome.progress_line(total)))
            .collect()
            .await
    }

    /// Check candidates and keep the output records of the live ones
    pub async fn check_and_filter(&self, candidates: Vec<ProxyCandidate>) -> Vec<OutputRecord> {
        self.check_proxies(candidates)
            .await
            .iter()
            .filter_map(CheckOutcome::record)
            .collect()
    }

    /// Run the whole pipeline from `input` to `output`
    pub async fn check_file<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input: P,
        output: Q,
    ) -> Result<RunSummary> {
        let mut candidates = ProxyParser::parse_file(&input)?;
        if self.dedupe {
            let before = candidates.len();
            candidates = ProxyParser::dedupe(candidates);
            debug!(removed = before - candidates.len(), "dropped duplicate proxies");
        }

        let total = candidates.len();
        println!("Checking {} proxies...\n", total);

        let records = self.check_and_filter(candidates).await;
        ProxyParser::save_records(&records, &output)?;

        let summary = RunSummary {
            total,
            alive: records.len(),
            output_path: output.as_ref().to_path_buf(),
        };
        println!("\n{}", summary);
        Ok(summary)
    }
}
