//! Proxy module for loading, probing and filtering candidate proxies
//!
//! This module provides functionality for:
//! - Parsing candidates from `host,port[,country[,organization]]` lines
//! - Probing candidates through a checking API or a direct TLS connection
//! - Classifying probe results as alive or dead
//! - Saving live proxies with their metadata

pub mod checker;
pub mod classifier;
pub mod models;
pub mod parser;
pub mod probe;

pub use checker::{CheckerConfig, ProxyChecker, RunSummary};
pub use classifier::Classifier;
pub use models::{CheckOutcome, OutputRecord, ProbeResult, ProxyCandidate, Verdict};
pub use parser::ProxyParser;
pub use probe::{ApiProbe, DirectProbe, Probe, ProbeMode};
