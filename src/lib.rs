//! Proxy Sieve - Proxy List Checker
//!
//! Loads candidate proxies from a comma-delimited list, probes each one,
//! and keeps the live ones annotated with latency and ASN metadata.

pub mod logging;
pub mod proxy;

pub use proxy::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;

/// Default input file of candidate proxies
pub const DEFAULT_INPUT_FILE: &str = "proxies.txt";

/// Default output file for live proxies
pub const DEFAULT_OUTPUT_FILE: &str = "proxies_alive.txt";
