//! Candidate list parsing and result file writing

use crate::proxy::models::{OutputRecord, ProxyCandidate};
use crate::Result;
use anyhow::{anyhow, Context};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Proxy parser for reading candidate lists and saving live proxies
pub struct ProxyParser;

impl ProxyParser {
    /// Parse a single candidate line
    ///
    /// Format: `host,port[,country[,organization]]`. Blank lines and lines
    /// with fewer than two fields yield `Ok(None)`. A port that is not an
    /// integer in `1..=65535` is an error.
    pub fn parse_line(line: &str) -> Result<Option<ProxyCandidate>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let parts: Vec<&str> = line.split(',').collect();
        if parts.len() < 2 {
            return Ok(None);
        }

        let port_text = parts[1].trim();
        let port = match port_text.parse::<u16>() {
            Ok(port) if port != 0 => port,
            _ => return Err(anyhow!("Invalid port: {:?}", port_text)),
        };

        Ok(Some(ProxyCandidate::new(
            parts[0].to_string(),
            port,
            parts.get(2).copied(),
            parts.get(3).copied(),
        )))
    }

    /// Parse candidates from a string (multiple lines)
    pub fn parse_string(content: &str) -> Result<Vec<ProxyCandidate>> {
        let mut candidates = Vec::new();
        for (number, line) in content.lines().enumerate() {
            let parsed = Self::parse_line(line).with_context(|| format!("line {}", number + 1))?;
            if let Some(candidate) = parsed {
                candidates.push(candidate);
            }
        }
        Ok(candidates)
    }

    /// Parse candidates from a file
    pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<Vec<ProxyCandidate>> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read proxy list {:?}", path))?;
        Self::parse_string(&content).with_context(|| format!("Malformed proxy list {:?}", path))
    }

    /// Drop repeated `host:port` entries, keeping the first occurrence
    pub fn dedupe(candidates: Vec<ProxyCandidate>) -> Vec<ProxyCandidate> {
        let mut seen = HashSet::new();
        candidates
            .into_iter()
            .filter(|c| seen.insert((c.host.clone(), c.port)))
            .collect()
    }

    /// Save live proxies to a file, replacing any previous contents
    pub fn save_records<P: AsRef<Path>>(records: &[OutputRecord], path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create output directory {:?}", parent))?;
        }

        let content: String = records
            .iter()
            .map(OutputRecord::to_line)
            .collect::<Vec<_>>()
            .join("\n");

        fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))?;
        Ok(())
    }
}
