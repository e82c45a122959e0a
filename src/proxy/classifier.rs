//! Liveness rules applied to probe results

use crate::proxy::models::{ProbeResult, Verdict};

/// Decides whether a probed candidate is worth keeping
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classifier {
    /// Alive when the checking service reported no error and a positive delay
    DelayReported,
    /// Alive when the observed client address differs from our own
    ForwardingDetected { reference_ip: String },
}

impl Classifier {
    pub fn classify(&self, result: &ProbeResult) -> Verdict {
        let alive = match self {
            Classifier::DelayReported => result.error.is_none() && result.delay_ms > 0,
            Classifier::ForwardingDetected { reference_ip } => result
                .client_ip
                .as_deref()
                .is_some_and(|ip| ip != reference_ip),
        };

        if alive {
            Verdict::Alive
        } else {
            Verdict::Dead
        }
    }
}
