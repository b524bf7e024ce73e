//! Heuristic Estimator
//!
//! Closed-form size prediction for one preset, no encode. The formulas
//! themselves live with each media adapter; this module holds the shared
//! result type, the confidence scale and the ladder-wide walk.
//!
//! Contract for every formula: pure, deterministic, never panics, and returns
//! a defined minimum when duration or dimensions are unknown.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::asset::AssetProfile;
use crate::ladder::PresetLadder;
use crate::media::MediaAdapter;
use crate::types::FileSize;

/// How much an estimate can be trusted. Ordered: `Minimal < Low < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    /// Metadata was missing; only fixed overhead was counted.
    Minimal,
    /// Closed-form formula over known metadata.
    Low,
    /// Anchored on a real sample encode.
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Minimal => "minimal",
            Confidence::Low => "low",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeuristicEstimate {
    pub estimated: FileSize,
    pub confidence: Confidence,
}

impl HeuristicEstimate {
    /// Formula result plus fixed overhead. Non-finite or negative payloads
    /// count as zero so the overhead is always the floor.
    pub fn from_formula(payload_bytes: f64, overhead_bytes: u64) -> Self {
        let payload = FileSize::from_f64(payload_bytes);
        Self {
            estimated: payload.saturating_add(FileSize::new(overhead_bytes)),
            confidence: Confidence::Low,
        }
    }

    /// Degenerate metadata: only the overhead is known.
    pub fn minimal(overhead_bytes: u64) -> Self {
        Self {
            estimated: FileSize::new(overhead_bytes),
            confidence: Confidence::Minimal,
        }
    }

    pub fn bytes(&self) -> u64 {
        self.estimated.bytes()
    }
}

/// Runs the adapter's formula for every candidate, in ladder order.
pub fn estimate_ladder<A: MediaAdapter>(
    adapter: &A,
    profile: &AssetProfile,
    params: &A::Params,
    ladder: &PresetLadder<A::Preset>,
) -> Vec<HeuristicEstimate> {
    ladder
        .iter()
        .map(|candidate| adapter.heuristic(profile, params, &candidate.preset))
        .collect()
}

/// Lowest confidence of a set, `Minimal` when empty.
pub fn overall_confidence(estimates: &[HeuristicEstimate]) -> Confidence {
    estimates
        .iter()
        .map(|e| e.confidence)
        .min()
        .unwrap_or(Confidence::Minimal)
}
