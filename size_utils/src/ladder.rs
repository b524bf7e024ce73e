//! Preset Ladder Model
//!
//! A ladder is an ordered list of candidate encoder settings, largest expected
//! output first. Each candidate carries a `relative_size_factor` measured
//! offline; only ratios between factors of the same ladder are meaningful, so
//! the factor at `reference_index` is the normalisation basis.
//!
//! The order of a ladder *is* the degradation policy: the search never
//! reorders candidates, it just walks down until one fits.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::{OptimizerError, Result};

// ═══════════════════════════════════════════════════════════════
// LadderVariant
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LadderVariant {
    /// Quality varies, resolution fixed.
    Standard,
    /// Resolution steps interleaved before the harshest quality steps.
    AutoResize,
}

impl LadderVariant {
    pub fn from_auto_resize(auto_resize: bool) -> Self {
        if auto_resize {
            LadderVariant::AutoResize
        } else {
            LadderVariant::Standard
        }
    }

    pub fn is_auto_resize(&self) -> bool {
        matches!(self, LadderVariant::AutoResize)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LadderVariant::Standard => "standard",
            LadderVariant::AutoResize => "auto_resize",
        }
    }
}

impl fmt::Display for LadderVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ═══════════════════════════════════════════════════════════════
// PresetCandidate
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetCandidate<P> {
    pub preset: P,
    pub relative_size_factor: f64,
}

impl<P> PresetCandidate<P> {
    pub const fn new(preset: P, relative_size_factor: f64) -> Self {
        Self {
            preset,
            relative_size_factor,
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// PresetLadder
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetLadder<P> {
    name: String,
    variant: LadderVariant,
    table_version: String,
    reference_index: usize,
    candidates: Vec<PresetCandidate<P>>,
}

impl<P> PresetLadder<P> {
    /// Builds and validates a ladder.
    pub fn new(
        name: impl Into<String>,
        variant: LadderVariant,
        reference_index: usize,
        candidates: Vec<PresetCandidate<P>>,
    ) -> Result<Self> {
        let ladder = Self::unchecked(name, variant, reference_index, candidates);
        ladder.validate()?;
        Ok(ladder)
    }

    /// Built-in tables skip validation here; `validate` runs on every
    /// optimizer call and in the table tests.
    pub(crate) fn unchecked(
        name: impl Into<String>,
        variant: LadderVariant,
        reference_index: usize,
        candidates: Vec<PresetCandidate<P>>,
    ) -> Self {
        Self {
            name: name.into(),
            variant,
            table_version: String::from("custom"),
            reference_index,
            candidates,
        }
    }

    pub fn with_table_version(mut self, version: impl Into<String>) -> Self {
        self.table_version = version.into();
        self
    }

    /// Checks the ladder contract: non-empty, reference in range, factors
    /// finite and positive, non-increasing from first to last.
    pub fn validate(&self) -> Result<()> {
        if self.candidates.is_empty() {
            return Err(OptimizerError::EmptyLadder(self.name.clone()));
        }
        if self.reference_index >= self.candidates.len() {
            return Err(OptimizerError::ReferenceOutOfRange {
                ladder: self.name.clone(),
                index: self.reference_index,
                len: self.candidates.len(),
            });
        }

        let mut previous: Option<f64> = None;
        for (index, candidate) in self.candidates.iter().enumerate() {
            let factor = candidate.relative_size_factor;
            if !factor.is_finite() || factor <= 0.0 {
                return Err(OptimizerError::InvalidFactor {
                    ladder: self.name.clone(),
                    index,
                    factor,
                });
            }
            if let Some(previous) = previous {
                if factor > previous {
                    return Err(OptimizerError::NotDescending {
                        ladder: self.name.clone(),
                        index,
                        factor,
                        previous,
                    });
                }
            }
            previous = Some(factor);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn variant(&self) -> LadderVariant {
        self.variant
    }

    pub fn table_version(&self) -> &str {
        &self.table_version
    }

    pub fn reference_index(&self) -> usize {
        self.reference_index
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn last_index(&self) -> usize {
        self.candidates.len().saturating_sub(1)
    }

    pub fn get(&self, index: usize) -> Option<&PresetCandidate<P>> {
        self.candidates.get(index)
    }

    pub fn candidates(&self) -> &[PresetCandidate<P>] {
        &self.candidates
    }

    pub fn iter(&self) -> impl Iterator<Item = &PresetCandidate<P>> {
        self.candidates.iter()
    }

    pub fn reference(&self) -> Option<&PresetCandidate<P>> {
        self.candidates.get(self.reference_index)
    }

    /// `factor[index] / factor[reference]`; exactly 1.0 at the reference.
    pub fn relative_factor(&self, index: usize) -> Option<f64> {
        let reference = self.reference()?.relative_size_factor;
        let factor = self.candidates.get(index)?.relative_size_factor;
        Some(factor / reference)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ladder(factors: &[f64], reference_index: usize) -> Result<PresetLadder<usize>> {
        PresetLadder::new(
            "test",
            LadderVariant::Standard,
            reference_index,
            factors
                .iter()
                .enumerate()
                .map(|(i, f)| PresetCandidate::new(i, *f))
                .collect(),
        )
    }

    #[test]
    fn test_valid_ladder() {
        let ladder = ladder(&[1.5, 1.0, 0.4], 1).unwrap();
        assert_eq!(ladder.len(), 3);
        assert_eq!(ladder.last_index(), 2);
        assert_eq!(ladder.relative_factor(1), Some(1.0));
        assert_eq!(ladder.relative_factor(0), Some(1.5));
        assert_eq!(ladder.relative_factor(3), None);
        assert_eq!(ladder.table_version(), "custom");
    }

    #[test]
    fn test_equal_neighbours_allowed() {
        assert!(ladder(&[1.0, 1.0, 0.85], 1).is_ok());
    }

    #[test]
    fn test_empty_ladder_rejected() {
        assert!(matches!(ladder(&[], 0), Err(OptimizerError::EmptyLadder(_))));
    }

    #[test]
    fn test_reference_out_of_range() {
        assert!(matches!(
            ladder(&[1.0, 0.5], 2),
            Err(OptimizerError::ReferenceOutOfRange { index: 2, len: 2, .. })
        ));
    }

    #[test]
    fn test_invalid_factors() {
        assert!(matches!(
            ladder(&[1.0, 0.0], 0),
            Err(OptimizerError::InvalidFactor { index: 1, .. })
        ));
        assert!(matches!(
            ladder(&[f64::NAN], 0),
            Err(OptimizerError::InvalidFactor { index: 0, .. })
        ));
    }

    #[test]
    fn test_ascending_rejected() {
        assert!(matches!(
            ladder(&[1.0, 0.5, 0.6], 1),
            Err(OptimizerError::NotDescending { index: 2, .. })
        ));
    }

    #[test]
    fn test_variant_from_flag() {
        assert_eq!(LadderVariant::from_auto_resize(true), LadderVariant::AutoResize);
        assert_eq!(LadderVariant::from_auto_resize(false), LadderVariant::Standard);
        assert_eq!(LadderVariant::AutoResize.to_string(), "auto_resize");
    }
}
