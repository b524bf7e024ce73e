//! Ladder Search
//!
//! Linear scan in ladder order: the first estimate at or under the budget
//! wins. When nothing fits, the last (smallest) candidate is returned with
//! `target_exceeded` set. Candidates are never reordered.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::calibration::PresetSizeEstimate;
use crate::errors::{OptimizerError, Result};
use crate::types::FileSize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub index: usize,
    pub estimated: FileSize,
    pub target_exceeded: bool,
}

pub fn select_preset(estimates: &[PresetSizeEstimate], target: FileSize) -> Result<Selection> {
    if target.is_zero() {
        return Err(OptimizerError::InvalidTarget);
    }
    let last = estimates.last().ok_or(OptimizerError::NoEstimates)?;

    let selection = match estimates.iter().find(|e| e.estimated.fits_within(target)) {
        Some(fit) => Selection {
            index: fit.index,
            estimated: fit.estimated,
            target_exceeded: false,
        },
        None => Selection {
            index: last.index,
            estimated: last.estimated,
            target_exceeded: true,
        },
    };

    debug!(
        index = selection.index,
        estimated = selection.estimated.bytes(),
        target = target.bytes(),
        exceeded = selection.target_exceeded,
        "Preset selected"
    );
    Ok(selection)
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Everything before the selection is over budget; the selection is
        /// within budget unless flagged as exceeded, and then it is the last.
        #[test]
        fn prop_selection_is_first_fit(
            sizes in proptest::collection::vec(1u64..10_000_000, 1..30),
            target in 1u64..10_000_000,
        ) {
            let list: Vec<PresetSizeEstimate> = sizes
                .iter()
                .enumerate()
                .map(|(index, bytes)| PresetSizeEstimate {
                    index,
                    relative_factor: 1.0,
                    estimated: FileSize::new(*bytes),
                })
                .collect();
            let selection = select_preset(&list, FileSize::new(target)).unwrap();

            prop_assert!(sizes[..selection.index].iter().all(|s| *s > target));
            if selection.target_exceeded {
                prop_assert_eq!(selection.index, sizes.len() - 1);
                prop_assert!(sizes.iter().all(|s| *s > target));
            } else {
                prop_assert!(sizes[selection.index] <= target);
            }
        }
    }
}
