//! Type-Safe Wrappers Module
//!
//! - `file_size`: byte counts with saturating arithmetic
//! - `cancel`: cooperative cancellation flag shared with the caller

pub mod cancel;
pub mod file_size;

pub use cancel::CancelFlag;
pub use file_size::FileSize;

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Scaling by 1.0 never changes a size.
        #[test]
        fn scale_identity(bytes in 0u64..(1u64 << 52)) {
            let size = FileSize::new(bytes);
            prop_assert_eq!(size.scale(1.0), size);
        }

        /// Scaling never goes negative and is monotone in the ratio.
        #[test]
        fn scale_monotone(bytes in 0u64..(1u64 << 40), a in 0.0f64..10.0, b in 0.0f64..10.0) {
            let size = FileSize::new(bytes);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(size.scale(lo) <= size.scale(hi));
        }

        #[test]
        fn fits_within_matches_ordering(a in any::<u64>(), b in any::<u64>()) {
            prop_assert_eq!(FileSize::new(a).fits_within(FileSize::new(b)), a <= b);
        }
    }
}
