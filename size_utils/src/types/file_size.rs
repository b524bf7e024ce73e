//! FileSize Type-Safe Wrapper
//!
//! Byte counts for targets, samples and estimates. Arithmetic saturates
//! instead of wrapping, and float scaling never produces negative sizes.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// FileSize Newtype
// ============================================================================

/// Size in bytes.
///
/// # Examples
/// ```
/// use size_utils::types::file_size::FileSize;
///
/// let target = FileSize::from_mb_f64(5.0);
/// assert_eq!(target.bytes(), 5 * 1024 * 1024);
/// assert_eq!(target.display(), "5.00 MB");
///
/// let estimate = FileSize::new(1024 * 1024);
/// assert_eq!(estimate.utilization_of(target), Some(20.0));
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileSize(u64);

impl FileSize {
    pub const ZERO: FileSize = FileSize(0);

    pub const KB: u64 = 1024;
    pub const MB: u64 = 1024 * 1024;
    pub const GB: u64 = 1024 * 1024 * 1024;

    #[inline]
    pub const fn new(bytes: u64) -> Self {
        Self(bytes)
    }

    #[inline]
    pub const fn from_kb(kb: u64) -> Self {
        Self(kb * Self::KB)
    }

    #[inline]
    pub const fn from_mb(mb: u64) -> Self {
        Self(mb * Self::MB)
    }

    /// Fractional megabytes, as typed into a "max size" field.
    /// Negative and non-finite input maps to zero.
    pub fn from_mb_f64(mb: f64) -> Self {
        Self::from_f64(mb * Self::MB as f64)
    }

    /// Rounds to the nearest byte; negative and non-finite input maps to zero.
    pub fn from_f64(bytes: f64) -> Self {
        if bytes.is_finite() && bytes > 0.0 {
            Self(bytes.round().min(u64::MAX as f64) as u64)
        } else {
            Self::ZERO
        }
    }

    #[inline]
    pub const fn bytes(&self) -> u64 {
        self.0
    }

    #[inline]
    pub fn as_f64(&self) -> f64 {
        self.0 as f64
    }

    #[inline]
    pub fn saturating_sub(&self, other: FileSize) -> FileSize {
        FileSize(self.0.saturating_sub(other.0))
    }

    #[inline]
    pub fn saturating_add(&self, other: FileSize) -> FileSize {
        FileSize(self.0.saturating_add(other.0))
    }

    /// Multiplies by a ratio, rounding to the nearest byte.
    pub fn scale(&self, ratio: f64) -> FileSize {
        Self::from_f64(self.0 as f64 * ratio)
    }

    /// `self / target × 100`, `None` when the target is zero.
    pub fn utilization_of(&self, target: FileSize) -> Option<f64> {
        if target.0 == 0 {
            None
        } else {
            Some(self.0 as f64 / target.0 as f64 * 100.0)
        }
    }

    pub fn fits_within(&self, budget: FileSize) -> bool {
        self.0 <= budget.0
    }

    pub fn display(&self) -> String {
        if self.0 >= Self::GB {
            format!("{:.2} GB", self.0 as f64 / Self::GB as f64)
        } else if self.0 >= Self::MB {
            format!("{:.2} MB", self.0 as f64 / Self::MB as f64)
        } else if self.0 >= Self::KB {
            format!("{:.2} KB", self.0 as f64 / Self::KB as f64)
        } else {
            format!("{} B", self.0)
        }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

// ============================================================================
// Trait Implementations
// ============================================================================

impl fmt::Debug for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileSize({} = {})", self.0, self.display())
    }
}

impl fmt::Display for FileSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display())
    }
}

impl Default for FileSize {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<u64> for FileSize {
    fn from(bytes: u64) -> Self {
        Self::new(bytes)
    }
}

impl From<FileSize> for u64 {
    fn from(size: FileSize) -> Self {
        size.0
    }
}

// ============================================================================
// Tests
// ============================================================================
