//! User resize choice
//!
//! The user's own resize is applied first; ladder presets then scale the
//! result further. Output dimensions never exceed the source and are kept
//! even so yuv420 encoders accept them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum UserResize {
    #[default]
    Original,
    /// Percentage of the source size.
    Percent(u32),
    /// Target width in pixels, height follows the aspect ratio.
    Width(u32),
    /// Target length of the longer edge in pixels.
    LongerEdge(u32),
}

impl UserResize {
    pub fn is_original(&self) -> bool {
        matches!(self, UserResize::Original)
    }

    /// Output dimensions for a `width × height` source. Unknown dimensions
    /// stay unknown.
    pub fn apply(&self, width: u32, height: u32) -> (u32, u32) {
        if width == 0 || height == 0 {
            return (width, height);
        }
        let scale = match *self {
            UserResize::Original => return (width, height),
            UserResize::Percent(percent) => percent.clamp(1, 100) as f64 / 100.0,
            UserResize::Width(target) => target as f64 / width as f64,
            UserResize::LongerEdge(target) => target as f64 / width.max(height) as f64,
        };
        scale_dimensions(width, height, scale)
    }
}

impl FromStr for UserResize {
    type Err = String;

    /// `""`/`original`, `50%`, `640` (width) or `L720` (longer edge).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("original") {
            return Ok(UserResize::Original);
        }
        let invalid = || format!("invalid resize '{}': expected 50%, 640 or L720", s);

        if let Some(percent) = s.strip_suffix('%') {
            let value: u32 = percent.trim().parse().map_err(|_| invalid())?;
            if value == 0 {
                return Err(invalid());
            }
            return Ok(UserResize::Percent(value));
        }
        if let Some(edge) = s.strip_prefix('L').or_else(|| s.strip_prefix('l')) {
            let value: u32 = edge.trim().parse().map_err(|_| invalid())?;
            if value == 0 {
                return Err(invalid());
            }
            return Ok(UserResize::LongerEdge(value));
        }
        match s.parse::<u32>() {
            Ok(0) | Err(_) => Err(invalid()),
            Ok(width) => Ok(UserResize::Width(width)),
        }
    }
}

impl fmt::Display for UserResize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UserResize::Original => f.write_str("original"),
            UserResize::Percent(p) => write!(f, "{}%", p),
            UserResize::Width(w) => write!(f, "{}", w),
            UserResize::LongerEdge(l) => write!(f, "L{}", l),
        }
    }
}

/// Scales dimensions down by `scale`, rounding to even values of at least 2.
/// Scales of 1.0 or more (and non-finite scales) return the input unchanged.
pub fn scale_dimensions(width: u32, height: u32, scale: f64) -> (u32, u32) {
    if width == 0 || height == 0 || !scale.is_finite() || scale >= 1.0 {
        return (width, height);
    }
    let scale = scale.max(0.0);
    (even(width as f64 * scale), even(height as f64 * scale))
}

fn even(value: f64) -> u32 {
    // tolerance keeps 1920 × (640 / 1920) at 640
    let value = ((value + 1e-6) / 2.0).floor() * 2.0;
    value.max(2.0) as u32
}
