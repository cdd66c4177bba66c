//! Color math for dominant-color samples.
//!
//! Converts RGB to HSL, buckets hues into coarse categories, and measures
//! perceptual distance in HSL space. Everything here is pure; the stores
//! translate the same predicates into their own query language.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::defaults::{COLOR_DISTANCE_SCALE, GRAY_SATURATION_MAX};
use crate::error::{Error, Result};

/// HSL triple: hue in `[0, 360)`, saturation and lightness in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsl {
    pub h: u16,
    pub s: u8,
    pub l: u8,
}

impl Hsl {
    /// Build an HSL value, wrapping hue into `[0, 360)` and clamping s/l to 100.
    pub fn new(h: u16, s: u8, l: u8) -> Self {
        Self {
            h: h % 360,
            s: s.min(100),
            l: l.min(100),
        }
    }

    /// Whether this color is achromatic enough to count as gray.
    pub fn is_gray(&self) -> bool {
        self.s <= GRAY_SATURATION_MAX
    }
}

/// Coarse hue bucket.
///
/// `Gray` is never produced from a hue angle; it is a filter target matching
/// low-saturation samples (see [`Hsl::is_gray`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HueCategory {
    Red,
    Orange,
    Yellow,
    Green,
    Cyan,
    Blue,
    Violet,
    Gray,
}

impl HueCategory {
    /// Bucket a hue angle. Total over all inputs: angles wrap modulo 360.
    pub fn from_hue(h: u16) -> Self {
        match h % 360 {
            0..=14 | 345..=359 => HueCategory::Red,
            15..=44 => HueCategory::Orange,
            45..=74 => HueCategory::Yellow,
            75..=134 => HueCategory::Green,
            135..=194 => HueCategory::Cyan,
            195..=254 => HueCategory::Blue,
            _ => HueCategory::Violet,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HueCategory::Red => "red",
            HueCategory::Orange => "orange",
            HueCategory::Yellow => "yellow",
            HueCategory::Green => "green",
            HueCategory::Cyan => "cyan",
            HueCategory::Blue => "blue",
            HueCategory::Violet => "violet",
            HueCategory::Gray => "gray",
        }
    }
}

impl fmt::Display for HueCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HueCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "red" => Ok(HueCategory::Red),
            "orange" => Ok(HueCategory::Orange),
            "yellow" => Ok(HueCategory::Yellow),
            "green" => Ok(HueCategory::Green),
            "cyan" => Ok(HueCategory::Cyan),
            "blue" => Ok(HueCategory::Blue),
            "violet" | "purple" => Ok(HueCategory::Violet),
            "gray" | "grey" => Ok(HueCategory::Gray),
            other => Err(Error::InvalidRequest(format!("unknown hue category: {other}"))),
        }
    }
}

/// How the hue component contributes to [`color_distance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorDistanceMetric {
    /// Plain numeric hue difference. Hue 359 and hue 1 are 358 apart.
    Linear,
    /// Shortest angular difference. Hue 359 and hue 1 are 2 apart.
    #[default]
    Circular,
}

impl ColorDistanceMetric {
    /// Hue difference under this metric.
    pub fn hue_delta(&self, h1: u16, h2: u16) -> f64 {
        let d = (f64::from(h1) - f64::from(h2)).abs();
        match self {
            ColorDistanceMetric::Linear => d,
            ColorDistanceMetric::Circular => d.min(360.0 - d),
        }
    }
}

/// Standard RGB to HSL conversion, rounded to integers.
pub fn rgb_to_hsl(r: u8, g: u8, b: u8) -> Hsl {
    let r = f64::from(r) / 255.0;
    let g = f64::from(g) / 255.0;
    let b = f64::from(b) / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if max == min {
        return Hsl::new(0, 0, (l * 100.0).round() as u8);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if max == r {
        (g - b) / d + if g < b { 6.0 } else { 0.0 }
    } else if max == g {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    let hue = ((h * 60.0).round() as u16) % 360;
    Hsl::new(hue, (s * 100.0).round() as u8, (l * 100.0).round() as u8)
}

/// Hue bucket for an angle. See [`HueCategory::from_hue`].
pub fn hue_category(h: u16) -> HueCategory {
    HueCategory::from_hue(h)
}

/// Euclidean distance over the three HSL components.
pub fn color_distance(a: Hsl, b: Hsl, metric: ColorDistanceMetric) -> f64 {
    let dh = metric.hue_delta(a.h, b.h);
    let ds = f64::from(a.s) - f64::from(b.s);
    let dl = f64::from(a.l) - f64::from(b.l);
    (dh * dh + ds * ds + dl * dl).sqrt()
}

/// Map a similarity fraction in `[0, 1]` to the largest accepted distance.
pub fn max_distance_for_threshold(threshold: f64) -> f64 {
    (1.0 - threshold.clamp(0.0, 1.0)) * COLOR_DISTANCE_SCALE
}

/// Parse `#rrggbb` or `rrggbb` into RGB components.
pub fn parse_hex(hex: &str) -> Result<(u8, u8, u8)> {
    let digits = hex.trim().trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return Err(Error::InvalidRequest(format!("invalid hex color: {hex}")));
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .map_err(|_| Error::InvalidRequest(format!("invalid hex color: {hex}")))
    };
    Ok((channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

/// One dominant color of an item or asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorSample {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub hex: String,
    /// Share of the image covered by this color, `0.0..=100.0`.
    pub percentage: f32,
    pub hsl: Hsl,
    pub category: HueCategory,
}

impl ColorSample {
    /// Build a sample from RGB, deriving hex, HSL and hue category together.
    pub fn from_rgb(r: u8, g: u8, b: u8, percentage: f32) -> Self {
        let hsl = rgb_to_hsl(r, g, b);
        Self {
            r,
            g,
            b,
            hex: format!("#{r:02x}{g:02x}{b:02x}"),
            percentage,
            hsl,
            category: HueCategory::from_hue(hsl.h),
        }
    }

    /// Build a sample from a hex string.
    pub fn from_hex(hex: &str, percentage: f32) -> Result<Self> {
        let (r, g, b) = parse_hex(hex)?;
        Ok(Self::from_rgb(r, g, b, percentage))
    }

    /// Whether this sample falls in `category`.
    ///
    /// Chromatic categories compare the stored category alone; `Gray` matches
    /// on saturation. A desaturated sample can therefore be in both.
    pub fn in_category(&self, category: HueCategory) -> bool {
        match category {
            HueCategory::Gray => self.hsl.is_gray(),
            other => self.category == other,
        }
    }

    /// Like [`in_category`](Self::in_category), but gray samples never fall
    /// in a chromatic category.
    pub fn in_chromatic_category(&self, category: HueCategory) -> bool {
        match category {
            HueCategory::Gray => self.hsl.is_gray(),
            other => !self.hsl.is_gray() && self.category == other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb_to_hsl_primaries() {
        assert_eq!(rgb_to_hsl(255, 0, 0), Hsl::new(0, 100, 50));
        assert_eq!(rgb_to_hsl(0, 255, 0), Hsl::new(120, 100, 50));
        assert_eq!(rgb_to_hsl(0, 0, 255), Hsl::new(240, 100, 50));
    }

    #[test]
    fn test_rgb_to_hsl_achromatic() {
        assert_eq!(rgb_to_hsl(0, 0, 0), Hsl::new(0, 0, 0));
        assert_eq!(rgb_to_hsl(255, 255, 255), Hsl::new(0, 0, 100));
        assert_eq!(rgb_to_hsl(128, 128, 128), Hsl::new(0, 0, 50));
    }

    #[test]
    fn test_rgb_to_hsl_mixed() {
        // #ff8000 is orange at 30 degrees
        assert_eq!(rgb_to_hsl(255, 128, 0), Hsl::new(30, 100, 50));
        // magenta-ish pink wraps through the red branch with g < b
        let pink = rgb_to_hsl(255, 0, 128);
        assert_eq!(pink.h, 330);
    }

    #[test]
    fn test_hue_bands() {
        assert_eq!(hue_category(10), HueCategory::Red);
        assert_eq!(hue_category(50), HueCategory::Yellow);
        assert_eq!(hue_category(0), HueCategory::Red);
        assert_eq!(hue_category(344), HueCategory::Violet);
        assert_eq!(hue_category(345), HueCategory::Red);
        assert_eq!(hue_category(15), HueCategory::Orange);
        assert_eq!(hue_category(75), HueCategory::Green);
        assert_eq!(hue_category(135), HueCategory::Cyan);
        assert_eq!(hue_category(195), HueCategory::Blue);
        assert_eq!(hue_category(255), HueCategory::Violet);
    }

    #[test]
    fn test_hue_category_total_and_never_gray() {
        for h in 0..720u16 {
            let category = hue_category(h);
            assert_ne!(category, HueCategory::Gray);
            assert_eq!(category, hue_category(h % 360));
        }
    }

    #[test]
    fn test_distance_metrics() {
        let a = Hsl::new(359, 50, 50);
        let b = Hsl::new(1, 50, 50);
        assert_eq!(color_distance(a, b, ColorDistanceMetric::Linear), 358.0);
        assert_eq!(color_distance(a, b, ColorDistanceMetric::Circular), 2.0);
    }

    #[test]
    fn test_distance_is_euclidean() {
        let a = Hsl::new(10, 20, 30);
        let b = Hsl::new(13, 24, 30);
        assert!((color_distance(a, b, ColorDistanceMetric::Linear) - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_max_distance_for_threshold() {
        assert_eq!(max_distance_for_threshold(1.0), 0.0);
        assert_eq!(max_distance_for_threshold(0.0), 100.0);
        assert!((max_distance_for_threshold(0.8) - 20.0).abs() < 1e-9);
        assert_eq!(max_distance_for_threshold(3.0), 0.0);
    }

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("#ff8000").unwrap(), (255, 128, 0));
        assert_eq!(parse_hex("00FF00").unwrap(), (0, 255, 0));
        assert!(parse_hex("#fff").is_err());
        assert!(parse_hex("zzzzzz").is_err());
    }

    #[test]
    fn test_sample_derives_category_and_hex() {
        let sample = ColorSample::from_rgb(255, 0, 0, 42.0);
        assert_eq!(sample.hex, "#ff0000");
        assert_eq!(sample.category, HueCategory::Red);
        assert!(sample.in_category(HueCategory::Red));
        assert!(!sample.in_category(HueCategory::Gray));
    }

    #[test]
    fn test_black_is_gray_and_stored_red() {
        let black = ColorSample::from_rgb(0, 0, 0, 10.0);
        assert_eq!(black.category, HueCategory::Red);
        assert!(black.in_category(HueCategory::Gray));
        assert!(black.in_category(HueCategory::Red));
        assert!(black.in_chromatic_category(HueCategory::Gray));
        assert!(!black.in_chromatic_category(HueCategory::Red));
    }

    #[test]
    fn test_muted_red_keeps_its_category() {
        let muted = ColorSample::from_rgb(140, 120, 118, 50.0);
        assert_eq!(muted.category, HueCategory::Red);
        assert!(muted.hsl.is_gray());
        assert!(muted.in_category(HueCategory::Red));
        assert!(!muted.in_category(HueCategory::Blue));
        assert!(!muted.in_chromatic_category(HueCategory::Red));
    }

    #[test]
    fn test_category_from_str() {
        assert_eq!("Grey".parse::<HueCategory>().unwrap(), HueCategory::Gray);
        assert_eq!("purple".parse::<HueCategory>().unwrap(), HueCategory::Violet);
        assert!("teal".parse::<HueCategory>().is_err());
    }
}
