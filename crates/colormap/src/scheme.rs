//! Colour schemes and the evenly spaced multi-stop interpolation engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// RGB color as (r, g, b) with values in 0..=255.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `RRGGBB`, with or without a leading `#`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }

    /// Upper-case `RRGGBB` without `#`, the form image exports expect.
    pub fn hex(&self) -> String {
        format!("{:02X}{:02X}{:02X}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.hex())
    }
}

/// Available color schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorScheme {
    /// Dark red -> yellow -> dark green (NDVI vigor)
    Vigor,
    /// Brown -> pale cyan -> navy (NDWI water content)
    Moisture,
    /// Dark red -> pale yellow -> dark green (EVI productivity)
    Productivity,
    /// Red, yellow, green: one flat colour per management zone
    Zones,
    /// Black -> White
    Grayscale,
}

impl ColorScheme {
    pub const ALL: &[ColorScheme] = &[
        Self::Vigor,
        Self::Moisture,
        Self::Productivity,
        Self::Zones,
        Self::Grayscale,
    ];

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vigor => "Vigor",
            Self::Moisture => "Moisture",
            Self::Productivity => "Productivity",
            Self::Zones => "Zones",
            Self::Grayscale => "Grayscale",
        }
    }

    /// Colours from low to high
    pub fn colors(&self) -> &'static [Rgb] {
        match self {
            Self::Vigor => VIGOR,
            Self::Moisture => MOISTURE,
            Self::Productivity => PRODUCTIVITY,
            Self::Zones => ZONES,
            Self::Grayscale => GRAYSCALE,
        }
    }

    /// Discrete schemes pick a colour, they never blend
    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Zones)
    }
}

// ─── Palettes ──────────────────────────────────────────────────────────

const VIGOR: &[Rgb] = &[
    Rgb::new(139, 0, 0),
    Rgb::new(255, 0, 0),
    Rgb::new(255, 99, 71),
    Rgb::new(255, 165, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(173, 255, 47),
    Rgb::new(124, 252, 0),
    Rgb::new(50, 205, 50),
    Rgb::new(34, 139, 34),
    Rgb::new(0, 100, 0),
];

const MOISTURE: &[Rgb] = &[
    Rgb::new(139, 69, 19),
    Rgb::new(210, 105, 30),
    Rgb::new(244, 164, 96),
    Rgb::new(255, 248, 220),
    Rgb::new(224, 255, 255),
    Rgb::new(135, 206, 235),
    Rgb::new(70, 130, 180),
    Rgb::new(0, 0, 205),
    Rgb::new(0, 0, 139),
];

const PRODUCTIVITY: &[Rgb] = &[
    Rgb::new(139, 0, 0),
    Rgb::new(205, 92, 92),
    Rgb::new(240, 128, 128),
    Rgb::new(255, 255, 224),
    Rgb::new(173, 255, 47),
    Rgb::new(127, 255, 0),
    Rgb::new(50, 205, 50),
    Rgb::new(34, 139, 34),
    Rgb::new(0, 100, 0),
];

/// Low vigor (high dose) first
const ZONES: &[Rgb] = &[
    Rgb::new(255, 0, 0),
    Rgb::new(255, 255, 0),
    Rgb::new(0, 128, 0),
];

const GRAYSCALE: &[Rgb] = &[Rgb::new(0, 0, 0), Rgb::new(255, 255, 255)];

// ─── Interpolation engine ──────────────────────────────────────────────

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn lerp_color(c1: Rgb, c2: Rgb, t: f64) -> Rgb {
    Rgb::new(
        lerp(c1.r as f64, c2.r as f64, t).round() as u8,
        lerp(c1.g as f64, c2.g as f64, t).round() as u8,
        lerp(c1.b as f64, c2.b as f64, t).round() as u8,
    )
}

/// Colours spread evenly over [0, 1]
fn multi_stop(colors: &[Rgb], t: f64) -> Rgb {
    let last = colors.len() - 1;
    if t <= 0.0 || last == 0 {
        return colors[0];
    }
    if t >= 1.0 {
        return colors[last];
    }
    let pos = t * last as f64;
    let i = pos.floor() as usize;
    lerp_color(colors[i], colors[(i + 1).min(last)], pos - i as f64)
}

/// Evaluate a color scheme at normalized position `t` ∈ [0, 1].
///
/// Continuous schemes interpolate linearly between neighbouring colours.
/// `Zones` splits [0, 1] into equal bins, one per colour.
pub fn evaluate(scheme: ColorScheme, t: f64) -> Rgb {
    let colors = scheme.colors();
    if t.is_nan() {
        return colors[0];
    }
    if scheme.is_discrete() {
        let n = colors.len();
        let idx = (t * n as f64).floor().clamp(0.0, (n - 1) as f64) as usize;
        return colors[idx];
    }
    multi_stop(colors, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vigor_endpoints() {
        assert_eq!(evaluate(ColorScheme::Vigor, 0.0), Rgb::new(139, 0, 0));
        assert_eq!(evaluate(ColorScheme::Vigor, 1.0), Rgb::new(0, 100, 0));
    }

    #[test]
    fn grayscale_midpoint() {
        let c = evaluate(ColorScheme::Grayscale, 0.5);
        assert_eq!(c, Rgb::new(128, 128, 128));
    }

    #[test]
    fn stops_are_hit_exactly() {
        // 9 colours -> stop 4 sits at t = 0.5
        assert_eq!(evaluate(ColorScheme::Moisture, 0.5), Rgb::new(224, 255, 255));
    }

    #[test]
    fn zones_are_discrete() {
        assert_eq!(evaluate(ColorScheme::Zones, 0.0), Rgb::new(255, 0, 0));
        assert_eq!(evaluate(ColorScheme::Zones, 0.5), Rgb::new(255, 255, 0));
        assert_eq!(evaluate(ColorScheme::Zones, 1.0), Rgb::new(0, 128, 0));
    }

    #[test]
    fn clamping() {
        assert_eq!(evaluate(ColorScheme::Productivity, -0.5), Rgb::new(139, 0, 0));
        assert_eq!(evaluate(ColorScheme::Productivity, 1.5), Rgb::new(0, 100, 0));
    }

    #[test]
    fn hex_round_trip() {
        let c = Rgb::from_hex("#ADFF2F").unwrap();
        assert_eq!(c, Rgb::new(173, 255, 47));
        assert_eq!(c.hex(), "ADFF2F");
        assert_eq!(c.to_string(), "#ADFF2F");
        assert!(Rgb::from_hex("12345").is_none());
        assert!(Rgb::from_hex("GG0000").is_none());
    }

    #[test]
    fn all_schemes_evaluate_midpoint() {
        for &scheme in ColorScheme::ALL {
            let _ = evaluate(scheme, 0.5);
            assert!(!scheme.colors().is_empty(), "{}", scheme.name());
        }
    }
}
