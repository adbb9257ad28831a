//! Stretch and palette presets per exported layer.

use serde::{Deserialize, Serialize};

use crate::scheme::{evaluate, ColorScheme, Rgb};

/// A min/max stretch over a colour scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ramp {
    pub scheme: ColorScheme,
    pub min: f64,
    pub max: f64,
}

impl Ramp {
    pub fn new(scheme: ColorScheme, min: f64, max: f64) -> Self {
        Self { scheme, min, max }
    }

    /// NDVI vigor, 0.0 to 0.8
    pub fn ndvi() -> Self {
        Self::new(ColorScheme::Vigor, 0.0, 0.8)
    }

    /// NDWI water content, -0.3 to 0.4
    pub fn ndwi() -> Self {
        Self::new(ColorScheme::Moisture, -0.3, 0.4)
    }

    /// EVI productivity, 0.0 to 0.6
    pub fn evi() -> Self {
        Self::new(ColorScheme::Productivity, 0.0, 0.6)
    }

    /// Management zones labelled 1..=3
    pub fn vra_zones() -> Self {
        Self::new(ColorScheme::Zones, 1.0, 3.0)
    }

    /// Preset for an exported layer name (`NDVI`, `NDWI`, `EVI`, `VRA`),
    /// case-insensitive
    pub fn for_index(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "NDVI" => Some(Self::ndvi()),
            "NDWI" => Some(Self::ndwi()),
            "EVI" => Some(Self::evi()),
            "VRA" | "ZONES" => Some(Self::vra_zones()),
            _ => None,
        }
    }

    pub fn palette(&self) -> &'static [Rgb] {
        self.scheme.colors()
    }

    pub fn palette_hex(&self) -> Vec<String> {
        self.palette().iter().map(Rgb::hex).collect()
    }

    /// Colour a value, clamped to the stretch
    pub fn color_at(&self, value: f64) -> Rgb {
        let range = self.max - self.min;
        let t = if range.abs() > f64::EPSILON {
            (value - self.min) / range
        } else {
            0.0
        };
        if self.scheme.is_discrete() {
            // Integer labels min..=max map to bin centres
            let n = self.palette().len() as f64;
            let bin = ((value - self.min).round() / range.max(1.0) * (n - 1.0)).round();
            return evaluate(self.scheme, (bin + 0.5) / n);
        }
        evaluate(self.scheme, t)
    }
}
