//! Canonical band schema shared by every sensor after harmonization

use orbita_core::raster::Raster;
use orbita_core::Result;
use serde::{Deserialize, Serialize};

/// Band names every sensor is renamed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalBand {
    Blue,
    Red,
    RedEdge,
    Nir,
    Swir1,
}

impl CanonicalBand {
    pub const ALL: [CanonicalBand; 5] = [
        CanonicalBand::Blue,
        CanonicalBand::Red,
        CanonicalBand::RedEdge,
        CanonicalBand::Nir,
        CanonicalBand::Swir1,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalBand::Blue => "blue",
            CanonicalBand::Red => "red",
            CanonicalBand::RedEdge => "red_edge",
            CanonicalBand::Nir => "nir",
            CanonicalBand::Swir1 => "swir1",
        }
    }
}

/// Surface reflectance of one scene, masked pixels as NaN.
///
/// `red_edge` is `None` for sensors without a red-edge band (Landsat).
#[derive(Debug, Clone)]
pub struct BandSet {
    pub blue: Raster<f64>,
    pub red: Raster<f64>,
    pub red_edge: Option<Raster<f64>>,
    pub nir: Raster<f64>,
    pub swir1: Raster<f64>,
}

impl BandSet {
    /// All bands must share the grid of `red`
    pub fn validate(&self) -> Result<()> {
        self.red.ensure_same_shape(&self.blue)?;
        self.red.ensure_same_shape(&self.nir)?;
        self.red.ensure_same_shape(&self.swir1)?;
        if let Some(re) = &self.red_edge {
            self.red.ensure_same_shape(re)?;
        }
        Ok(())
    }

    pub fn shape(&self) -> (usize, usize) {
        self.red.shape()
    }

    pub fn band(&self, band: CanonicalBand) -> Option<&Raster<f64>> {
        match band {
            CanonicalBand::Blue => Some(&self.blue),
            CanonicalBand::Red => Some(&self.red),
            CanonicalBand::RedEdge => self.red_edge.as_ref(),
            CanonicalBand::Nir => Some(&self.nir),
            CanonicalBand::Swir1 => Some(&self.swir1),
        }
    }

    pub fn has_red_edge(&self) -> bool {
        self.red_edge.is_some()
    }
}
