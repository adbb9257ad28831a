//! Coordinate reference systems.
//!
//! Analysis grids are either geographic (degrees) or projected (meters).
//! Only the EPSG code travels with a raster.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Geographic codes the platforms deliver grids in.
const GEOGRAPHIC_EPSG: [u32; 4] = [4326, 4258, 4269, 4674];

/// A CRS identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CRS {
    epsg: u32,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: code }
    }

    /// WGS84 longitude/latitude (EPSG:4326), the grid every export is written in.
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn epsg(&self) -> u32 {
        self.epsg
    }

    /// Whether coordinates are longitude/latitude in degrees.
    pub fn is_geographic(&self) -> bool {
        GEOGRAPHIC_EPSG.contains(&self.epsg)
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_is_geographic() {
        let crs = CRS::wgs84();
        assert_eq!(crs.epsg(), 4326);
        assert_eq!(crs.to_string(), "EPSG:4326");
        assert!(crs.is_geographic());
    }

    #[test]
    fn utm_is_projected() {
        assert!(!CRS::from_epsg(32630).is_geographic());
        assert_eq!(CRS::from_epsg(32630), CRS::from_epsg(32630));
    }
}
