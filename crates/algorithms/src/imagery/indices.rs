//! Spectral vegetation and water indices
//!
//! Each index has a scalar form (`*_value`) for single reflectances and a
//! raster form operating pixel by pixel. Masked input (NaN or nodata) and
//! vanishing denominators produce NaN.

use super::bands::BandSet;
use crate::maybe_rayon::*;
use orbita_core::raster::Raster;
use orbita_core::Result;
use serde::{Deserialize, Serialize};

/// Indices computed for every scene and composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralIndex {
    /// Normalized Difference Vegetation Index
    NDVI,
    /// Normalized Difference Water Index (Gao, NIR/SWIR)
    NDWI,
    /// Enhanced Vegetation Index
    EVI,
    /// Normalized Difference Chlorophyll Index (red edge)
    NDCI,
    /// Soil Adjusted Vegetation Index
    SAVI,
    /// Optimized SAVI
    OSAVI,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 6] = [
        SpectralIndex::NDVI,
        SpectralIndex::NDWI,
        SpectralIndex::EVI,
        SpectralIndex::NDCI,
        SpectralIndex::SAVI,
        SpectralIndex::OSAVI,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SpectralIndex::NDVI => "NDVI",
            SpectralIndex::NDWI => "NDWI",
            SpectralIndex::EVI => "EVI",
            SpectralIndex::NDCI => "NDCI",
            SpectralIndex::SAVI => "SAVI",
            SpectralIndex::OSAVI => "OSAVI",
        }
    }
}

impl std::fmt::Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

const EPS: f64 = 1e-10;

// ---------------------------------------------------------------------------
// Scalar forms
// ---------------------------------------------------------------------------

/// `(a - b) / (a + b)`, NaN when the sum vanishes
pub fn normalized_difference_value(a: f64, b: f64) -> f64 {
    let sum = a + b;
    if sum.abs() < EPS {
        return f64::NAN;
    }
    (a - b) / sum
}

/// `NDVI = (NIR - Red) / (NIR + Red)`
pub fn ndvi_value(nir: f64, red: f64) -> f64 {
    normalized_difference_value(nir, red)
}

/// `NDWI = (NIR - SWIR1) / (NIR + SWIR1)`
pub fn ndwi_value(nir: f64, swir1: f64) -> f64 {
    normalized_difference_value(nir, swir1)
}

/// `NDCI = (RedEdge - Red) / (RedEdge + Red)`
pub fn ndci_value(red_edge: f64, red: f64) -> f64 {
    normalized_difference_value(red_edge, red)
}

/// Parameters for EVI
#[derive(Debug, Clone, Copy)]
pub struct EviParams {
    /// Gain factor (default: 2.5)
    pub g: f64,
    /// Aerosol coefficient for red band (default: 6.0)
    pub c1: f64,
    /// Aerosol coefficient for blue band (default: 7.5)
    pub c2: f64,
    /// Canopy background adjustment (default: 1.0)
    pub l: f64,
}

impl Default for EviParams {
    fn default() -> Self {
        Self {
            g: 2.5,
            c1: 6.0,
            c2: 7.5,
            l: 1.0,
        }
    }
}

/// `EVI = G (NIR - Red) / (NIR + C1 Red - C2 Blue + L)`
pub fn evi_value(nir: f64, red: f64, blue: f64, params: EviParams) -> f64 {
    let denom = nir + params.c1 * red - params.c2 * blue + params.l;
    if denom.abs() < EPS {
        return f64::NAN;
    }
    params.g * (nir - red) / denom
}

/// Parameters for SAVI
#[derive(Debug, Clone, Copy)]
pub struct SaviParams {
    /// Soil brightness correction factor (default: 0.5)
    pub l_factor: f64,
}

impl Default for SaviParams {
    fn default() -> Self {
        Self { l_factor: 0.5 }
    }
}

/// `SAVI = (NIR - Red) / (NIR + Red + L) * (1 + L)`
pub fn savi_value(nir: f64, red: f64, params: SaviParams) -> f64 {
    let l = params.l_factor;
    let denom = nir + red + l;
    if denom.abs() < EPS {
        return f64::NAN;
    }
    (nir - red) / denom * (1.0 + l)
}

/// `OSAVI = (NIR - Red) / (NIR + Red + 0.16) * 1.16`
pub fn osavi_value(nir: f64, red: f64) -> f64 {
    savi_value(nir, red, SaviParams { l_factor: 0.16 })
}

// ---------------------------------------------------------------------------
// Raster forms
// ---------------------------------------------------------------------------

pub fn normalized_difference(band_a: &Raster<f64>, band_b: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise([band_a, band_b], |[a, b]| normalized_difference_value(a, b))
}

pub fn ndvi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, red)
}

pub fn ndwi(nir: &Raster<f64>, swir1: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(nir, swir1)
}

pub fn ndci(red_edge: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    normalized_difference(red_edge, red)
}

pub fn evi(
    nir: &Raster<f64>,
    red: &Raster<f64>,
    blue: &Raster<f64>,
    params: EviParams,
) -> Result<Raster<f64>> {
    pixelwise([nir, red, blue], |[n, r, b]| evi_value(n, r, b, params))
}

pub fn savi(nir: &Raster<f64>, red: &Raster<f64>, params: SaviParams) -> Result<Raster<f64>> {
    pixelwise([nir, red], |[n, r]| savi_value(n, r, params))
}

pub fn osavi(nir: &Raster<f64>, red: &Raster<f64>) -> Result<Raster<f64>> {
    pixelwise([nir, red], |[n, r]| osavi_value(n, r))
}

// ---------------------------------------------------------------------------
// Per-scene index stack
// ---------------------------------------------------------------------------

/// The six indices of one scene (or of a composite)
#[derive(Debug, Clone)]
pub struct IndexSet {
    pub ndvi: Raster<f64>,
    pub ndwi: Raster<f64>,
    pub evi: Raster<f64>,
    pub ndci: Raster<f64>,
    pub savi: Raster<f64>,
    pub osavi: Raster<f64>,
    /// NDCI holds NDVI values because the source had no red edge
    pub ndci_fallback: bool,
}

impl IndexSet {
    pub fn get(&self, index: SpectralIndex) -> &Raster<f64> {
        match index {
            SpectralIndex::NDVI => &self.ndvi,
            SpectralIndex::NDWI => &self.ndwi,
            SpectralIndex::EVI => &self.evi,
            SpectralIndex::NDCI => &self.ndci,
            SpectralIndex::SAVI => &self.savi,
            SpectralIndex::OSAVI => &self.osavi,
        }
    }

    pub fn get_mut(&mut self, index: SpectralIndex) -> &mut Raster<f64> {
        match index {
            SpectralIndex::NDVI => &mut self.ndvi,
            SpectralIndex::NDWI => &mut self.ndwi,
            SpectralIndex::EVI => &mut self.evi,
            SpectralIndex::NDCI => &mut self.ndci,
            SpectralIndex::SAVI => &mut self.savi,
            SpectralIndex::OSAVI => &mut self.osavi,
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.ndvi.shape()
    }
}

/// Compute all indices for one scene.
///
/// Without a red-edge band NDCI falls back to NDVI and the set is flagged.
pub fn compute_indices(bands: &BandSet) -> Result<IndexSet> {
    bands.validate()?;

    let ndvi_r = ndvi(&bands.nir, &bands.red)?;
    let (ndci_r, ndci_fallback) = match &bands.red_edge {
        Some(re) => (ndci(re, &bands.red)?, false),
        None => (ndvi_r.clone(), true),
    };

    Ok(IndexSet {
        ndwi: ndwi(&bands.nir, &bands.swir1)?,
        evi: evi(&bands.nir, &bands.red, &bands.blue, EviParams::default())?,
        savi: savi(&bands.nir, &bands.red, SaviParams::default())?,
        osavi: osavi(&bands.nir, &bands.red)?,
        ndci: ndci_r,
        ndvi: ndvi_r,
        ndci_fallback,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Row-parallel map over co-registered bands; any masked input gives NaN.
fn pixelwise<const N: usize>(
    bands: [&Raster<f64>; N],
    f: impl Fn([f64; N]) -> f64 + Sync + Send,
) -> Result<Raster<f64>> {
    let template = bands[0];
    for band in &bands[1..] {
        template.ensure_same_shape(*band)?;
    }

    let (rows, cols) = template.shape();
    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let px: [f64; N] = std::array::from_fn(|i| bands[i].data()[(row, col)]);
                if px.iter().zip(bands.iter()).any(|(v, b)| b.is_nodata(*v)) {
                    continue;
                }
                *out = f(px);
            }
            row_data
        })
        .collect();

    Ok(Raster::from_vec(data, rows, cols)?
        .with_geo(*template.transform(), template.crs().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use orbita_core::GeoTransform;

    fn make_band(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value)
            .with_geo(GeoTransform::new(0.0, rows as f64, 1.0, -1.0), None)
    }

    fn bands(red_edge: Option<f64>) -> BandSet {
        BandSet {
            blue: make_band(3, 3, 0.05),
            red: make_band(3, 3, 0.1),
            red_edge: red_edge.map(|v| make_band(3, 3, v)),
            nir: make_band(3, 3, 0.5),
            swir1: make_band(3, 3, 0.2),
        }
    }

    #[test]
    fn test_ndvi_scalar() {
        assert_relative_eq!(ndvi_value(0.5, 0.1), 0.6667, epsilon = 1e-4);
        assert!(ndvi_value(0.0, 0.0).is_nan());
    }

    #[test]
    fn test_other_scalars() {
        assert_relative_eq!(ndwi_value(0.5, 0.2), 0.3 / 0.7, epsilon = 1e-12);
        // 2.5 * 0.4 / (0.5 + 0.6 - 0.375 + 1)
        assert_relative_eq!(evi_value(0.5, 0.1, 0.05, EviParams::default()), 1.0 / 1.725, epsilon = 1e-12);
        assert_relative_eq!(savi_value(0.5, 0.1, SaviParams::default()), 0.4 / 1.1 * 1.5, epsilon = 1e-12);
        assert_relative_eq!(osavi_value(0.5, 0.1), 0.4 / 0.76 * 1.16, epsilon = 1e-12);
    }

    #[test]
    fn test_ndvi_raster() {
        let result = ndvi(&make_band(5, 5, 0.5), &make_band(5, 5, 0.1)).unwrap();
        assert_relative_eq!(result.get(2, 2).unwrap(), 0.4 / 0.6, epsilon = 1e-10);
    }

    #[test]
    fn test_ndvi_water() {
        let result = ndvi(&make_band(5, 5, 0.05), &make_band(5, 5, 0.15)).unwrap();
        assert!(result.get(2, 2).unwrap() < 0.0);
    }

    #[test]
    fn test_masked_pixel_propagates() {
        let mut nir = make_band(3, 3, 0.5);
        nir.set(1, 1, f64::NAN).unwrap();
        let result = ndvi(&nir, &make_band(3, 3, 0.1)).unwrap();
        assert!(result.get(1, 1).unwrap().is_nan());
        assert!(result.get(0, 0).unwrap().is_finite());
    }

    #[test]
    fn test_dimension_mismatch() {
        assert!(ndvi(&make_band(3, 3, 0.5), &make_band(4, 3, 0.1)).is_err());
    }

    #[test]
    fn test_compute_indices_with_red_edge() {
        let set = compute_indices(&bands(Some(0.3))).unwrap();
        assert!(!set.ndci_fallback);
        assert_relative_eq!(set.ndci.get(0, 0).unwrap(), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ndci_falls_back_to_ndvi() {
        let set = compute_indices(&bands(None)).unwrap();
        assert!(set.ndci_fallback);
        assert_eq!(set.ndci.get(1, 1).unwrap(), set.ndvi.get(1, 1).unwrap());
    }
}
