//! Region reductions over an ROI mask
//!
//! Percentiles use linear interpolation between order statistics
//! (`rank = p/100 * (n - 1)`), standard deviation is the population one.

use orbita_core::raster::Raster;
use orbita_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Summary of one band over a region
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

/// Percentile of an ascending slice, linear interpolation; NaN when empty
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// Mean and population standard deviation; `None` for an empty slice
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Stats of a plain sample of values (NaN ignored); `None` when nothing is finite
pub fn sample_stats(values: &[f64]) -> Option<RegionStats> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let (mean, std_dev) = mean_std(&finite)?;
    finite.sort_by(f64::total_cmp);
    Some(RegionStats {
        mean,
        std_dev,
        count: finite.len(),
        p10: percentile(&finite, 10.0),
        p50: percentile(&finite, 50.0),
        p90: percentile(&finite, 90.0),
    })
}

/// Stats of the valid cells of `values` inside `mask` (cells with mask 0 are skipped).
///
/// `Ok(None)` when the region holds no valid pixel.
pub fn region_stats(values: &Raster<f64>, mask: Option<&Raster<u8>>) -> Result<Option<RegionStats>> {
    let selected = masked_values(values, mask)?;
    Ok(sample_stats(&selected))
}

fn masked_values(values: &Raster<f64>, mask: Option<&Raster<u8>>) -> Result<Vec<f64>> {
    if let Some(m) = mask {
        values.ensure_same_shape(m)?;
    }
    let out = values
        .data()
        .indexed_iter()
        .filter(|((r, c), _)| mask.map_or(true, |m| m.data()[(*r, *c)] != 0))
        .map(|(_, v)| *v)
        .filter(|v| !values.is_nodata(*v))
        .collect();
    Ok(out)
}

/// Sum of cell areas (m²) where `predicate` holds for a valid cell
pub fn area_where(values: &Raster<f64>, predicate: impl Fn(f64) -> bool) -> f64 {
    let (rows, cols) = values.shape();
    (0..rows)
        .map(|row| {
            let cell = values.cell_area_m2(row);
            let hits = (0..cols)
                .filter(|&col| {
                    let v = values.data()[(row, col)];
                    !values.is_nodata(v) && predicate(v)
                })
                .count();
            cell * hits as f64
        })
        .sum()
}

/// Stressed area of an ROI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StressArea {
    pub area_ha: f64,
    pub stress_ha: f64,
    /// `None` when the ROI has no area
    pub stress_pct: Option<f64>,
}

/// Area where NDVI falls below `threshold`, relative to the ROI area.
///
/// `ndvi` must already be clipped to the ROI. The percentage is clamped to
/// `[0, 100]` because pixel areas and the geodesic ROI area differ slightly.
pub fn stress_area(ndvi: &Raster<f64>, threshold: f64, roi_area_ha: f64) -> Result<StressArea> {
    if !threshold.is_finite() {
        return Err(Error::InvalidParameter {
            name: "stress_threshold",
            value: threshold.to_string(),
            reason: "must be finite".into(),
        });
    }
    let stress_ha = area_where(ndvi, |v| v < threshold) / 10_000.0;
    let stress_pct = (roi_area_ha > 0.0).then(|| (stress_ha / roi_area_ha * 100.0).clamp(0.0, 100.0));
    Ok(StressArea {
        area_ha: roi_area_ha,
        stress_ha,
        stress_pct,
    })
}
