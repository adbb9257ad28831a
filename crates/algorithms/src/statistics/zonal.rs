//! Zonal statistics
//!
//! Statistics of a value raster for each zone of an integer zone raster.
//! Negative zone ids (and the zone raster's nodata) are skipped.

use orbita_core::raster::Raster;
use orbita_core::Result;
use std::collections::BTreeMap;

/// Result of zonal statistics for one zone
#[derive(Debug, Clone)]
pub struct ZonalResult {
    pub zone_id: i32,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    /// Ground area covered by the zone's valid cells, m²
    pub area_m2: f64,
}

/// Compute statistics per zone, ordered by zone id.
pub fn zonal_statistics(
    values: &Raster<f64>,
    zones: &Raster<i32>,
) -> Result<BTreeMap<i32, ZonalResult>> {
    values.ensure_same_shape(zones)?;
    let (rows, cols) = values.shape();

    let mut zone_values: BTreeMap<i32, (Vec<f64>, f64)> = BTreeMap::new();
    for row in 0..rows {
        let cell_area = values.cell_area_m2(row);
        for col in 0..cols {
            let zone = zones.data()[(row, col)];
            let val = values.data()[(row, col)];
            if zone < 0 || zones.is_nodata(zone) || values.is_nodata(val) {
                continue;
            }
            let entry = zone_values.entry(zone).or_default();
            entry.0.push(val);
            entry.1 += cell_area;
        }
    }

    let results = zone_values
        .into_iter()
        .map(|(zone_id, (vals, area_m2))| {
            let count = vals.len();
            let mean = vals.iter().sum::<f64>() / count as f64;
            let var = vals.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
            let min = vals.iter().copied().fold(f64::INFINITY, f64::min);
            let max = vals.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            (
                zone_id,
                ZonalResult {
                    zone_id,
                    count,
                    mean,
                    std_dev: var.sqrt(),
                    min,
                    max,
                    area_m2,
                },
            )
        })
        .collect();

    Ok(results)
}
