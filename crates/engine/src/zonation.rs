//! Management zones for variable-rate application (VRA).
//!
//! k-means on the composite's NDVI, EVI and NDWI, then a ranking step: raw
//! cluster ids are arbitrary, so zones are re-sorted by mean NDVI and labelled
//! by position (lowest vigor first).

use orbita_algorithms::classification::{kmeans_bands, KmeansParams, UNLABELLED};
use orbita_algorithms::imagery::IndexSet;
use orbita_algorithms::statistics::{zonal_statistics, ZonalResult};
use orbita_core::Raster;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result};

/// Summary of one ranked zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSummary {
    /// 1 = lowest vigor; matches the exported zone raster value
    pub zone_id: u8,
    pub pixel_count: usize,
    pub area_ha: f64,
    pub ndvi_mean: f64,
    pub ndwi_mean: f64,
    pub evi_mean: f64,
    pub label: String,
    pub recommendation: String,
}

/// Ranked zoning of an ROI
#[derive(Debug, Clone)]
pub struct Zonation {
    /// Ranked labels `0..k`, `-1` outside the ROI or where a band is missing
    pub zones: Raster<i32>,
    /// Ascending NDVI mean
    pub summaries: Vec<ZoneSummary>,
}

impl Zonation {
    /// Byte raster for export: zone ids `1..=k`, 0 as nodata
    pub fn export_raster(&self) -> Raster<u8> {
        let mut out = self
            .zones
            .map(|label| if label < 0 { 0u8 } else { (label + 1) as u8 });
        out.set_nodata(Some(0));
        out
    }
}

/// Label and dose for rank `rank` out of `k` zones
pub fn zone_label(rank: usize, k: usize) -> (&'static str, &'static str) {
    if rank == 0 {
        ("Bajo vigor", "Dosis alta")
    } else if rank + 1 == k {
        ("Alto vigor", "Dosis baja")
    } else {
        ("Vigor medio", "Dosis media")
    }
}

/// Cluster the composite inside `mask` and rank the zones by NDVI.
///
/// Degenerate inputs (too few valid pixels, a zone left empty) fail with
/// `EngineError::Zonation`.
pub fn zonate(composite: &IndexSet, mask: &Raster<u8>, config: &EngineConfig) -> Result<Zonation> {
    let k = config.vra_clusters;
    let params = KmeansParams {
        k,
        seed: config.vra_seed,
        sample_size: Some(config.vra_sample_size),
        ..KmeansParams::default()
    };

    let result = kmeans_bands(
        &[&composite.ndvi, &composite.evi, &composite.ndwi],
        Some(mask),
        &params,
    )
    .map_err(|e| EngineError::Zonation(e.to_string()))?;

    let per_zone = |values: &Raster<f64>| -> Result<BTreeMap<i32, ZonalResult>> {
        zonal_statistics(values, &result.labels).map_err(|e| EngineError::Zonation(e.to_string()))
    };
    let ndvi = per_zone(&composite.ndvi)?;
    let ndwi = per_zone(&composite.ndwi)?;
    let evi = per_zone(&composite.evi)?;

    let mut clusters = Vec::with_capacity(k);
    for cluster in 0..k as i32 {
        let (Some(n), Some(w), Some(e)) = (ndvi.get(&cluster), ndwi.get(&cluster), evi.get(&cluster)) else {
            return Err(EngineError::Zonation(format!(
                "zone {cluster} is empty after assignment"
            )));
        };
        clusters.push((cluster, n, w, e));
    }
    clusters.sort_by(|a, b| a.1.mean.total_cmp(&b.1.mean));

    // raw cluster id -> rank
    let mut rank_of = vec![0i32; k];
    let summaries = clusters
        .iter()
        .enumerate()
        .map(|(rank, (cluster, n, w, e))| {
            rank_of[*cluster as usize] = rank as i32;
            let (label, recommendation) = zone_label(rank, k);
            ZoneSummary {
                zone_id: (rank + 1) as u8,
                pixel_count: n.count,
                area_ha: n.area_m2 / 10_000.0,
                ndvi_mean: n.mean,
                ndwi_mean: w.mean,
                evi_mean: e.mean,
                label: label.to_string(),
                recommendation: recommendation.to_string(),
            }
        })
        .collect();

    let mut zones = result.labels.map(|raw| {
        if raw < 0 {
            UNLABELLED
        } else {
            rank_of[raw as usize]
        }
    });
    zones.set_nodata(Some(UNLABELLED));

    Ok(Zonation { zones, summaries })
}
